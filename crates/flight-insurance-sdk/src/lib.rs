//! Flight Insurance SDK - policy cache reconciliation for the insurance pool
//!
//! Keeps a locally persisted cache of the policies a user believes they own
//! in step with the authoritative ledger, where a shared pool object lists
//! every registered policy identifier.
//!
//! # Architecture
//!
//! ```text
//! LedgerReader ──▶ ExistenceVerifier ──▶ Reconciler ◀──▶ RecordStore
//!                        │                   │
//!                        ▼                   ▼
//!               IdentifierResolver     ActionSubmitter ──▶ TransactionExecutor
//! ```
//!
//! - **RecordStore** owns the local cache (and migrates the legacy shape).
//! - **LedgerReader** is the read-only query seam; `SuiRpcReader` speaks
//!   Sui JSON-RPC.
//! - **ExistenceVerifier** answers "is this a live policy object?".
//! - **Reconciler** classifies every identifier and plans the repair.
//! - **IdentifierResolver** picks the identifier to claim against.
//! - **ActionSubmitter** is the only path to signed transactions.
//!
//! `PolicyService` wires them together for the create / claim / repair flows.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use flight_insurance_sdk::{Config, FileSlot, PolicyService, RecordStore, RepairOptions, SuiRpcReader};
//!
//! let config = Config::load("flight-insurance.toml")?;
//! let reader = Arc::new(SuiRpcReader::new(&config.network, &config.contract)?);
//! let store = RecordStore::new(Arc::new(FileSlot::new(&config.cache.path)));
//! let service = PolicyService::new(config.contract.clone(), reader, store);
//!
//! let report = service.reconcile_and_repair(RepairOptions::apply_only()).await?;
//! println!("{}", report.summary());
//! ```

// Configuration
pub mod config;

// Error types
pub mod error;

// Identifiers, records, pool snapshots, amounts
pub mod types;

// Read-only ledger access
pub mod ledger;

// Existence verification
pub mod verify;

// Divergence classification and repair planning
pub mod reconcile;

// Claim identifier resolution
pub mod resolve;

// Local policy cache
pub mod store;

// Ledger-mutating operations
pub mod submit;

// Create / claim / repair orchestration
pub mod service;

pub use config::{CacheConfig, Config, ContractConfig, NetworkConfig, SignerConfig};
pub use error::{PolicyError, Result};
pub use ledger::{LedgerReader, MockLedger, ObjectRead, PoolObject, RetryPolicy, SuiRpcReader};
pub use reconcile::{classify, Divergence, PassGuard, ReconcilePlan, Reconciler};
pub use resolve::{IdentifierResolver, Rationale, Resolution};
pub use service::{
    ClaimResult, CleanupStatus, CreatedPolicy, PolicyService, PoolStatus, ReconcileReport,
    RepairOptions, DELAY_THRESHOLD_MINUTES,
};
pub use store::{AppliedChanges, CacheSlot, FileSlot, MemorySlot, RecordStore};
pub use submit::{
    ActionSubmitter, CallArg, ClaimOutcome, ExecutionOutcome, LedgerCall, LedgerEvent,
    MockExecutor, MoveCall, RemoteSignerExecutor, TransactionExecutor, TxDigest,
};
pub use types::{
    PolicyRecord, PolicyRequest, PolicyStatus, PoolSnapshot, MIST_PER_SUI, UNKNOWN,
};
pub use verify::{ExistenceVerifier, Verification};
