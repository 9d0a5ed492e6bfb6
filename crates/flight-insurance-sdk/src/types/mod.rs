//! Domain types shared across the SDK
//!
//! - identifiers: structural checks on ledger object ids
//! - policy: cached policy records and creation requests
//! - pool: point-in-time pool snapshots
//! - amount: SUI / MIST conversion

pub mod amount;
pub mod identifier;
mod policy;
mod pool;

pub use amount::{mist_to_sui, sui_to_mist, MIST_PER_SUI};
pub use identifier::{is_well_formed, POLICY_ID_LEN};
pub use policy::{PolicyRecord, PolicyRequest, PolicyStatus, UNKNOWN};
pub use pool::PoolSnapshot;
