//! Create / claim / repair orchestration
//!
//! `PolicyService` wires the reader, verifier, reconciler, resolver, store
//! and (optionally) the submitter together for the user-facing flows.
//! Without a submitter the service is read-only: planning, resolution and
//! local repair work, ledger mutations fail with a config error.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ContractConfig;
use crate::error::{PolicyError, Result};
use crate::ledger::LedgerReader;
use crate::reconcile::{Divergence, PassGuard, ReconcilePlan, Reconciler};
use crate::resolve::{IdentifierResolver, Resolution};
use crate::store::{AppliedChanges, RecordStore};
use crate::submit::{ActionSubmitter, ClaimOutcome, TransactionExecutor, TxDigest};
use crate::types::{mist_to_sui, sui_to_mist, PolicyRecord, PolicyRequest, PolicyStatus, PoolSnapshot};
use crate::verify::{ExistenceVerifier, Verification};

/// Minimum delay the contract pays out for (24 hours)
pub const DELAY_THRESHOLD_MINUTES: u64 = 1440;

/// What a reconciliation pass may change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairOptions {
    /// Write the plan's adds and removes to the local cache
    pub apply: bool,
    /// Submit the cleanup transaction for corrupted pool entries
    pub cleanup: bool,
}

impl RepairOptions {
    /// Plan only
    pub fn dry_run() -> Self {
        Self::default()
    }

    /// Repair the local cache, leave the ledger alone
    pub fn apply_only() -> Self {
        Self {
            apply: true,
            cleanup: false,
        }
    }

    /// Repair the cache and submit ledger cleanup
    pub fn full() -> Self {
        Self {
            apply: true,
            cleanup: true,
        }
    }
}

/// Fate of the cleanup transaction in a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupStatus {
    NotRequested,
    NothingToClean,
    Submitted { digest: TxDigest, count: usize },
    Failed { reason: String },
    SignerUnavailable,
}

/// Everything a reconciliation pass did.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub plan: ReconcilePlan,
    /// Set when the pool could not be read; the plan is then empty
    pub pool_read_error: Option<String>,
    /// Cache edits written, when applying was requested and succeeded
    pub applied: Option<AppliedChanges>,
    pub apply_error: Option<String>,
    pub cleanup: CleanupStatus,
}

impl ReconcileReport {
    fn new(plan: ReconcilePlan) -> Self {
        Self {
            plan,
            pool_read_error: None,
            applied: None,
            apply_error: None,
            cleanup: CleanupStatus::NotRequested,
        }
    }

    pub fn summary(&self) -> String {
        if let Some(ref err) = self.pool_read_error {
            return format!("Pool unreadable, nothing reconciled: {}", err);
        }

        let mut summary = self.plan.summary();
        match (&self.applied, &self.apply_error) {
            (Some(changes), _) => summary.push_str(&format!(
                "; cache updated (+{} / -{})",
                changes.added, changes.removed
            )),
            (None, Some(err)) => summary.push_str(&format!("; cache update failed: {}", err)),
            (None, None) => {}
        }
        match &self.cleanup {
            CleanupStatus::Submitted { digest, count } => {
                summary.push_str(&format!("; cleanup of {} submitted ({})", count, digest))
            }
            CleanupStatus::Failed { reason } => {
                summary.push_str(&format!("; cleanup failed: {}", reason))
            }
            CleanupStatus::SignerUnavailable => {
                summary.push_str("; cleanup skipped, no signer configured")
            }
            CleanupStatus::NotRequested | CleanupStatus::NothingToClean => {}
        }
        summary
    }
}

/// Pool balance and membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub pool_id: String,
    pub balance_mist: u64,
    /// Balance in SUI, exact decimal
    pub balance_sui: String,
    pub member_count: usize,
}

/// Result of `create_policy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPolicy {
    /// New policy id, when the ledger reported one
    pub policy_id: Option<String>,
    pub digest: TxDigest,
}

impl CreatedPolicy {
    pub fn message(&self) -> String {
        match self.policy_id {
            Some(ref id) => format!("Policy created successfully! Policy ID: {}", id),
            None => "Policy created successfully!".to_string(),
        }
    }
}

/// Result of `submit_claim`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimResult {
    /// Id the claim was submitted against
    pub policy_id: String,
    pub digest: TxDigest,
    pub outcome: ClaimOutcome,
    pub resolution: Resolution,
    pub delay_minutes: u64,
}

impl ClaimResult {
    pub fn message(&self) -> String {
        match self.outcome {
            ClaimOutcome::Approved { payout_mist } => {
                format!("Claim approved! Payout: {} SUI", mist_to_sui(payout_mist))
            }
            ClaimOutcome::Rejected => format!(
                "Claim rejected. Delay was {} minutes, but threshold is {} minutes (24 hours)",
                self.delay_minutes, DELAY_THRESHOLD_MINUTES
            ),
            ClaimOutcome::Unreported => "Claim processed successfully!".to_string(),
        }
    }
}

/// User-facing policy operations.
pub struct PolicyService {
    contract: ContractConfig,
    reader: Arc<dyn LedgerReader>,
    verifier: ExistenceVerifier,
    reconciler: Reconciler,
    resolver: IdentifierResolver,
    store: RecordStore,
    submitter: Option<ActionSubmitter>,
    guard: PassGuard,
}

impl PolicyService {
    pub fn new(contract: ContractConfig, reader: Arc<dyn LedgerReader>, store: RecordStore) -> Self {
        let verifier = ExistenceVerifier::for_contract(reader.clone(), &contract);
        Self {
            reconciler: Reconciler::new(verifier.clone()),
            resolver: IdentifierResolver::new(verifier.clone()),
            verifier,
            contract,
            reader,
            store,
            submitter: None,
            guard: PassGuard::new(),
        }
    }

    /// Enable ledger mutations.
    pub fn with_executor(self, executor: Arc<dyn TransactionExecutor>) -> Self {
        let submitter = ActionSubmitter::new(executor, self.contract.clone());
        self.with_submitter(submitter)
    }

    pub fn with_submitter(mut self, submitter: ActionSubmitter) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn contract(&self) -> &ContractConfig {
        &self.contract
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn can_submit(&self) -> bool {
        self.submitter.is_some()
    }

    /// A pass is currently running
    pub fn is_reconciling(&self) -> bool {
        self.guard.is_running()
    }

    /// Cached policies
    pub fn policies(&self) -> Vec<PolicyRecord> {
        self.store.load()
    }

    pub async fn pool_snapshot(&self) -> Result<PoolSnapshot> {
        let pool = self.reader.get_pool_object(&self.contract.pool_id).await?;
        Ok(PoolSnapshot::from(pool))
    }

    pub async fn pool_status(&self) -> Result<PoolStatus> {
        let pool = self.pool_snapshot().await?;
        Ok(PoolStatus {
            pool_id: self.contract.pool_id.clone(),
            balance_mist: pool.balance,
            balance_sui: mist_to_sui(pool.balance).to_string(),
            member_count: pool.len(),
        })
    }

    pub async fn verify(&self, id: &str) -> Verification {
        self.verifier.verify_detailed(id.trim()).await
    }

    /// Run one reconciliation pass.
    ///
    /// Fails only when another pass is running. Pool read failures,
    /// cache write failures and cleanup failures are reported, not raised.
    pub async fn reconcile_and_repair(&self, options: RepairOptions) -> Result<ReconcileReport> {
        let _pass = self.guard.try_begin()?;
        info!(apply = options.apply, cleanup = options.cleanup, "Reconciliation pass started");

        let local = self.store.load();
        let pool = match self.pool_snapshot().await {
            Ok(pool) => pool,
            Err(err) => {
                warn!(pool_id = %self.contract.pool_id, error = %err, "Pool unreadable, skipping reconciliation");
                let mut report = ReconcileReport::new(ReconcilePlan::default());
                report.pool_read_error = Some(err.to_string());
                return Ok(report);
            }
        };

        let plan = self.reconciler.plan(&local, &pool).await;
        for id in plan.ids_with(Divergence::LocalOnlyGhost) {
            warn!(policy_id = id, "Live cached policy is not listed in the pool");
        }
        for id in &plan.corrupted_for_cleanup {
            warn!(policy_id = %id, "Pool lists a policy that is not a live object");
        }
        for id in &plan.unverified {
            warn!(policy_id = %id, "Ledger unreachable for policy, leaving it for the next pass");
        }

        let mut report = ReconcileReport::new(plan);

        if options.apply {
            match self.store.apply(&report.plan) {
                Ok(changes) => report.applied = Some(changes),
                Err(err) => {
                    warn!(error = %err, "Failed to apply reconciliation plan");
                    report.apply_error = Some(err.to_string());
                }
            }
        }

        if options.cleanup {
            report.cleanup = self.cleanup(&report.plan).await;
        }

        info!(summary = %report.summary(), "Reconciliation pass finished");
        Ok(report)
    }

    async fn cleanup(&self, plan: &ReconcilePlan) -> CleanupStatus {
        if plan.corrupted_for_cleanup.is_empty() {
            return CleanupStatus::NothingToClean;
        }
        let Some(ref submitter) = self.submitter else {
            warn!(count = plan.corrupted_for_cleanup.len(), "Cleanup requested without a signer");
            return CleanupStatus::SignerUnavailable;
        };

        match submitter.submit_cleanup(&plan.corrupted_for_cleanup).await {
            Ok(Some(digest)) => CleanupStatus::Submitted {
                digest,
                count: plan.corrupted_for_cleanup.len(),
            },
            Ok(None) => CleanupStatus::NothingToClean,
            Err(err) => CleanupStatus::Failed {
                reason: err.to_string(),
            },
        }
    }

    /// Create a policy from form input and cache it.
    pub async fn create_policy(&self, request: &PolicyRequest) -> Result<CreatedPolicy> {
        request.validate()?;
        let coverage_mist = sui_to_mist(&request.coverage_amount)?;
        let premium_mist = sui_to_mist(&request.premium)?;
        let departure = request.departure_timestamp()?;
        let submitter = self.submitter()?;

        let outcome = submitter
            .create_policy(
                request.flight_number.trim(),
                request.airline.trim(),
                departure,
                coverage_mist,
                premium_mist,
            )
            .await?;

        let policy_id = outcome.created_policy_id(&self.contract);
        match policy_id {
            Some(ref id) => {
                let record = PolicyRecord::from_request(id.clone(), request, Utc::now());
                if let Err(err) = self.store.insert(record) {
                    // The next reconciliation pass adds it back as a placeholder
                    warn!(policy_id = %id, error = %err, "Failed to cache new policy");
                }
                info!(policy_id = %id, flight = %request.flight_number, "Policy created");
            }
            None => warn!(digest = %outcome.digest, "Policy created but its id was not reported"),
        }

        Ok(CreatedPolicy {
            policy_id,
            digest: outcome.digest,
        })
    }

    /// Resolve the id a claim should use. Advisory, changes nothing.
    pub async fn prepare_claim(&self, candidate: &str) -> Resolution {
        let pool = match self.pool_snapshot().await {
            Ok(pool) => pool,
            Err(err) => {
                warn!(error = %err, "Pool unreadable, resolving against the candidate alone");
                PoolSnapshot::default()
            }
        };
        self.resolver
            .resolve_with_cache(candidate, &pool, &self.store.ids())
            .await
    }

    /// Resolve against fresh ledger state and submit the claim.
    pub async fn submit_claim(&self, candidate: &str, delay_minutes: u64) -> Result<ClaimResult> {
        let submitter = self.submitter()?;
        let resolution = self.prepare_claim(candidate).await;

        let Some(policy_id) = resolution.recommended.clone() else {
            return Err(PolicyError::ClaimUnresolvable(resolution.explain()));
        };
        if resolution.is_substitution() {
            info!(
                candidate = %resolution.candidate,
                policy_id = %policy_id,
                rationale = %resolution.rationale,
                "Claiming against a substitute policy"
            );
        }

        let outcome = submitter
            .process_claim(&policy_id, delay_minutes)
            .await
            .map_err(|err| {
                let reason = match err {
                    PolicyError::SubmissionRejected(message) => message,
                    other => other.to_string(),
                };
                PolicyError::SubmissionRejected(format!("{} ({})", reason, resolution.explain()))
            })?;

        let claim = ClaimOutcome::from_execution(&outcome, &self.contract);
        if claim.is_approved() {
            if let Err(err) = self.store.upsert_status(&policy_id, PolicyStatus::Claimed) {
                warn!(policy_id = %policy_id, error = %err, "Failed to mark policy claimed");
            }
        }
        info!(policy_id = %policy_id, delay_minutes, approved = claim.is_approved(), "Claim processed");

        Ok(ClaimResult {
            policy_id,
            digest: outcome.digest,
            outcome: claim,
            resolution,
            delay_minutes,
        })
    }

    /// Add collateral to the pool.
    pub async fn add_funds(&self, amount: &str) -> Result<TxDigest> {
        let amount_mist = sui_to_mist(amount)?;
        if amount_mist == 0 {
            return Err(PolicyError::InvalidInput(
                "amount must be greater than zero".into(),
            ));
        }
        let outcome = self.submitter()?.add_funds(amount_mist).await?;
        Ok(outcome.digest)
    }

    fn submitter(&self) -> Result<&ActionSubmitter> {
        self.submitter
            .as_ref()
            .ok_or_else(|| PolicyError::Config("no transaction signer configured".into()))
    }
}
