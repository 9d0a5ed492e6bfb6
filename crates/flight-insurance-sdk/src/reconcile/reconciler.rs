//! Async planning over the ledger, and the single-pass guard.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::{classify, ReconcilePlan};
use crate::error::{PolicyError, Result};
use crate::types::{PolicyRecord, PoolSnapshot};
use crate::verify::ExistenceVerifier;

/// Computes repair plans.
///
/// Verification of every id in `local ∪ pool` is fanned out and fully
/// collected before classification, so an abandoned pass leaves nothing
/// half-decided.
#[derive(Clone)]
pub struct Reconciler {
    verifier: ExistenceVerifier,
}

impl Reconciler {
    pub fn new(verifier: ExistenceVerifier) -> Self {
        Self { verifier }
    }

    pub fn verifier(&self) -> &ExistenceVerifier {
        &self.verifier
    }

    /// Plan a pass. Side-effect free apart from ledger reads.
    pub async fn plan(&self, local: &[PolicyRecord], pool: &PoolSnapshot) -> ReconcilePlan {
        let ids = local
            .iter()
            .map(|r| r.policy_id.as_str())
            .chain(pool.member_ids.iter().map(String::as_str));

        let verdicts = self.verifier.verify_many(ids).await;
        debug!(verified = verdicts.len(), "Collected verification verdicts");

        let plan = classify(local, pool, &verdicts, Utc::now());
        info!(
            cached = local.len(),
            pooled = pool.len(),
            to_add = plan.to_add.len(),
            to_remove = plan.to_remove.len(),
            corrupted = plan.corrupted_for_cleanup.len(),
            ghosts = plan.ghosts.len(),
            "Reconciliation plan computed"
        );
        plan
    }
}

/// Non-reentrant guard: at most one pass per store at a time.
#[derive(Debug, Clone, Default)]
pub struct PassGuard {
    lock: Arc<Mutex<()>>,
}

impl PassGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a pass, or fail with `ReconcileInProgress`. The pass ends when
    /// the returned guard drops.
    pub fn try_begin(&self) -> Result<OwnedMutexGuard<()>> {
        self.lock
            .clone()
            .try_lock_owned()
            .map_err(|_| PolicyError::ReconcileInProgress)
    }

    pub fn is_running(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
