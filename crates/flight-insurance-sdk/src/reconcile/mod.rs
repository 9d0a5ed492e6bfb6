//! Divergence classification and repair planning
//!
//! Compares the local policy cache with the pool's member list and decides,
//! per identifier, what (if anything) must change:
//!
//! ```text
//!                     in pool                      not in pool
//!             ┌───────────────────────────┬──────────────────────────┐
//!  in cache   │ live → Consistent         │ live → LocalOnlyGhost    │
//!             │ dead → PoolOnlyCorrupted  │ dead → LocalOnlyOrphan   │
//!             ├───────────────────────────┼──────────────────────────┤
//!  not cached │ live → PoolOnlyMissingLocal                          │
//!             │ dead → PoolOnlyCorrupted                             │
//!             └──────────────────────────────────────────────────────┘
//! ```
//!
//! "Dead" means the ledger answered and the id is not a live policy. An id
//! whose read failed (or was never verified) is `Unverified` wherever it
//! appears and gets no repair action.
//!
//! Planning is split in two: [`Reconciler::plan`] gathers every verdict
//! (fanning out ledger reads), then [`classify`] computes the plan as a
//! pure function of its inputs. Nothing here writes; callers apply the
//! plan through the record store and the action submitter.

mod reconciler;

pub use reconciler::{PassGuard, Reconciler};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::types::{PolicyRecord, PoolSnapshot};
use crate::verify::Verification;

/// Where an identifier stands after comparing cache, pool and ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Divergence {
    /// Cached, pooled and live
    Consistent,
    /// Cached only, and no live object: drop from the cache
    LocalOnlyOrphan,
    /// Cached only, but live: keep, flag for follow-up
    LocalOnlyGhost,
    /// Pooled and live, missing from the cache: add a placeholder
    PoolOnlyMissingLocal,
    /// Pooled but not a live policy: offer ledger cleanup
    PoolOnlyCorrupted,
    /// Ledger unreachable for this id: left as is until a later pass
    Unverified,
}

impl Divergence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consistent => "consistent",
            Self::LocalOnlyOrphan => "local_only_orphan",
            Self::LocalOnlyGhost => "local_only_ghost",
            Self::PoolOnlyMissingLocal => "pool_only_missing_local",
            Self::PoolOnlyCorrupted => "pool_only_corrupted",
            Self::Unverified => "unverified",
        }
    }
}

impl std::fmt::Display for Divergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Repair plan for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcilePlan {
    /// Placeholders for live pool members missing from the cache
    pub to_add: Vec<PolicyRecord>,
    /// Cached ids to drop
    pub to_remove: BTreeSet<String>,
    /// Pool entries to purge with one cleanup transaction
    pub corrupted_for_cleanup: BTreeSet<String>,
    /// Live cached policies the pool does not list; kept, never auto-repaired
    pub ghosts: BTreeSet<String>,
    /// Ids the ledger could not be asked about; untouched this pass
    pub unverified: BTreeSet<String>,
    /// Label for every id seen in either source
    pub classification: BTreeMap<String, Divergence>,
}

impl ReconcilePlan {
    /// No edits of any kind are needed
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.corrupted_for_cleanup.is_empty()
    }

    /// The local cache needs a write
    pub fn has_local_edits(&self) -> bool {
        !self.to_add.is_empty() || !self.to_remove.is_empty()
    }

    /// Number of ids with the given label
    pub fn count(&self, divergence: Divergence) -> usize {
        self.classification
            .values()
            .filter(|d| **d == divergence)
            .count()
    }

    /// Ids with the given label
    pub fn ids_with(&self, divergence: Divergence) -> impl Iterator<Item = &str> {
        self.classification
            .iter()
            .filter(move |(_, d)| **d == divergence)
            .map(|(id, _)| id.as_str())
    }

    /// One-line summary for logs and terminals
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} consistent, {} to add, {} to remove, {} corrupted in pool, {} ghost(s)",
            self.count(Divergence::Consistent),
            self.to_add.len(),
            self.to_remove.len(),
            self.corrupted_for_cleanup.len(),
            self.ghosts.len(),
        );
        if !self.unverified.is_empty() {
            summary.push_str(&format!(", {} unverified", self.unverified.len()));
        }
        summary
    }
}

/// What the ledger said about one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Evidence {
    Live,
    Dead,
    Unknown,
}

impl From<bool> for Evidence {
    fn from(live: bool) -> Self {
        if live {
            Evidence::Live
        } else {
            Evidence::Dead
        }
    }
}

/// Classify every identifier and compute the repair plan.
///
/// `verdicts` should hold a verdict for every id in `local ∪ pool`. An id
/// without one, or whose verdict is `Unreachable`, is classified
/// `Unverified` and lands in no edit set. `now` stamps placeholder
/// records.
///
/// For disjoint cache and pool id sets the three edit sets are pairwise
/// disjoint. An id both cached and pooled that the ledger reports dead lands in
/// `to_remove` and in `corrupted_for_cleanup`: it leaves the cache and is
/// offered for purge from the pool.
pub fn classify(
    local: &[PolicyRecord],
    pool: &PoolSnapshot,
    verdicts: &HashMap<String, Verification>,
    now: DateTime<Utc>,
) -> ReconcilePlan {
    let evidence = |id: &str| match verdicts.get(id) {
        Some(verdict) if verdict.is_conclusive() => Evidence::from(verdict.is_live()),
        _ => Evidence::Unknown,
    };

    let local_ids: HashSet<&str> = local.iter().map(|r| r.policy_id.as_str()).collect();
    let pool_ids = pool.member_set();

    let mut plan = ReconcilePlan::default();

    // Pool order, so placeholders are appended oldest first
    let mut seen_pool: HashSet<&str> = HashSet::new();
    for id in pool.member_ids.iter().map(String::as_str) {
        if !seen_pool.insert(id) {
            continue;
        }
        let cached = local_ids.contains(id);
        let divergence = match (cached, evidence(id)) {
            (_, Evidence::Unknown) => {
                plan.unverified.insert(id.to_string());
                Divergence::Unverified
            }
            (true, Evidence::Live) => Divergence::Consistent,
            (true, Evidence::Dead) => {
                plan.to_remove.insert(id.to_string());
                plan.corrupted_for_cleanup.insert(id.to_string());
                Divergence::PoolOnlyCorrupted
            }
            (false, Evidence::Live) => {
                plan.to_add.push(PolicyRecord::placeholder(id, now));
                Divergence::PoolOnlyMissingLocal
            }
            (false, Evidence::Dead) => {
                plan.corrupted_for_cleanup.insert(id.to_string());
                Divergence::PoolOnlyCorrupted
            }
        };
        plan.classification.insert(id.to_string(), divergence);
    }

    for id in local.iter().map(|r| r.policy_id.as_str()) {
        if pool_ids.contains(id) || plan.classification.contains_key(id) {
            continue;
        }
        let divergence = match evidence(id) {
            Evidence::Unknown => {
                plan.unverified.insert(id.to_string());
                Divergence::Unverified
            }
            Evidence::Live => {
                plan.ghosts.insert(id.to_string());
                Divergence::LocalOnlyGhost
            }
            Evidence::Dead => {
                plan.to_remove.insert(id.to_string());
                Divergence::LocalOnlyOrphan
            }
        };
        plan.classification.insert(id.to_string(), divergence);
    }

    plan
}
