//! Point-in-time view of the shared insurance pool

use serde::Serialize;
use std::collections::HashSet;

use crate::ledger::PoolObject;

/// Pool membership and balance as read from the ledger.
///
/// Rebuilt on every pass and never persisted. `member_ids` keeps the
/// ledger's order, which is append-only as far as the client can tell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub member_ids: Vec<String>,
    /// Collateral in MIST
    pub balance: u64,
}

impl PoolSnapshot {
    pub fn new(member_ids: Vec<String>, balance: u64) -> Self {
        Self { member_ids, balance }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.member_ids.iter().any(|member| member == id)
    }

    /// Members as a set for membership tests
    pub fn member_set(&self) -> HashSet<&str> {
        self.member_ids.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }

    /// Members from most to least recently appended
    pub fn most_recent_first(&self) -> impl Iterator<Item = &str> {
        self.member_ids.iter().rev().map(String::as_str)
    }
}

impl From<PoolObject> for PoolSnapshot {
    fn from(pool: PoolObject) -> Self {
        Self {
            member_ids: pool.member_ids,
            balance: pool.balance_minor_units,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_recent_first() {
        let pool = PoolSnapshot::new(vec!["a".into(), "b".into(), "c".into()], 0);
        let order: Vec<&str> = pool.most_recent_first().collect();
        assert_eq!(order, vec!["c", "b", "a"]);
        assert!(pool.contains("b"));
        assert!(!pool.contains("d"));
        assert_eq!(pool.member_set().len(), 3);
    }
}
