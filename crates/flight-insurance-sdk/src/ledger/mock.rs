//! In-memory ledger for tests.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use super::{LedgerReader, ObjectRead, PoolObject};
use crate::error::{PolicyError, Result};

/// Mock ledger.
///
/// Holds objects by id and one pool. Counts every read so tests can assert
/// that a code path never touched the network.
pub struct MockLedger {
    objects: RwLock<HashMap<String, ObjectRead>>,
    pool: RwLock<PoolObject>,
    failing: RwLock<Vec<String>>,
    offline: AtomicBool,
    latency: Duration,
    object_reads: AtomicU32,
    pool_reads: AtomicU32,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            pool: RwLock::new(PoolObject::default()),
            failing: RwLock::new(Vec::new()),
            offline: AtomicBool::new(false),
            latency: Duration::ZERO,
            object_reads: AtomicU32::new(0),
            pool_reads: AtomicU32::new(0),
        }
    }

    /// Register a live object of the given type.
    pub fn with_object(self, id: impl Into<String>, type_tag: impl Into<String>) -> Self {
        self.insert_object(id, type_tag);
        self
    }

    /// Set the pool members, in ledger order.
    pub fn with_pool(self, member_ids: Vec<String>, balance: u64) -> Self {
        self.set_pool(member_ids, balance);
        self
    }

    /// Make reads of this id fail with a transport error.
    pub fn with_failing(self, id: impl Into<String>) -> Self {
        write(&self.failing).push(id.into());
        self
    }

    /// Delay every read, so concurrent callers actually interleave.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn insert_object(&self, id: impl Into<String>, type_tag: impl Into<String>) {
        let id = id.into();
        let fields = json!({ "id": { "id": id.clone() } });
        write(&self.objects).insert(id, ObjectRead::live(type_tag, fields));
    }

    pub fn remove_object(&self, id: &str) {
        write(&self.objects).remove(id);
    }

    pub fn set_pool(&self, member_ids: Vec<String>, balance: u64) {
        *write(&self.pool) = PoolObject {
            member_ids,
            balance_minor_units: balance,
        };
    }

    /// Simulate an unreachable fullnode.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `get_object` calls so far
    pub fn object_reads(&self) -> u32 {
        self.object_reads.load(Ordering::SeqCst)
    }

    /// Number of `get_pool_object` calls so far
    pub fn pool_reads(&self) -> u32 {
        self.pool_reads.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.object_reads.store(0, Ordering::SeqCst);
        self.pool_reads.store(0, Ordering::SeqCst);
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn transport_error(&self, what: &str) -> PolicyError {
        PolicyError::TransportFailure {
            attempts: 1,
            message: format!("mock ledger unreachable reading {}", what),
        }
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerReader for MockLedger {
    async fn get_object(&self, id: &str) -> Result<ObjectRead> {
        self.object_reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.offline.load(Ordering::SeqCst) || read(&self.failing).iter().any(|f| f == id) {
            return Err(self.transport_error(id));
        }

        Ok(read(&self.objects)
            .get(id)
            .cloned()
            .unwrap_or_else(ObjectRead::missing))
    }

    async fn get_pool_object(&self, pool_id: &str) -> Result<PoolObject> {
        self.pool_reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(self.transport_error(pool_id));
        }

        Ok(read(&self.pool).clone())
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
