//! Read-only ledger access
//!
//! The ledger is the authoritative store for policy objects and pool
//! membership. This layer only queries it; mutation goes through
//! [`crate::submit`].
//!
//! - `SuiRpcReader`: Sui fullnode JSON-RPC
//! - `MockLedger`: in-memory ledger for tests

mod mock;
mod sui_rpc;

pub use mock::MockLedger;
pub use sui_rpc::{RetryPolicy, SuiRpcReader};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Result of reading one object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRead {
    pub exists: bool,
    /// Declared Move type, empty when the object does not exist
    pub type_tag: String,
    pub fields: Value,
}

impl ObjectRead {
    pub fn missing() -> Self {
        Self {
            exists: false,
            type_tag: String::new(),
            fields: Value::Null,
        }
    }

    pub fn live(type_tag: impl Into<String>, fields: Value) -> Self {
        Self {
            exists: true,
            type_tag: type_tag.into(),
            fields,
        }
    }
}

/// Decoded shared pool object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolObject {
    /// Member policy ids in ledger order
    pub member_ids: Vec<String>,
    pub balance_minor_units: u64,
}

/// Read-only queries against the authoritative store.
///
/// Implementations may retry transient transport failures internally;
/// an error returned from here means the retry budget is spent.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Fetch an object. A missing object is `Ok` with `exists == false`.
    async fn get_object(&self, id: &str) -> Result<ObjectRead>;

    /// Fetch and decode the shared pool.
    async fn get_pool_object(&self, pool_id: &str) -> Result<PoolObject>;
}

/// Read a u64 that may be a JSON number, a decimal string (how Sui renders
/// u64 and `Balance`), or wrapped as `{ "value": .. }`.
pub(crate) fn json_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        Value::Object(map) => map
            .get("value")
            .or_else(|| map.get("fields").and_then(|f| f.get("value")))
            .and_then(json_u64),
        _ => None,
    }
}

/// Read an object id that may be a plain string or `{ "id": .. }`.
pub(crate) fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("id").and_then(json_id),
        _ => None,
    }
}
