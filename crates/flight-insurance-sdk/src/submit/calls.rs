//! Typed contract calls.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ContractConfig;

/// Move type of an object id argument
pub const OBJECT_ID_TYPE: &str = "0x2::object::ID";

/// One argument to a Move call.
///
/// u64 values travel as decimal strings, the way fullnodes render them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallArg {
    /// Shared or owned object by id
    Object { id: String },
    /// Pure value with its Move type
    Pure { type_tag: String, value: Value },
    /// Coin of `amount` MIST split off the gas coin
    GasCoin { amount: String },
}

impl CallArg {
    pub fn object(id: impl Into<String>) -> Self {
        Self::Object { id: id.into() }
    }

    /// UTF-8 bytes as `vector<u8>`
    pub fn bytes(text: &str) -> Self {
        Self::Pure {
            type_tag: "vector<u8>".into(),
            value: json!(text.as_bytes()),
        }
    }

    pub fn u64(value: u64) -> Self {
        Self::Pure {
            type_tag: "u64".into(),
            value: Value::String(value.to_string()),
        }
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::Pure {
            type_tag: OBJECT_ID_TYPE.into(),
            value: Value::String(id.into()),
        }
    }

    pub fn ids(ids: &[String]) -> Self {
        Self::Pure {
            type_tag: format!("vector<{}>", OBJECT_ID_TYPE),
            value: json!(ids),
        }
    }

    pub fn gas_coin(amount_mist: u64) -> Self {
        Self::GasCoin {
            amount: amount_mist.to_string(),
        }
    }
}

/// A fully resolved Move call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCall {
    /// `package::module::function`
    pub target: String,
    pub arguments: Vec<CallArg>,
}

impl MoveCall {
    /// Function name, the last path segment of the target
    pub fn function(&self) -> &str {
        self.target.rsplit("::").next().unwrap_or(&self.target)
    }
}

/// The ledger-mutating operations of the insurance contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    CreatePolicy {
        flight_number: String,
        airline: String,
        /// Unix seconds
        departure_timestamp: u64,
        coverage_mist: u64,
        premium_mist: u64,
    },
    ProcessClaim {
        policy_id: String,
        delay_minutes: u64,
    },
    AddFunds {
        amount_mist: u64,
    },
    CleanupCorrupted {
        policy_ids: Vec<String>,
    },
}

impl LedgerCall {
    /// Operation name for logs
    pub fn operation(&self) -> &'static str {
        match self {
            Self::CreatePolicy { .. } => "createPolicy",
            Self::ProcessClaim { .. } => "processClaim",
            Self::AddFunds { .. } => "addFunds",
            Self::CleanupCorrupted { .. } => "cleanupCorrupted",
        }
    }

    /// Move function implementing the operation
    pub fn function(&self) -> &'static str {
        match self {
            Self::CreatePolicy { .. } => "create_policy",
            Self::ProcessClaim { .. } => "process_claim",
            Self::AddFunds { .. } => "add_funds",
            Self::CleanupCorrupted { .. } => "cleanup_corrupted_policies",
        }
    }

    /// Build the call against the contract's pool.
    pub fn to_move_call(&self, contract: &ContractConfig) -> MoveCall {
        let pool = CallArg::object(&contract.pool_id);
        let arguments = match self {
            Self::CreatePolicy {
                flight_number,
                airline,
                departure_timestamp,
                coverage_mist,
                premium_mist,
            } => vec![
                pool,
                CallArg::bytes(flight_number),
                CallArg::bytes(airline),
                CallArg::u64(*departure_timestamp),
                CallArg::u64(*coverage_mist),
                CallArg::gas_coin(*premium_mist),
            ],
            Self::ProcessClaim {
                policy_id,
                delay_minutes,
            } => vec![pool, CallArg::id(policy_id), CallArg::u64(*delay_minutes)],
            Self::AddFunds { amount_mist } => vec![pool, CallArg::gas_coin(*amount_mist)],
            Self::CleanupCorrupted { policy_ids } => vec![pool, CallArg::ids(policy_ids)],
        };

        MoveCall {
            target: contract.target(self.function()),
            arguments,
        }
    }
}
