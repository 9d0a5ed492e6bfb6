//! Ledger-mutating operations
//!
//! Everything that changes ledger state goes through [`ActionSubmitter`],
//! which turns a [`LedgerCall`] into a [`MoveCall`] and hands it to a
//! [`TransactionExecutor`] for signing and execution.
//!
//! - `RemoteSignerExecutor`: posts calls to a signing service over HTTP
//! - `MockExecutor`: records calls for tests

mod calls;
mod mock;
mod remote_signer;
mod submitter;

pub use calls::{CallArg, LedgerCall, MoveCall, OBJECT_ID_TYPE};
pub use mock::MockExecutor;
pub use remote_signer::RemoteSignerExecutor;
pub use submitter::ActionSubmitter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ContractConfig;
use crate::error::Result;
use crate::ledger::{json_id, json_u64};

/// Transaction digest
pub type TxDigest = String;

/// Event emitted by an executed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(rename = "parsedJson", default)]
    pub parsed_json: Value,
}

impl LedgerEvent {
    pub fn new(event_type: impl Into<String>, parsed_json: Value) -> Self {
        Self {
            event_type: event_type.into(),
            parsed_json,
        }
    }
}

/// Result of an executed transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub digest: TxDigest,
    #[serde(default)]
    pub events: Vec<LedgerEvent>,
    #[serde(default)]
    pub created_object_ids: Vec<String>,
}

impl ExecutionOutcome {
    pub fn find_event(&self, event_type: &str) -> Option<&LedgerEvent> {
        self.events.iter().find(|e| e.event_type == event_type)
    }

    /// New policy id from the `PolicyCreated` event, else the first created
    /// object.
    pub fn created_policy_id(&self, contract: &ContractConfig) -> Option<String> {
        self.find_event(&contract.event_type("PolicyCreated"))
            .and_then(|e| e.parsed_json.get("policy_id"))
            .and_then(json_id)
            .or_else(|| self.created_object_ids.first().cloned())
    }
}

/// How the contract decided a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    Approved { payout_mist: u64 },
    Rejected,
    /// Executed, but no `ClaimProcessed` event came back
    Unreported,
}

impl ClaimOutcome {
    /// Read the `ClaimProcessed` event of an executed claim.
    pub fn from_execution(outcome: &ExecutionOutcome, contract: &ContractConfig) -> Self {
        let Some(event) = outcome.find_event(&contract.event_type("ClaimProcessed")) else {
            return Self::Unreported;
        };

        match event.parsed_json.get("status").and_then(Value::as_str) {
            Some("APPROVED") => Self::Approved {
                payout_mist: event
                    .parsed_json
                    .get("amount")
                    .and_then(json_u64)
                    .unwrap_or(0),
            },
            _ => Self::Rejected,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

/// Signs and executes Move calls.
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    /// Execute one call as one transaction. A ledger rejection is
    /// `PolicyError::SubmissionRejected` with the ledger's message.
    async fn execute(&self, call: &MoveCall) -> Result<ExecutionOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_created_policy_id_prefers_event() {
        let contract = ContractConfig::default();
        let outcome = ExecutionOutcome {
            digest: "d1".into(),
            events: vec![LedgerEvent::new(
                contract.event_type("PolicyCreated"),
                json!({ "policy_id": "0xfeed", "flight_number": "AA1" }),
            )],
            created_object_ids: vec!["0xother".into()],
        };
        assert_eq!(outcome.created_policy_id(&contract).as_deref(), Some("0xfeed"));

        let bare = ExecutionOutcome {
            digest: "d2".into(),
            events: vec![],
            created_object_ids: vec!["0xother".into()],
        };
        assert_eq!(bare.created_policy_id(&contract).as_deref(), Some("0xother"));
        assert_eq!(ExecutionOutcome::default().created_policy_id(&contract), None);
    }

    #[test]
    fn test_claim_outcome_from_event() {
        let contract = ContractConfig::default();
        let event = |status: &str| ExecutionOutcome {
            digest: "d".into(),
            events: vec![LedgerEvent::new(
                contract.event_type("ClaimProcessed"),
                json!({ "status": status, "amount": "2000000000" }),
            )],
            created_object_ids: vec![],
        };

        assert_eq!(
            ClaimOutcome::from_execution(&event("APPROVED"), &contract),
            ClaimOutcome::Approved {
                payout_mist: 2_000_000_000
            }
        );
        assert_eq!(
            ClaimOutcome::from_execution(&event("REJECTED"), &contract),
            ClaimOutcome::Rejected
        );
        assert_eq!(
            ClaimOutcome::from_execution(&ExecutionOutcome::default(), &contract),
            ClaimOutcome::Unreported
        );
    }

    #[test]
    fn test_outcome_deserializes_wire_shape() {
        let outcome: ExecutionOutcome = serde_json::from_value(json!({
            "digest": "8xyz",
            "events": [{ "type": "0x1::m::E", "parsedJson": { "a": 1 } }],
            "createdObjectIds": ["0x5"]
        }))
        .unwrap();
        assert_eq!(outcome.events[0].event_type, "0x1::m::E");
        assert_eq!(outcome.created_object_ids, vec!["0x5".to_string()]);
    }
}
