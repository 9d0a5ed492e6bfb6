//! The single path to ledger-mutating transactions.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info};

use super::{ExecutionOutcome, LedgerCall, TransactionExecutor, TxDigest};
use crate::config::ContractConfig;
use crate::error::Result;

/// Builds contract calls and submits them through the executor.
#[derive(Clone)]
pub struct ActionSubmitter {
    executor: Arc<dyn TransactionExecutor>,
    contract: ContractConfig,
}

impl ActionSubmitter {
    pub fn new(executor: Arc<dyn TransactionExecutor>, contract: ContractConfig) -> Self {
        Self { executor, contract }
    }

    pub fn contract(&self) -> &ContractConfig {
        &self.contract
    }

    /// Submit one call as one transaction.
    pub async fn submit(&self, call: &LedgerCall) -> Result<ExecutionOutcome> {
        let move_call = call.to_move_call(&self.contract);
        match self.executor.execute(&move_call).await {
            Ok(outcome) => {
                info!(
                    operation = call.operation(),
                    digest = %outcome.digest,
                    events = outcome.events.len(),
                    "Transaction executed"
                );
                Ok(outcome)
            }
            Err(err) => {
                error!(operation = call.operation(), error = %err, "Transaction failed");
                Err(err)
            }
        }
    }

    /// Purge corrupted pool entries with one batched transaction.
    ///
    /// An empty set submits nothing and returns `Ok(None)`.
    pub async fn submit_cleanup(&self, ids: &BTreeSet<String>) -> Result<Option<TxDigest>> {
        if ids.is_empty() {
            return Ok(None);
        }

        let call = LedgerCall::CleanupCorrupted {
            policy_ids: ids.iter().cloned().collect(),
        };
        let outcome = self.submit(&call).await?;
        info!(count = ids.len(), digest = %outcome.digest, "Corrupted pool entries submitted for cleanup");
        Ok(Some(outcome.digest))
    }

    pub async fn create_policy(
        &self,
        flight_number: &str,
        airline: &str,
        departure_timestamp: u64,
        coverage_mist: u64,
        premium_mist: u64,
    ) -> Result<ExecutionOutcome> {
        self.submit(&LedgerCall::CreatePolicy {
            flight_number: flight_number.to_string(),
            airline: airline.to_string(),
            departure_timestamp,
            coverage_mist,
            premium_mist,
        })
        .await
    }

    pub async fn process_claim(
        &self,
        policy_id: &str,
        delay_minutes: u64,
    ) -> Result<ExecutionOutcome> {
        self.submit(&LedgerCall::ProcessClaim {
            policy_id: policy_id.to_string(),
            delay_minutes,
        })
        .await
    }

    pub async fn add_funds(&self, amount_mist: u64) -> Result<ExecutionOutcome> {
        self.submit(&LedgerCall::AddFunds { amount_mist }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submit::{CallArg, MockExecutor};

    fn submitter(executor: Arc<MockExecutor>) -> ActionSubmitter {
        ActionSubmitter::new(executor, ContractConfig::default())
    }

    #[tokio::test]
    async fn test_empty_cleanup_submits_nothing() {
        let executor = Arc::new(MockExecutor::new());
        let digest = submitter(executor.clone())
            .submit_cleanup(&BTreeSet::new())
            .await
            .unwrap();

        assert_eq!(digest, None);
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_is_one_batched_call() {
        let executor = Arc::new(MockExecutor::new());
        let ids = BTreeSet::from(["0x02".to_string(), "0x01".to_string(), "0x03".to_string()]);

        let digest = submitter(executor.clone()).submit_cleanup(&ids).await.unwrap();

        assert_eq!(digest.as_deref(), Some("mock-digest-1"));
        assert_eq!(executor.call_count(), 1);
        let call = &executor.calls()[0];
        assert_eq!(call.function(), "cleanup_corrupted_policies");
        assert_eq!(
            call.arguments[1],
            CallArg::ids(&["0x01".to_string(), "0x02".to_string(), "0x03".to_string()])
        );
    }

    #[tokio::test]
    async fn test_rejection_is_surfaced() {
        let executor = Arc::new(MockExecutor::new().with_rejection("MoveAbort(..., 3)"));
        let err = submitter(executor).add_funds(5).await.unwrap_err();
        assert!(err.to_string().contains("MoveAbort"));
    }
}
