//! Recording executor for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use super::{ExecutionOutcome, LedgerEvent, MoveCall, TransactionExecutor};
use crate::error::{PolicyError, Result};

/// Mock executor.
///
/// Records every call and answers with a configurable outcome. Digests
/// are numbered per call when the outcome leaves them empty.
pub struct MockExecutor {
    calls: Mutex<Vec<MoveCall>>,
    outcome: Mutex<ExecutionOutcome>,
    rejection: Mutex<Option<String>>,
    call_count: AtomicU32,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            outcome: Mutex::new(ExecutionOutcome::default()),
            rejection: Mutex::new(None),
            call_count: AtomicU32::new(0),
        }
    }

    /// Answer every call with this outcome.
    pub fn with_outcome(self, outcome: ExecutionOutcome) -> Self {
        self.set_outcome(outcome);
        self
    }

    /// Add an event to the outcome.
    pub fn with_event(self, event: LedgerEvent) -> Self {
        lock(&self.outcome).events.push(event);
        self
    }

    /// Reject every call with this ledger message.
    pub fn with_rejection(self, message: impl Into<String>) -> Self {
        self.set_rejection(Some(message.into()));
        self
    }

    pub fn set_outcome(&self, outcome: ExecutionOutcome) {
        *lock(&self.outcome) = outcome;
    }

    pub fn set_rejection(&self, message: Option<String>) {
        *lock(&self.rejection) = message;
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<MoveCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionExecutor for MockExecutor {
    async fn execute(&self, call: &MoveCall) -> Result<ExecutionOutcome> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.calls).push(call.clone());

        if let Some(message) = lock(&self.rejection).clone() {
            return Err(PolicyError::SubmissionRejected(message));
        }

        let mut outcome = lock(&self.outcome).clone();
        if outcome.digest.is_empty() {
            outcome.digest = format!("mock-digest-{}", n);
        }
        Ok(outcome)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
