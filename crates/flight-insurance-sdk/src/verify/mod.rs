//! Existence verification
//!
//! Answers "does this identifier denote a live policy object?". The answer
//! is advisory: read failures fold into "no" rather than surfacing as
//! errors, but the verdict keeps the reason for diagnostics.

use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ContractConfig;
use crate::error::PolicyError;
use crate::ledger::LedgerReader;
use crate::types::identifier;

/// Diagnostic verdict for one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verification {
    /// Exists and has the policy type
    Live,
    /// Failed the structural check; the ledger was not queried
    Malformed,
    /// Ledger has no such object
    NotFound,
    /// Object exists with a different type
    TypeMismatch { found: String },
    /// Ledger read failed after retries; says nothing about existence
    Unreachable { reason: String, attempts: u32 },
}

impl Verification {
    pub fn is_live(&self) -> bool {
        matches!(self, Verification::Live)
    }

    /// Whether the ledger actually answered. An unreachable ledger is not
    /// evidence that the object is gone.
    pub fn is_conclusive(&self) -> bool {
        !matches!(self, Verification::Unreachable { .. })
    }

    /// Short label for logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            Verification::Live => "live",
            Verification::Malformed => "malformed",
            Verification::NotFound => "not_found",
            Verification::TypeMismatch { .. } => "type_mismatch",
            Verification::Unreachable { .. } => "unreachable",
        }
    }

    /// The error this verdict stands for, if any
    pub fn to_error(&self, id: &str, expected_type: &str) -> Option<PolicyError> {
        match self {
            Verification::Live => None,
            Verification::Malformed => Some(PolicyError::MalformedIdentifier(id.to_string())),
            Verification::NotFound => Some(PolicyError::NotFound(id.to_string())),
            Verification::TypeMismatch { found } => Some(PolicyError::TypeMismatch {
                id: id.to_string(),
                expected: expected_type.to_string(),
                found: found.clone(),
            }),
            Verification::Unreachable { reason, attempts } => {
                Some(PolicyError::TransportFailure {
                    attempts: *attempts,
                    message: reason.clone(),
                })
            }
        }
    }
}

impl std::fmt::Display for Verification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verification::TypeMismatch { found } => write!(f, "type_mismatch ({})", found),
            Verification::Unreachable { reason, .. } => write!(f, "unreachable ({})", reason),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Checks identifiers against the ledger.
#[derive(Clone)]
pub struct ExistenceVerifier {
    reader: Arc<dyn LedgerReader>,
    expected_type: String,
}

impl ExistenceVerifier {
    /// `expected_type` is matched as a substring of the object's type tag.
    pub fn new(reader: Arc<dyn LedgerReader>, expected_type: impl Into<String>) -> Self {
        Self {
            reader,
            expected_type: expected_type.into(),
        }
    }

    /// Verifier expecting the contract's policy type.
    pub fn for_contract(reader: Arc<dyn LedgerReader>, contract: &ContractConfig) -> Self {
        Self::new(reader, contract.policy_type())
    }

    pub fn expected_type(&self) -> &str {
        &self.expected_type
    }

    /// `true` iff the id is a live, correctly-typed policy object.
    pub async fn verify(&self, id: &str) -> bool {
        self.verify_detailed(id).await.is_live()
    }

    /// Full verdict. Never fails.
    pub async fn verify_detailed(&self, id: &str) -> Verification {
        if !identifier::is_well_formed(id) {
            debug!(id, "Rejecting malformed identifier without a ledger read");
            return Verification::Malformed;
        }

        let verdict = match self.reader.get_object(id).await {
            Ok(object) if !object.exists => Verification::NotFound,
            Ok(object) if object.type_tag.contains(&self.expected_type) => Verification::Live,
            Ok(object) => Verification::TypeMismatch {
                found: object.type_tag,
            },
            Err(err) => Verification::Unreachable {
                attempts: match &err {
                    PolicyError::TransportFailure { attempts, .. } => *attempts,
                    _ => 1,
                },
                reason: err.to_string(),
            },
        };

        match &verdict {
            Verification::Live => debug!(id, "Policy object verified"),
            Verification::Unreachable { reason, .. } => {
                warn!(id, error = %reason, "Ledger unreachable while verifying policy")
            }
            other => debug!(id, verdict = %other, "Policy object failed verification"),
        }

        verdict
    }

    /// Verify many ids concurrently; returns once every verdict is in.
    pub async fn verify_many<'a, I>(&self, ids: I) -> HashMap<String, Verification>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unique: BTreeSet<&str> = ids.into_iter().collect();
        let checks = unique.into_iter().map(|id| async move {
            let verdict = self.verify_detailed(id).await;
            (id.to_string(), verdict)
        });

        join_all(checks).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedger;

    const POLICY_TYPE: &str = "0xpkg::flight_insurance::Policy";

    fn id(c: char) -> String {
        format!("0x{}", c.to_string().repeat(64))
    }

    fn verifier(ledger: Arc<MockLedger>) -> ExistenceVerifier {
        ExistenceVerifier::new(ledger, POLICY_TYPE)
    }

    #[tokio::test]
    async fn test_live_policy() {
        let ledger = Arc::new(MockLedger::new().with_object(id('a'), POLICY_TYPE));
        let verifier = verifier(ledger.clone());

        assert!(verifier.verify(&id('a')).await);
        assert_eq!(ledger.object_reads(), 1);
    }

    #[tokio::test]
    async fn test_malformed_never_reaches_ledger() {
        let ledger = Arc::new(MockLedger::new());
        let verifier = verifier(ledger.clone());

        let bad_ids = vec![
            String::new(),
            "0x".to_string(),
            "0xABC".to_string(),
            "policy-1".to_string(),
            id('A'),
            format!("{}0", id('a')),
        ];
        for bad in &bad_ids {
            assert_eq!(verifier.verify_detailed(bad).await, Verification::Malformed);
        }
        assert_eq!(ledger.object_reads(), 0);
    }

    #[tokio::test]
    async fn test_not_found_and_type_mismatch() {
        let ledger = Arc::new(
            MockLedger::new().with_object(id('b'), "0x2::coin::Coin<0x2::sui::SUI>"),
        );
        let verifier = verifier(ledger);

        assert_eq!(verifier.verify_detailed(&id('a')).await, Verification::NotFound);
        assert_eq!(
            verifier.verify_detailed(&id('b')).await,
            Verification::TypeMismatch {
                found: "0x2::coin::Coin<0x2::sui::SUI>".into()
            }
        );
        assert!(!verifier.verify(&id('b')).await);
    }

    #[tokio::test]
    async fn test_transport_failure_is_false_not_error() {
        let ledger = Arc::new(MockLedger::new().with_failing(id('c')));
        let verifier = verifier(ledger);

        let verdict = verifier.verify_detailed(&id('c')).await;
        assert_eq!(verdict.label(), "unreachable");
        assert!(!verdict.is_live());
        assert!(!verdict.is_conclusive());

        let err = verdict.to_error(&id('c'), POLICY_TYPE).unwrap();
        assert!(err.is_retryable());
        assert!(matches!(err, PolicyError::TransportFailure { attempts: 1, .. }));
    }

    #[test]
    fn test_to_error_keeps_reader_attempts() {
        let verdict = Verification::Unreachable {
            reason: "connection refused".into(),
            attempts: 3,
        };
        assert!(matches!(
            verdict.to_error(&id('d'), POLICY_TYPE),
            Some(PolicyError::TransportFailure { attempts: 3, ref message }) if message == "connection refused"
        ));
        assert!(Verification::NotFound.is_conclusive());
    }

    #[tokio::test]
    async fn test_verify_many_deduplicates() {
        let ledger = Arc::new(MockLedger::new().with_object(id('a'), POLICY_TYPE));
        let verifier = verifier(ledger.clone());

        let a = id('a');
        let b = id('b');
        let verdicts = verifier
            .verify_many([a.as_str(), b.as_str(), a.as_str(), "junk"])
            .await;

        assert_eq!(verdicts.len(), 3);
        assert!(verdicts[&a].is_live());
        assert_eq!(verdicts[&b], Verification::NotFound);
        assert_eq!(verdicts["junk"], Verification::Malformed);
        assert_eq!(ledger.object_reads(), 2);
    }
}
