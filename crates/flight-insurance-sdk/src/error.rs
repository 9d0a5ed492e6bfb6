//! Error types for the flight insurance SDK

use thiserror::Error;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, PolicyError>;

/// SDK error types
#[derive(Error, Debug)]
pub enum PolicyError {
    /// Identifier is not `0x` followed by 64 lowercase hex characters.
    /// Never reaches the ledger.
    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// Ledger has no such object
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Object exists but is not a policy
    #[error("Type mismatch for {id}: expected {expected}, found {found}")]
    TypeMismatch {
        id: String,
        expected: String,
        found: String,
    },

    /// Transport failed and the retry budget is exhausted
    #[error("Transport failure after {attempts} attempt(s): {message}")]
    TransportFailure { attempts: u32, message: String },

    /// Ledger RPC answered with a JSON-RPC error
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Ledger rejected a signed transaction, message kept verbatim
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    /// Persisted policy cache has an unrecognized shape
    #[error("Policy cache corrupt: {0}")]
    CacheCorrupt(String),

    /// User-supplied input failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Another reconciliation pass holds the store
    #[error("A reconciliation pass is already in progress")]
    ReconcileInProgress,

    /// No policy identifier could be resolved for a claim
    #[error("{0}")]
    ClaimUnresolvable(String),
}

impl PolicyError {
    /// Whether the operation may succeed if attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, PolicyError::TransportFailure { .. })
    }
}

impl From<reqwest::Error> for PolicyError {
    fn from(err: reqwest::Error) -> Self {
        PolicyError::TransportFailure {
            attempts: 1,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        PolicyError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for PolicyError {
    fn from(err: std::io::Error) -> Self {
        PolicyError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for PolicyError {
    fn from(err: toml::de::Error) -> Self {
        PolicyError::Config(err.to_string())
    }
}
