//! Sui fullnode JSON-RPC reader
//!
//! Uses `sui_getObject` with `showType` and `showContent`. Transport
//! failures (connection errors, timeouts, 429 and 5xx) are retried with
//! exponential backoff; JSON-RPC errors are returned as-is.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::{json_id, json_u64, LedgerReader, ObjectRead, PoolObject};
use crate::config::{ContractConfig, NetworkConfig};
use crate::error::{PolicyError, Result};

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// No retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(2u32.pow(exponent))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

impl From<&NetworkConfig> for RetryPolicy {
    fn from(network: &NetworkConfig) -> Self {
        Self::new(
            network.retry_attempts,
            Duration::from_millis(network.retry_base_delay_ms),
        )
    }
}

/// Outcome of a single request attempt
enum AttemptError {
    Retryable(String),
    Fatal(PolicyError),
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ObjectResponse {
    #[serde(default)]
    data: Option<ObjectData>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ObjectData {
    #[serde(rename = "type", default)]
    object_type: Option<String>,
    #[serde(default)]
    content: Option<MoveContent>,
}

#[derive(Debug, Deserialize)]
struct MoveContent {
    #[serde(rename = "type", default)]
    move_type: Option<String>,
    #[serde(default)]
    fields: Value,
}

// =============================================================================
// Reader
// =============================================================================

/// Ledger reader backed by a Sui fullnode.
///
/// # Example
///
/// ```rust,no_run
/// use flight_insurance_sdk::{Config, LedgerReader, SuiRpcReader};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let reader = SuiRpcReader::new(&config.network, &config.contract)?;
/// let pool = reader.get_pool_object(&config.contract.pool_id).await?;
/// println!("{} policies", pool.member_ids.len());
/// # Ok(())
/// # }
/// ```
pub struct SuiRpcReader {
    client: Client,
    rpc_url: String,
    members_field: String,
    balance_field: String,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl SuiRpcReader {
    pub fn new(network: &NetworkConfig, contract: &ContractConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(network.request_timeout())
            .build()
            .map_err(|e| PolicyError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rpc_url: network.rpc_url.clone(),
            members_field: contract.pool_members_field.clone(),
            balance_field: contract.pool_balance_field.clone(),
            retry: RetryPolicy::from(network),
            next_id: AtomicU64::new(1),
        })
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Issue a JSON-RPC call, retrying transport failures.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.call_once(method, &params).await {
                Ok(result) => return Ok(result),
                Err(AttemptError::Retryable(message)) if attempt < self.retry.attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        method,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Ledger read failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(AttemptError::Retryable(message)) => {
                    return Err(PolicyError::TransportFailure {
                        attempts: attempt,
                        message,
                    });
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
            }
        }
    }

    async fn call_once(
        &self,
        method: &str,
        params: &Value,
    ) -> std::result::Result<Value, AttemptError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Retryable(format!(
                "HTTP {} - {}",
                status.as_u16(),
                body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Fatal(PolicyError::Rpc {
                code: i64::from(status.as_u16()),
                message: body,
            }));
        }

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Retryable(format!("unreadable RPC response: {}", e)))?;

        if let Some(err) = envelope.error {
            return Err(AttemptError::Fatal(PolicyError::Rpc {
                code: err.code,
                message: err.message,
            }));
        }

        envelope.result.ok_or_else(|| {
            AttemptError::Fatal(PolicyError::Serialization(
                "RPC response has neither result nor error".into(),
            ))
        })
    }
}

#[async_trait]
impl LedgerReader for SuiRpcReader {
    async fn get_object(&self, id: &str) -> Result<ObjectRead> {
        let result = self
            .call(
                "sui_getObject",
                json!([id, { "showType": true, "showContent": true }]),
            )
            .await?;

        let response: ObjectResponse = serde_json::from_value(result)?;

        if let Some(error) = response.error {
            // notExists, deleted, ...
            debug!(object_id = id, error = %error, "Object not available on ledger");
            return Ok(ObjectRead::missing());
        }

        let Some(data) = response.data else {
            return Ok(ObjectRead::missing());
        };

        let (content_type, fields) = match data.content {
            Some(content) => (content.move_type, content.fields),
            None => (None, Value::Null),
        };
        let type_tag = data.object_type.or(content_type).unwrap_or_default();

        Ok(ObjectRead::live(type_tag, fields))
    }

    async fn get_pool_object(&self, pool_id: &str) -> Result<PoolObject> {
        let object = self.get_object(pool_id).await?;
        if !object.exists {
            return Err(PolicyError::NotFound(pool_id.to_string()));
        }

        let members = object
            .fields
            .get(&self.members_field)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                PolicyError::Serialization(format!(
                    "pool {} has no '{}' vector",
                    pool_id, self.members_field
                ))
            })?;

        let member_ids = members.iter().filter_map(json_id).collect::<Vec<_>>();
        if member_ids.len() != members.len() {
            warn!(
                pool_id,
                skipped = members.len() - member_ids.len(),
                "Ignoring pool members that are not object ids"
            );
        }

        let balance_minor_units = object
            .fields
            .get(&self.balance_field)
            .and_then(json_u64)
            .ok_or_else(|| {
                PolicyError::Serialization(format!(
                    "pool {} has no readable '{}' field",
                    pool_id, self.balance_field
                ))
            })?;

        Ok(PoolObject {
            member_ids,
            balance_minor_units,
        })
    }
}
