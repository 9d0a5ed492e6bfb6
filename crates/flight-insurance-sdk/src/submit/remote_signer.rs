//! HTTP client for a remote transaction signing service.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{ExecutionOutcome, LedgerEvent, MoveCall, TransactionExecutor};
use crate::config::SignerConfig;
use crate::error::{PolicyError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest<'a> {
    request_id: String,
    transaction: &'a MoveCall,
    options: ExecuteOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteOptions {
    show_effects: bool,
    show_events: bool,
    show_object_changes: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    #[serde(default)]
    digest: String,
    #[serde(default)]
    events: Vec<LedgerEvent>,
    #[serde(default)]
    created_object_ids: Vec<String>,
    /// Set when the ledger executed but aborted the transaction
    #[serde(default)]
    error: Option<String>,
}

/// Executor that delegates signing to a remote service.
///
/// `POST {url}/execute` with the Move call; the service signs with the
/// user's key, executes, and answers with digest, events and created
/// object ids.
///
/// # Example
///
/// ```rust,no_run
/// use flight_insurance_sdk::{RemoteSignerExecutor, SignerConfig};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = RemoteSignerExecutor::new(&SignerConfig {
///     url: Some("http://localhost:9000".into()),
///     ..Default::default()
/// })?;
/// # Ok(())
/// # }
/// ```
pub struct RemoteSignerExecutor {
    client: Client,
    base_url: String,
}

impl RemoteSignerExecutor {
    pub fn new(config: &SignerConfig) -> Result<Self> {
        let base_url = config
            .url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PolicyError::Config("signer.url is not set".into()))?;

        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| PolicyError::Config("signer.api_key is not a valid header".into()))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PolicyError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TransactionExecutor for RemoteSignerExecutor {
    async fn execute(&self, call: &MoveCall) -> Result<ExecutionOutcome> {
        let url = format!("{}/execute", self.base_url);
        let request = ExecuteRequest {
            request_id: Uuid::new_v4().to_string(),
            transaction: call,
            options: ExecuteOptions {
                show_effects: true,
                show_events: true,
                show_object_changes: true,
            },
        };
        debug!(call = %call.target, request_id = %request.request_id, "Submitting transaction to signer");

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PolicyError::SubmissionRejected(format!(
                "HTTP {} - {}",
                status, body
            )));
        }

        let body: ExecuteResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(PolicyError::SubmissionRejected(error));
        }

        Ok(ExecutionOutcome {
            digest: body.digest,
            events: body.events,
            created_object_ids: body.created_object_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_url() {
        let err = RemoteSignerExecutor::new(&SignerConfig::default()).err().unwrap();
        assert!(matches!(err, PolicyError::Config(_)));
    }

    #[test]
    fn test_trims_trailing_slash() {
        let executor = RemoteSignerExecutor::new(&SignerConfig {
            url: Some("http://signer.local/".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(executor.base_url(), "http://signer.local");
    }
}
