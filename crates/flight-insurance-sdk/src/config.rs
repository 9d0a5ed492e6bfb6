//! SDK configuration
//!
//! Loaded from TOML. Every section has defaults pointing at the public
//! testnet deployment, so an empty or missing file is a valid config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PolicyError, Result};
use crate::types::identifier;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub contract: ContractConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub signer: SignerConfig,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, falling back to defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check the values the SDK cannot work without.
    pub fn validate(&self) -> Result<()> {
        if !identifier::is_well_formed(&self.contract.package_id) {
            return Err(PolicyError::Config(format!(
                "contract.package_id is not a 32-byte hex id: {}",
                self.contract.package_id
            )));
        }
        if !identifier::is_well_formed(&self.contract.pool_id) {
            return Err(PolicyError::Config(format!(
                "contract.pool_id is not a 32-byte hex id: {}",
                self.contract.pool_id
            )));
        }
        if self.network.retry_attempts == 0 {
            return Err(PolicyError::Config(
                "network.retry_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Fullnode JSON-RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Total attempts for a ledger read, first try included
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            request_timeout_secs: default_request_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Where the insurance contract and its shared pool live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Move package id
    #[serde(default = "default_package_id")]
    pub package_id: String,

    /// Shared InsurancePool object id
    #[serde(default = "default_pool_id")]
    pub pool_id: String,

    /// Move module name
    #[serde(default = "default_module_name")]
    pub module_name: String,

    /// Move struct name of a policy object
    #[serde(default = "default_policy_struct")]
    pub policy_struct: String,

    /// Pool field holding the vector of member policy ids
    #[serde(default = "default_members_field")]
    pub pool_members_field: String,

    /// Pool field holding the collateral balance
    #[serde(default = "default_balance_field")]
    pub pool_balance_field: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            package_id: default_package_id(),
            pool_id: default_pool_id(),
            module_name: default_module_name(),
            policy_struct: default_policy_struct(),
            pool_members_field: default_members_field(),
            pool_balance_field: default_balance_field(),
        }
    }
}

impl ContractConfig {
    /// Fully qualified Move type of a policy object
    pub fn policy_type(&self) -> String {
        format!(
            "{}::{}::{}",
            self.package_id, self.module_name, self.policy_struct
        )
    }

    /// Fully qualified event type emitted by the module
    pub fn event_type(&self, event: &str) -> String {
        format!("{}::{}::{}", self.package_id, self.module_name, event)
    }

    /// Move call target for a module function
    pub fn target(&self, function: &str) -> String {
        format!("{}::{}::{}", self.package_id, self.module_name, function)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// File holding the persisted policy cache
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
        }
    }
}

/// Remote signing service used for ledger-mutating calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Base URL of the signer; read-only operation when unset
    #[serde(default)]
    pub url: Option<String>,

    /// Bearer token for the signer
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_signer_timeout")]
    pub timeout_secs: u64,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: default_signer_timeout(),
        }
    }
}

// Defaults
fn default_rpc_url() -> String { "https://fullnode.testnet.sui.io:443".to_string() }
fn default_request_timeout() -> u64 { 30 }
fn default_retry_attempts() -> u32 { 3 }
fn default_retry_base_delay() -> u64 { 200 }
fn default_package_id() -> String {
    "0x5ca97a7f3b2b9608848d234255cd34c50d6378d0155b9d779a68029b87fda700".to_string()
}
fn default_pool_id() -> String {
    "0x48ee799b814ccbdfb178ce0e248a80879354e97ac7778d20ad5e9c0182eea90c".to_string()
}
fn default_module_name() -> String { "flight_insurance".to_string() }
fn default_policy_struct() -> String { "Policy".to_string() }
fn default_members_field() -> String { "policies".to_string() }
fn default_balance_field() -> String { "balance".to_string() }
fn default_cache_path() -> PathBuf { PathBuf::from("flight-insurance-policies.json") }
fn default_signer_timeout() -> u64 { 60 }
