//! flight-insurance: command-line front end for flight delay insurance
//!
//! Reads the insurance pool and policy objects from a Sui fullnode, keeps
//! the local policy cache in step with the pool, and submits policy,
//! claim and funding transactions through a remote signer.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use tracing::{debug, info};

use commands::Commands;
use flight_insurance_sdk::{
    Config, FileSlot, PolicyService, RecordStore, RemoteSignerExecutor, SuiRpcReader,
};

#[derive(Debug, Parser)]
#[command(name = "flight-insurance")]
#[command(about = "Flight delay insurance policies on Sui")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "flight-insurance.toml")]
    config: String,

    /// Fullnode JSON-RPC URL (overrides config file)
    #[arg(long, env = "FLIGHT_RPC_URL")]
    rpc_url: Option<String>,

    /// Insurance package id (overrides config file)
    #[arg(long, env = "FLIGHT_PACKAGE_ID")]
    package_id: Option<String>,

    /// Insurance pool object id (overrides config file)
    #[arg(long, env = "FLIGHT_POOL_ID")]
    pool_id: Option<String>,

    /// Local policy cache file (overrides config file)
    #[arg(long, env = "FLIGHT_CACHE_PATH")]
    cache_path: Option<PathBuf>,

    /// Remote signer URL (overrides config file)
    #[arg(long, env = "FLIGHT_SIGNER_URL")]
    signer_url: Option<String>,

    /// Remote signer API key
    #[arg(long, env = "FLIGHT_SIGNER_API_KEY", hide_env_values = true)]
    signer_api_key: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Apply command-line and environment overrides.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref rpc_url) = self.rpc_url {
            config.network.rpc_url = rpc_url.clone();
        }
        if let Some(ref package_id) = self.package_id {
            config.contract.package_id = package_id.clone();
        }
        if let Some(ref pool_id) = self.pool_id {
            config.contract.pool_id = pool_id.clone();
        }
        if let Some(ref cache_path) = self.cache_path {
            config.cache.path = cache_path.clone();
        }
        if let Some(ref signer_url) = self.signer_url {
            config.signer.url = Some(signer_url.clone());
        }
        if let Some(ref api_key) = self.signer_api_key {
            config.signer.api_key = Some(api_key.clone());
        }
    }
}

fn build_service(config: &Config) -> anyhow::Result<PolicyService> {
    let reader = Arc::new(SuiRpcReader::new(&config.network, &config.contract)?);
    let store = RecordStore::new(Arc::new(FileSlot::new(&config.cache.path)));
    let service = PolicyService::new(config.contract.clone(), reader, store);

    if config.signer.url.is_some() {
        let executor = RemoteSignerExecutor::new(&config.signer)?;
        debug!(signer = %executor.base_url(), "Transaction signer configured");
        return Ok(service.with_executor(Arc::new(executor)));
    }
    Ok(service)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flight_insurance=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    info!(rpc_url = %config.network.rpc_url, pool_id = %config.contract.pool_id, "Using insurance pool");
    info!(cache = %config.cache.path.display(), "Policy cache");

    if cli.command.is_mutating() && config.signer.url.is_none() {
        bail!("this command submits a transaction; set signer.url, --signer-url or FLIGHT_SIGNER_URL");
    }

    let service = build_service(&config)?;

    match commands::execute_command(&service, cli.command, cli.json).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
