//! Subcommands and their terminal output

use anyhow::Context;
use clap::Subcommand;
use serde::Serialize;

use flight_insurance_sdk::{
    Divergence, PolicyRecord, PolicyRequest, PolicyService, PoolStatus, ReconcileReport,
    RepairOptions, Resolution, Verification, DELAY_THRESHOLD_MINUTES,
};

/// CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show pool balance and membership
    Pool,

    /// List locally cached policies
    Policies,

    /// Check whether an id is a live policy object
    Verify {
        /// Policy object id
        id: String,
    },

    /// Compare the local cache with the pool and plan repairs
    Reconcile {
        /// Write the cache repairs
        #[arg(long)]
        apply: bool,
        /// Submit a cleanup transaction for corrupted pool entries
        #[arg(long)]
        cleanup: bool,
    },

    /// Show which policy id a claim would use
    Resolve {
        /// Policy id to try first
        candidate: Option<String>,
    },

    /// Buy a policy
    Create {
        /// Flight number, e.g. AA123
        #[arg(long)]
        flight: String,
        /// Airline name
        #[arg(long)]
        airline: String,
        /// Departure, ISO-8601 (naive times are UTC)
        #[arg(long)]
        departure: String,
        /// Coverage in SUI
        #[arg(long)]
        coverage: String,
        /// Premium in SUI
        #[arg(long)]
        premium: String,
    },

    /// Claim a payout for a delayed flight
    Claim {
        /// Policy id; resolved from the pool when omitted or unusable
        #[arg(long)]
        policy_id: Option<String>,
        /// Delay in minutes
        #[arg(long)]
        delay: u64,
    },

    /// Add collateral to the pool
    Fund {
        /// Amount in SUI
        amount: String,
    },
}

impl Commands {
    /// Needs a transaction signer
    pub fn is_mutating(&self) -> bool {
        match self {
            Commands::Create { .. } | Commands::Claim { .. } | Commands::Fund { .. } => true,
            Commands::Reconcile { cleanup, .. } => *cleanup,
            _ => false,
        }
    }
}

/// Execute a command, returning what to print.
pub async fn execute_command(
    service: &PolicyService,
    command: Commands,
    json: bool,
) -> anyhow::Result<String> {
    match command {
        Commands::Pool => {
            let status = service.pool_status().await.context("reading pool")?;
            render(json, &status, format_pool)
        }

        Commands::Policies => {
            let policies = service.policies();
            render(json, &policies, |p| format_policies(p))
        }

        Commands::Verify { id } => {
            let verdict = service.verify(&id).await;
            if json {
                return to_json(&serde_json::json!({ "id": id, "verification": verdict }));
            }
            Ok(format_verification(&id, &verdict))
        }

        Commands::Reconcile { apply, cleanup } => {
            let report = service
                .reconcile_and_repair(RepairOptions { apply, cleanup })
                .await?;
            render(json, &report, format_report)
        }

        Commands::Resolve { candidate } => {
            let resolution = service
                .prepare_claim(candidate.as_deref().unwrap_or_default())
                .await;
            render(json, &resolution, format_resolution)
        }

        Commands::Create {
            flight,
            airline,
            departure,
            coverage,
            premium,
        } => {
            let request = PolicyRequest {
                flight_number: flight,
                airline,
                departure_time: departure,
                coverage_amount: coverage,
                premium,
            };
            let created = service.create_policy(&request).await?;
            render(json, &created, |c| c.message())
        }

        Commands::Claim { policy_id, delay } => {
            let result = service
                .submit_claim(policy_id.as_deref().unwrap_or_default(), delay)
                .await?;
            render(json, &result, |r| {
                let mut output = String::new();
                if r.resolution.is_substitution() {
                    output.push_str(&r.resolution.explain());
                    output.push('\n');
                }
                output.push_str(&format!("Policy:  {}\n", r.policy_id));
                output.push_str(&format!("Digest:  {}\n", r.digest));
                output.push_str(&r.message());
                output
            })
        }

        Commands::Fund { amount } => {
            let digest = service.add_funds(&amount).await?;
            if json {
                return to_json(&serde_json::json!({ "digest": digest }));
            }
            Ok(format!("Added {} SUI to the pool ({})", amount.trim(), digest))
        }
    }
}

fn render<T: Serialize>(json: bool, value: &T, text: impl Fn(&T) -> String) -> anyhow::Result<String> {
    if json {
        to_json(value)
    } else {
        Ok(text(value))
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Format pool status for display
fn format_pool(status: &PoolStatus) -> String {
    let mut output = String::new();
    output.push_str("Insurance Pool\n");
    output.push_str("==============\n\n");
    output.push_str(&format!("Pool ID:     {}\n", status.pool_id));
    output.push_str(&format!(
        "Balance:     {} SUI ({} MIST)\n",
        status.balance_sui, status.balance_mist
    ));
    output.push_str(&format!("Policies:    {}\n", status.member_count));
    output.push_str(&format!(
        "Threshold:   {} minutes\n",
        DELAY_THRESHOLD_MINUTES
    ));
    output
}

/// Format cached policies for display
fn format_policies(policies: &[PolicyRecord]) -> String {
    if policies.is_empty() {
        return "No cached policies".to_string();
    }

    let mut output = String::new();
    output.push_str("Cached Policies\n");
    output.push_str("===============\n\n");

    for policy in policies {
        output.push_str(&format!("{} [{}]\n", policy.policy_id, policy.status));
        if policy.is_placeholder() {
            output.push_str("  (details unknown, recovered from the pool)\n");
        } else {
            output.push_str(&format!(
                "  {} {} departing {}\n",
                policy.airline, policy.flight_number, policy.departure_time
            ));
            output.push_str(&format!(
                "  coverage {} SUI, premium {} SUI\n",
                policy.coverage_amount, policy.premium
            ));
        }
    }

    output
}

fn format_verification(id: &str, verdict: &Verification) -> String {
    match verdict {
        Verification::Live => format!("{} is a live policy", id),
        other => format!("{} is not a live policy: {}", id, other),
    }
}

/// Format a reconciliation report for display
fn format_report(report: &ReconcileReport) -> String {
    let mut output = String::new();
    output.push_str("Reconciliation\n");
    output.push_str("==============\n\n");

    if report.pool_read_error.is_none() {
        let sections = [
            ("Add to cache", Divergence::PoolOnlyMissingLocal),
            ("Remove from cache", Divergence::LocalOnlyOrphan),
            ("Corrupted in pool", Divergence::PoolOnlyCorrupted),
            ("Not in pool (kept)", Divergence::LocalOnlyGhost),
            ("Unverified (skipped)", Divergence::Unverified),
        ];
        for (title, divergence) in sections {
            let ids: Vec<&str> = report.plan.ids_with(divergence).collect();
            if ids.is_empty() {
                continue;
            }
            output.push_str(&format!("{}:\n", title));
            for id in ids {
                output.push_str(&format!("  - {}\n", id));
            }
        }
    }

    output.push_str(&report.summary());
    output
}

/// Format a claim resolution for display
fn format_resolution(resolution: &Resolution) -> String {
    let mut output = resolution.explain();
    if resolution.recommended.is_some() {
        output.push_str(&format!(
            "\nIn local cache: {}",
            if resolution.in_local_cache { "yes" } else { "no" }
        ));
    }
    output
}
