//! BranchLedger Simulator
//!
//! Hammers one in-memory bank with concurrent tellers and checks that the
//! books still balance afterwards.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use branchledger_common::Amount;
use branchledger_ledger::{BalanceCheck, Bank, LedgerConfig};

mod controller;
mod metrics;
mod scenario;

use controller::{SimulationController, WorkloadConfig};
use scenario::Scenario;

/// BranchLedger Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Concurrent workload driver for the BranchLedger engine")]
struct Args {
    /// Number of branches (overrides LEDGER_BRANCHES)
    #[arg(short, long)]
    branches: Option<u32>,

    /// Accounts per branch (overrides LEDGER_ACCOUNTS_PER_BRANCH)
    #[arg(short, long)]
    accounts: Option<u32>,

    /// Opening balance of every account (overrides LEDGER_INITIAL_AMOUNT)
    #[arg(long)]
    initial_amount: Option<Amount>,

    /// Worker threads
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Operations per worker
    #[arg(short, long, default_value = "10000")]
    operations: u64,

    /// Operations between balance reports (0 = no reports)
    #[arg(long, default_value = "1000")]
    report_interval: u64,

    /// Scenario to run
    #[arg(short, long, default_value = "balanced")]
    scenario: String,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Open every fourth account at -1 to exercise the audit
    #[arg(long)]
    fault_injection: bool,

    /// Balance check mode: advisory or atomic (overrides LEDGER_BALANCE_CHECK)
    #[arg(long)]
    balance_check: Option<BalanceCheck>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Args {
    fn ledger_config(&self) -> LedgerConfig {
        let mut config = LedgerConfig::from_env();
        if let Some(branches) = self.branches {
            config.num_branches = branches;
        }
        if let Some(accounts) = self.accounts {
            config.accounts_per_branch = accounts;
        }
        if let Some(amount) = self.initial_amount {
            config.initial_amount = amount;
        }
        if let Some(check) = self.balance_check {
            config.balance_check = check;
        }
        config.fault_injection |= self.fault_injection;
        config
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting BranchLedger Simulator");

    let config = args.ledger_config();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let scenario = Scenario::load(&args.scenario)?;
    let bank = Arc::new(Bank::new(&config)?);

    let controller = SimulationController::new(
        bank,
        WorkloadConfig {
            workers: args.workers,
            operations_per_worker: args.operations,
            report_interval: args.report_interval,
            seed: args.seed,
        },
    );
    let summary = controller.run(&scenario)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    let metrics = &summary.metrics;
    info!("Total operations: {}", metrics.total_operations());
    info!(
        "Deposits: {}, withdrawals: {}, transfers: {}",
        metrics.deposits, metrics.withdrawals, metrics.transfers
    );
    info!("Insufficient funds: {}", metrics.insufficient_funds);
    info!("Reports: {}", summary.reports.len());
    info!("Final total: {}", summary.audit.total);

    if !summary.is_consistent() {
        error!(issues = summary.audit.issues.len(), "Ledger is inconsistent");
        summary.audit.into_result()?;
        return Err(anyhow::anyhow!("Balance reports did not match the books"));
    }

    info!("Ledger is consistent");
    Ok(())
}
