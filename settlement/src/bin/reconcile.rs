//! Reconciliation CLI
//!
//! Recomputes a driver's ledger from settled trip history and reports
//! drift against the live snapshot. `--apply` overwrites the snapshot
//! with the replay result.
//!
//! Exit codes: 0 when in sync (or after a successful apply), 1 when
//! drift was detected and not applied.

use clap::Parser;
use ledger_core::DriverId;
use settlement::{Config, Reconciler};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "reconcile", about = "Recompute a driver ledger from trip history")]
struct Args {
    /// Driver to reconcile
    #[arg(long)]
    driver: String,

    /// Overwrite the live ledger with the replay result
    #[arg(long)]
    apply: bool,

    /// Configuration file (TOML); defaults to environment/defaults
    #[arg(long, env = "SETTLEMENT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let ledger_config = ledger_core::Config {
        data_dir: config.ledger_data_dir.clone(),
        ..Default::default()
    };
    let ledger = Arc::new(ledger_core::Ledger::open(ledger_config).await?);

    let reconciler = Reconciler::from_config(ledger.clone(), &config)?;
    let driver = DriverId::new(args.driver);

    let report = reconciler.reconcile(&driver, args.apply).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let exit = if report.in_sync() || report.applied {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    };

    Ok(exit)
}
