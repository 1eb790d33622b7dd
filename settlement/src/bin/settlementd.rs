//! Settlement daemon
//!
//! Opens the ledger and runs the trip status watcher until interrupted.
//! Trip status events arrive as JSON lines on stdin, one
//! `TripStatusEvent` per line; the upstream dispatch system pipes its
//! status feed in. Malformed lines are logged and skipped.

use settlement::{run_watcher, Config, SettlementProcessor, TripStatusEvent};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Veloz settlement daemon");

    // Load configuration
    let config = match std::env::var("SETTLEMENT_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::from_env()?,
    };

    // Open ledger
    let ledger_config = ledger_core::Config {
        data_dir: config.ledger_data_dir.clone(),
        ..Default::default()
    };
    let ledger = Arc::new(ledger_core::Ledger::open(ledger_config).await?);
    tracing::info!("Ledger opened");

    let processor = Arc::new(SettlementProcessor::from_config(ledger.clone(), &config)?);

    let (event_tx, event_rx) = mpsc::channel::<TripStatusEvent>(1024);
    let watcher = tokio::spawn(run_watcher(processor, event_rx));

    tracing::info!("Settlement daemon ready, reading status events from stdin");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received");
                break;
            }
            line = lines.next_line() => match line? {
                None => {
                    tracing::info!("Status feed closed");
                    break;
                }
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => match serde_json::from_str::<TripStatusEvent>(&line) {
                    Ok(event) => {
                        if event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring malformed status event");
                    }
                },
            },
        }
    }

    tracing::info!("Shutting down settlement daemon");
    drop(event_tx);
    watcher.await?;

    Ok(())
}
