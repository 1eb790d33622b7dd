//! Veloz Trip Settlement Engine
//!
//! Converts a completed trip's fare into platform revenue, driver
//! earnings, and driver debt, while enforcing the cash-ride risk policy.
//!
//! # Components
//!
//! - **Fare/Fee Policy** (`fare`): pure price → fee/gross split
//! - **Cash-Ride Risk Policy** (`risk`): pure debt/usage → block flag
//! - **Settlement Processor** (`processor`): the single settlement
//!   implementation, invoked from both adapters in `service`
//! - **Reconciliation** (`reconcile`): replays trip history and
//!   detects/corrects ledger drift
//! - **Earnings** (`earnings`): read-only reporting windows

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod earnings;
pub mod error;
pub mod fare;
pub mod processor;
pub mod reconcile;
pub mod risk;
pub mod service;
pub mod types;

// Re-exports
pub use config::{Config, RetryConfig};
pub use earnings::EarningsService;
pub use error::{Error, Result};
pub use fare::{FarePolicy, FareSplit};
pub use processor::{apply_trip, SettlementApplication, SettlementProcessor};
pub use reconcile::Reconciler;
pub use risk::CashRiskPolicy;
pub use service::{run_watcher, CompletionService};
pub use types::{
    EarningsSummary, EarningsWindow, ReconcileReport, SettlementOutcome, SettlementSummary,
    TripStatusEvent,
};
