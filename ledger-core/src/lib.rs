//! Veloz Driver Ledger Core
//!
//! Persistent state for the trip settlement engine: trips, per-driver
//! ledgers, and the append-only transaction record log.
//!
//! # Architecture
//!
//! - **Single Writer**: one actor task owns all mutations, so settlements
//!   for the same driver serialize rather than race
//! - **Append-only log**: transaction records are never modified or
//!   deleted; replaying them reproduces the ledger snapshot exactly
//! - **Atomic commits**: trip update, ledger snapshot, and records land
//!   in one RocksDB write batch, guarded by an optimistic snapshot version
//!
//! # Invariants
//!
//! - `balance >= 0` and `debt >= 0` after every commit
//! - Every balance/debt change has a transaction record explaining it
//! - Settlement fields on a trip are written at most once

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use storage::Storage;
pub use types::{
    replay_records, CashRideCounter, DriverId, DriverLedger, PaymentMethod, TransactionKind,
    TransactionRecord, Trip, TripStatus,
};
