//! Main ledger orchestration layer
//!
//! Ties together storage, the single-writer actor, and metrics into a
//! high-level API for trip and driver ledger state.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> ledger_core::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(config).await?;
//!
//!     // let trip_id = ledger.create_trip(...).await?;
//!
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    metrics::Metrics,
    types::{
        replay_records, DriverId, DriverLedger, TransactionRecord, Trip, TripStatus,
    },
    Config, Error, Result, Storage,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Main ledger interface
pub struct Ledger {
    /// Actor handle for all operations
    handle: LedgerHandle,

    /// Direct storage access (stats only; writes go through the actor)
    storage: Arc<Storage>,

    /// Prometheus metrics
    metrics: Metrics,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let handle = spawn_ledger_actor(storage.clone(), config.mailbox_capacity);
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        Ok(Self {
            handle,
            storage,
            metrics,
        })
    }

    /// Create a trip
    ///
    /// Negative prices are rejected before anything is written.
    pub async fn create_trip(&self, trip: Trip) -> Result<Uuid> {
        if trip.total_price < Decimal::ZERO {
            return Err(Error::InvalidTrip(format!(
                "trip price must be non-negative, got {}",
                trip.total_price
            )));
        }

        let trip_id = self.handle.create_trip(trip).await?;
        self.metrics.record_trip_created();
        Ok(trip_id)
    }

    /// Get trip by ID
    pub async fn get_trip(&self, trip_id: Uuid) -> Result<Trip> {
        self.handle.get_trip(trip_id).await
    }

    /// Update trip status, returning the previous status and updated trip
    ///
    /// Callers detect the not-completed → completed transition from the
    /// returned previous status.
    pub async fn update_trip_status(
        &self,
        trip_id: Uuid,
        status: TripStatus,
    ) -> Result<(TripStatus, Trip)> {
        self.handle.update_trip_status(trip_id, status).await
    }

    /// Get driver ledger (lazy zero state if the driver has none yet)
    pub async fn get_driver_ledger(&self, driver_id: &DriverId) -> Result<DriverLedger> {
        self.handle.get_ledger(driver_id.clone()).await
    }

    /// Get driver transaction records in creation order
    pub async fn get_driver_records(
        &self,
        driver_id: &DriverId,
    ) -> Result<Vec<TransactionRecord>> {
        self.handle.get_driver_records(driver_id.clone()).await
    }

    /// Get completed trips for a driver in completion order
    pub async fn get_completed_trips(&self, driver_id: &DriverId) -> Result<Vec<Trip>> {
        self.handle.get_completed_trips(driver_id.clone()).await
    }

    /// Commit a settlement atomically
    ///
    /// Writes the trip (fee/gross/settled_at), the full ledger snapshot,
    /// and every transaction record in one batch. A version mismatch
    /// surfaces as a retryable `LedgerConflict` with nothing written.
    pub async fn commit_settlement(
        &self,
        trip: Trip,
        ledger: DriverLedger,
        records: Vec<TransactionRecord>,
        expected_version: u64,
    ) -> Result<()> {
        let record_count = records.len();
        let start = Instant::now();

        let result = self
            .handle
            .commit_settlement(trip, ledger, records, expected_version)
            .await;

        match &result {
            Ok(()) => {
                self.metrics.record_settlement(record_count);
                self.metrics
                    .record_commit_duration(start.elapsed().as_secs_f64());
            }
            Err(Error::LedgerConflict { .. }) => self.metrics.record_conflict(),
            Err(_) => {}
        }

        result
    }

    /// Overwrite a ledger snapshot (reconcile apply path)
    pub async fn overwrite_ledger(
        &self,
        ledger: DriverLedger,
        expected_version: u64,
    ) -> Result<()> {
        self.handle.overwrite_ledger(ledger, expected_version).await
    }

    /// Pay out from a driver balance (manual operation)
    pub async fn record_payout(
        &self,
        driver_id: &DriverId,
        amount: Decimal,
        reason: impl Into<String>,
    ) -> Result<TransactionRecord> {
        self.handle
            .record_payout(driver_id.clone(), amount, reason.into())
            .await
    }

    /// Verify the transaction log reproduces the live ledger snapshot
    ///
    /// The log is the source of truth; any mismatch is an invariant
    /// violation (drift), not a recoverable condition.
    pub async fn verify_ledger_derivability(&self, driver_id: &DriverId) -> Result<()> {
        let ledger = self.get_driver_ledger(driver_id).await?;
        let records = self.get_driver_records(driver_id).await?;

        let (balance, debt) = replay_records(&records);
        if balance != ledger.balance || debt != ledger.debt {
            return Err(Error::InvariantViolation(format!(
                "ledger for driver {} diverged from its log: stored ({}, {}), replayed ({}, {})",
                driver_id, ledger.balance, ledger.debt, balance, debt
            )));
        }

        Ok(())
    }

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<crate::storage::StorageStats> {
        self.storage.get_stats()
    }

    /// Prometheus metrics handle
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethod;

    async fn create_test_ledger() -> (Ledger, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Ledger::open(config).await.unwrap(), temp_dir)
    }

    #[tokio::test]
    async fn test_ledger_open() {
        let (ledger, _temp) = create_test_ledger().await;
        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_negative_price_rejected() {
        let (ledger, _temp) = create_test_ledger().await;

        let trip = Trip::new(
            Uuid::new_v4(),
            Decimal::new(-10_00, 2),
            PaymentMethod::Digital,
        );
        let result = ledger.create_trip(trip).await;
        assert!(matches!(result, Err(Error::InvalidTrip(_))));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_and_get_trip() {
        let (ledger, _temp) = create_test_ledger().await;

        let trip = Trip::new(Uuid::new_v4(), Decimal::new(42_50, 2), PaymentMethod::Cash);
        let trip_id = ledger.create_trip(trip).await.unwrap();

        let retrieved = ledger.get_trip(trip_id).await.unwrap();
        assert_eq!(retrieved.total_price, Decimal::new(42_50, 2));
        assert_eq!(retrieved.status, TripStatus::Searching);
        assert!(!retrieved.is_settled());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_trip() {
        let (ledger, _temp) = create_test_ledger().await;

        let result = ledger.get_trip(Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::TripNotFound(_))));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_derivability_on_empty_ledger() {
        let (ledger, _temp) = create_test_ledger().await;

        let driver = DriverId::new("driver-1");
        ledger.verify_ledger_derivability(&driver).await.unwrap();

        ledger.shutdown().await.unwrap();
    }
}
