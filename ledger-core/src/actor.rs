//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors:
//! - One logical writer task owns all trip and ledger mutations, so two
//!   trips completing for the same driver serialize rather than race
//! - Async message passing with backpressure (bounded mailbox)
//!
//! Reads also flow through the actor so callers observe a consistent
//! ordering with respect to in-flight commits.

use crate::types::{DriverId, DriverLedger, TransactionKind, TransactionRecord, Trip, TripStatus};
use crate::{Error, Result, Storage};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Create a trip
    CreateTrip {
        /// Trip to persist
        trip: Trip,
        /// Reply channel
        response: oneshot::Sender<Result<Uuid>>,
    },

    /// Get trip by ID
    GetTrip {
        /// Trip ID
        trip_id: Uuid,
        /// Reply channel
        response: oneshot::Sender<Result<Trip>>,
    },

    /// Move a trip through its lifecycle
    UpdateTripStatus {
        /// Trip ID
        trip_id: Uuid,
        /// New status
        status: TripStatus,
        /// Reply: previous status plus the updated trip
        response: oneshot::Sender<Result<(TripStatus, Trip)>>,
    },

    /// Get driver ledger (lazy zero state if absent)
    GetLedger {
        /// Driver ID
        driver_id: DriverId,
        /// Reply channel
        response: oneshot::Sender<Result<DriverLedger>>,
    },

    /// Get driver transaction records in creation order
    GetDriverRecords {
        /// Driver ID
        driver_id: DriverId,
        /// Reply channel
        response: oneshot::Sender<Result<Vec<TransactionRecord>>>,
    },

    /// Get completed trips for a driver in completion order
    GetCompletedTrips {
        /// Driver ID
        driver_id: DriverId,
        /// Reply channel
        response: oneshot::Sender<Result<Vec<Trip>>>,
    },

    /// Commit a settlement atomically
    CommitSettlement {
        /// Trip with fee/gross/settled_at recorded
        trip: Trip,
        /// New ledger snapshot
        ledger: DriverLedger,
        /// Records justifying the mutation
        records: Vec<TransactionRecord>,
        /// Ledger version the writer read
        expected_version: u64,
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Overwrite a ledger snapshot (reconcile apply path)
    OverwriteLedger {
        /// Replacement snapshot
        ledger: DriverLedger,
        /// Ledger version the writer read
        expected_version: u64,
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Pay out from a driver balance
    RecordPayout {
        /// Driver ID
        driver_id: DriverId,
        /// Payout amount
        amount: Decimal,
        /// Free-text reason for the audit record
        reason: String,
        /// Reply: the payout record
        response: oneshot::Sender<Result<TransactionRecord>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
pub struct LedgerActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(storage: Arc<Storage>, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { storage, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => break,
                _ => self.handle_message(msg),
            }
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::CreateTrip { trip, response } => {
                let _ = response.send(self.create_trip(trip));
            }

            LedgerMessage::GetTrip { trip_id, response } => {
                let _ = response.send(self.storage.get_trip(trip_id));
            }

            LedgerMessage::UpdateTripStatus {
                trip_id,
                status,
                response,
            } => {
                let _ = response.send(self.update_trip_status(trip_id, status));
            }

            LedgerMessage::GetLedger {
                driver_id,
                response,
            } => {
                let today = Utc::now().date_naive();
                let _ = response.send(self.storage.get_ledger(&driver_id, today));
            }

            LedgerMessage::GetDriverRecords {
                driver_id,
                response,
            } => {
                let _ = response.send(self.storage.get_driver_records(&driver_id));
            }

            LedgerMessage::GetCompletedTrips {
                driver_id,
                response,
            } => {
                let _ = response.send(self.storage.get_completed_trips(&driver_id));
            }

            LedgerMessage::CommitSettlement {
                trip,
                ledger,
                records,
                expected_version,
                response,
            } => {
                let result =
                    self.storage
                        .commit_settlement(&trip, &ledger, &records, expected_version);
                let _ = response.send(result);
            }

            LedgerMessage::OverwriteLedger {
                ledger,
                expected_version,
                response,
            } => {
                let result = self
                    .storage
                    .commit_ledger_update(&ledger, &[], expected_version);
                let _ = response.send(result);
            }

            LedgerMessage::RecordPayout {
                driver_id,
                amount,
                reason,
                response,
            } => {
                let _ = response.send(self.record_payout(driver_id, amount, reason));
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    /// Create a trip, rejecting duplicate ids
    ///
    /// Trip ids are immutable once written; replacing an existing trip
    /// (a settled one in particular) would erase its settlement fields.
    fn create_trip(&self, trip: Trip) -> Result<Uuid> {
        if self.storage.get_trip_opt(trip.trip_id)?.is_some() {
            return Err(Error::InvalidTrip(format!(
                "trip {} already exists",
                trip.trip_id
            )));
        }

        let trip_id = trip.trip_id;
        self.storage.put_trip(&trip)?;
        Ok(trip_id)
    }

    /// Lifecycle transition with terminal-state protection
    ///
    /// A Completed → Completed re-delivery is a no-op returning the stored
    /// trip, so retried status updates never corrupt settled trips.
    fn update_trip_status(
        &self,
        trip_id: Uuid,
        status: TripStatus,
    ) -> Result<(TripStatus, Trip)> {
        let mut trip = self.storage.get_trip(trip_id)?;
        let previous = trip.status;

        if previous == status {
            return Ok((previous, trip));
        }

        if previous.is_terminal() {
            return Err(Error::InvalidTrip(format!(
                "trip {} is terminal ({:?}), cannot move to {:?}",
                trip_id, previous, status
            )));
        }

        trip.status = status;
        if status == TripStatus::Completed && trip.completed_at.is_none() {
            trip.completed_at = Some(Utc::now());
        }

        self.storage.put_trip(&trip)?;
        Ok((previous, trip))
    }

    /// Manual payout: balance decreases, one Payout record, same atomic unit
    fn record_payout(
        &self,
        driver_id: DriverId,
        amount: Decimal,
        reason: String,
    ) -> Result<TransactionRecord> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidPayout(format!(
                "payout amount must be positive, got {}",
                amount
            )));
        }

        let today = Utc::now().date_naive();
        let ledger = self.storage.get_ledger(&driver_id, today)?;

        if amount > ledger.balance {
            return Err(Error::InvalidPayout(format!(
                "payout {} exceeds balance {} for driver {}",
                amount, ledger.balance, driver_id
            )));
        }

        let now = Utc::now();
        let record = TransactionRecord {
            record_id: Uuid::now_v7(),
            driver_id: driver_id.clone(),
            trip_id: None,
            kind: TransactionKind::Payout,
            amount,
            balance_before: ledger.balance,
            balance_after: ledger.balance - amount,
            debt_before: ledger.debt,
            debt_after: ledger.debt,
            reason,
            created_at: now,
        };

        let mut snapshot = ledger.clone();
        snapshot.balance -= amount;
        snapshot.updated_at = now;

        self.storage
            .commit_ledger_update(&snapshot, std::slice::from_ref(&record), ledger.version)?;

        tracing::info!(
            driver_id = %driver_id,
            amount = %amount,
            balance_after = %record.balance_after,
            "Payout recorded"
        );

        Ok(record)
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Create a trip
    pub async fn create_trip(&self, trip: Trip) -> Result<Uuid> {
        self.request(|response| LedgerMessage::CreateTrip { trip, response })
            .await
    }

    /// Get trip by ID
    pub async fn get_trip(&self, trip_id: Uuid) -> Result<Trip> {
        self.request(|response| LedgerMessage::GetTrip { trip_id, response })
            .await
    }

    /// Update trip status, returning the previous status and updated trip
    pub async fn update_trip_status(
        &self,
        trip_id: Uuid,
        status: TripStatus,
    ) -> Result<(TripStatus, Trip)> {
        self.request(|response| LedgerMessage::UpdateTripStatus {
            trip_id,
            status,
            response,
        })
        .await
    }

    /// Get driver ledger
    pub async fn get_ledger(&self, driver_id: DriverId) -> Result<DriverLedger> {
        self.request(|response| LedgerMessage::GetLedger {
            driver_id,
            response,
        })
        .await
    }

    /// Get driver records
    pub async fn get_driver_records(&self, driver_id: DriverId) -> Result<Vec<TransactionRecord>> {
        self.request(|response| LedgerMessage::GetDriverRecords {
            driver_id,
            response,
        })
        .await
    }

    /// Get completed trips
    pub async fn get_completed_trips(&self, driver_id: DriverId) -> Result<Vec<Trip>> {
        self.request(|response| LedgerMessage::GetCompletedTrips {
            driver_id,
            response,
        })
        .await
    }

    /// Commit a settlement
    pub async fn commit_settlement(
        &self,
        trip: Trip,
        ledger: DriverLedger,
        records: Vec<TransactionRecord>,
        expected_version: u64,
    ) -> Result<()> {
        self.request(|response| LedgerMessage::CommitSettlement {
            trip,
            ledger,
            records,
            expected_version,
            response,
        })
        .await
    }

    /// Overwrite a ledger snapshot
    pub async fn overwrite_ledger(
        &self,
        ledger: DriverLedger,
        expected_version: u64,
    ) -> Result<()> {
        self.request(|response| LedgerMessage::OverwriteLedger {
            ledger,
            expected_version,
            response,
        })
        .await
    }

    /// Record a payout
    pub async fn record_payout(
        &self,
        driver_id: DriverId,
        amount: Decimal,
        reason: String,
    ) -> Result<TransactionRecord> {
        self.request(|response| LedgerMessage::RecordPayout {
            driver_id,
            amount,
            reason,
            response,
        })
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(storage: Arc<Storage>, mailbox_capacity: usize) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = LedgerActor::new(storage, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
