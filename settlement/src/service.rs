//! Invocation adapters for the settlement processor
//!
//! Two paths reach settlement and both converge on the one
//! `SettlementProcessor`:
//!
//! - **Direct**: the application marks a trip completed and settles it in
//!   the same call (`CompletionService::complete_trip`)
//! - **Trigger**: trip status changes arrive as events on a channel and
//!   completions are settled by the watcher (`run_watcher`)

use crate::{
    processor::SettlementProcessor,
    types::{SettlementOutcome, TripStatusEvent},
    Result,
};
use ledger_core::{Ledger, TripStatus};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Direct invocation path: complete and settle in one call
pub struct CompletionService {
    ledger: Arc<Ledger>,
    processor: Arc<SettlementProcessor>,
}

impl CompletionService {
    /// Create new service
    pub fn new(ledger: Arc<Ledger>, processor: Arc<SettlementProcessor>) -> Self {
        Self { ledger, processor }
    }

    /// Mark a trip completed and settle it
    ///
    /// Safe to call repeatedly: the status transition is a no-op on a
    /// completed trip, and the processor's guard skips settled trips.
    pub async fn complete_trip(&self, trip_id: uuid::Uuid) -> Result<SettlementOutcome> {
        let (previous, _trip) = self
            .ledger
            .update_trip_status(trip_id, TripStatus::Completed)
            .await?;

        if previous == TripStatus::Completed {
            tracing::debug!(trip_id = %trip_id, "Completion re-delivered");
        }

        self.processor.settle(trip_id).await
    }
}

/// Trigger invocation path: consume trip status events and settle
/// completions
///
/// Per-event settlement failures are logged and skipped; the trip stays
/// unsettled and eligible for a later retry, and the watcher keeps
/// consuming.
pub async fn run_watcher(
    processor: Arc<SettlementProcessor>,
    mut events: mpsc::Receiver<TripStatusEvent>,
) {
    tracing::info!("Trip status watcher started");

    while let Some(event) = events.recv().await {
        if !event.is_completion() {
            tracing::trace!(
                trip_id = %event.trip_id,
                previous = ?event.previous,
                current = ?event.current,
                "Ignoring non-completion transition"
            );
            continue;
        }

        match processor.settle(event.trip_id).await {
            Ok(SettlementOutcome::Settled(summary)) => {
                tracing::debug!(
                    trip_id = %event.trip_id,
                    records = summary.record_count,
                    "Watcher settled trip"
                );
            }
            Ok(SettlementOutcome::AlreadySettled { .. }) => {
                tracing::debug!(trip_id = %event.trip_id, "Watcher saw re-delivered completion");
            }
            Err(e) => {
                tracing::error!(
                    trip_id = %event.trip_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Watcher settlement failed, trip remains unsettled"
                );
            }
        }
    }

    tracing::info!("Trip status watcher stopped");
}
