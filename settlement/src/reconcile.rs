//! Reconciliation tool
//!
//! Recomputes a driver's ledger from the full history of settled trips by
//! replaying the settlement algorithm in memory, then subtracts the
//! driver's payout records and compares against the live snapshot. The two
//! invocation paths share one processor, but drift can still enter through
//! bugs or manual edits; this tool makes it detectable after the fact
//! instead of assumed away.
//!
//! Read-only by default. In apply mode it overwrites the live snapshot
//! with the replay result through the same version-checked atomic write
//! the settlement commit uses.

use crate::{
    fare::FarePolicy,
    processor::apply_trip,
    risk::CashRiskPolicy,
    types::ReconcileReport,
    Error, Result,
};
use chrono::Utc;
use ledger_core::{DriverId, DriverLedger, Ledger, TransactionKind};
use std::sync::Arc;

/// Ledger reconciler
pub struct Reconciler {
    ledger: Arc<Ledger>,
    fare: FarePolicy,
    risk: CashRiskPolicy,
}

impl Reconciler {
    /// Create new reconciler
    pub fn new(ledger: Arc<Ledger>, fare: FarePolicy, risk: CashRiskPolicy) -> Self {
        Self { ledger, fare, risk }
    }

    /// Create from configuration
    pub fn from_config(ledger: Arc<Ledger>, config: &crate::Config) -> Result<Self> {
        Ok(Self::new(ledger, config.fare_policy()?, config.risk_policy()))
    }

    /// Reconcile a driver's ledger against its settled trip history
    ///
    /// Only mutates state when `apply` is true.
    pub async fn reconcile(&self, driver_id: &DriverId, apply: bool) -> Result<ReconcileReport> {
        let trips = self.ledger.get_completed_trips(driver_id).await?;
        let stored = self.ledger.get_driver_ledger(driver_id).await?;

        // Replay in completion order through the exact settlement algorithm
        let mut replayed = DriverLedger::new(driver_id.clone(), Utc::now().date_naive());

        for trip in &trips {
            let completed_at = trip.completed_at.ok_or_else(|| {
                Error::Validation(format!(
                    "settled trip {} has no completion time",
                    trip.trip_id
                ))
            })?;

            let split = self.fare.split(trip.total_price)?;
            let application = apply_trip(
                &replayed,
                trip.trip_id,
                trip.payment_method,
                &split,
                &self.risk,
                completed_at,
                completed_at.date_naive(),
            );
            replayed = application.ledger;
        }

        // Payouts are legitimate out-of-band balance reductions; without
        // them every paid-out driver would read as drifted
        let records = self.ledger.get_driver_records(driver_id).await?;
        for record in &records {
            if record.kind == TransactionKind::Payout {
                replayed.balance -= record.amount;
            }
        }

        let report = ReconcileReport {
            driver_id: driver_id.clone(),
            computed_balance: replayed.balance,
            computed_debt: replayed.debt,
            stored_balance: stored.balance,
            stored_debt: stored.debt,
            balance_delta: stored.balance - replayed.balance,
            debt_delta: stored.debt - replayed.debt,
            trips_replayed: trips.len(),
            applied: false,
        };

        if report.in_sync() {
            tracing::info!(
                driver_id = %driver_id,
                trips = trips.len(),
                "Ledger in sync with trip history"
            );
            return Ok(report);
        }

        tracing::warn!(
            driver_id = %driver_id,
            balance_delta = %report.balance_delta,
            debt_delta = %report.debt_delta,
            trips = trips.len(),
            "Ledger drift detected"
        );

        if !apply {
            return Ok(report);
        }

        // Overwrite the live snapshot with the replay result
        let mut corrected = replayed;
        corrected.updated_at = Utc::now();
        self.ledger
            .overwrite_ledger(corrected, stored.version)
            .await?;

        tracing::info!(
            driver_id = %driver_id,
            balance = %report.computed_balance,
            debt = %report.computed_debt,
            "Ledger snapshot corrected from trip history"
        );

        Ok(ReconcileReport {
            applied: true,
            ..report
        })
    }
}
