//! Types for the settlement engine

use chrono::{DateTime, Duration, Utc};
use ledger_core::{DriverId, PaymentMethod, TripStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of a settlement attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SettlementOutcome {
    /// The trip was already settled; nothing was written
    AlreadySettled {
        /// Trip ID
        trip_id: Uuid,
    },

    /// Settlement committed
    Settled(SettlementSummary),
}

/// Net effect of a committed settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSummary {
    /// Trip ID
    pub trip_id: Uuid,

    /// Driver whose ledger was updated
    pub driver_id: DriverId,

    /// Payment method of the trip
    pub payment_method: PaymentMethod,

    /// Platform fee retained
    pub fee: Decimal,

    /// Driver gross
    pub driver_gross: Decimal,

    /// Balance after settlement
    pub balance_after: Decimal,

    /// Debt after settlement
    pub debt_after: Decimal,

    /// Block flag after settlement
    pub blocked_for_cash: bool,

    /// Transaction records appended
    pub record_count: usize,
}

/// Trip status change as delivered by the trigger adapter
///
/// Re-delivery of the same transition is expected; the settlement
/// processor's idempotency guard makes duplicates harmless.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TripStatusEvent {
    /// Trip whose status changed
    pub trip_id: Uuid,

    /// Status before the change
    pub previous: TripStatus,

    /// Status after the change
    pub current: TripStatus,
}

impl TripStatusEvent {
    /// Whether this event is the completion transition that triggers
    /// settlement
    pub fn is_completion(&self) -> bool {
        self.previous != TripStatus::Completed && self.current == TripStatus::Completed
    }
}

/// Result of comparing a replayed ledger against the live snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Driver reconciled
    pub driver_id: DriverId,

    /// Balance recomputed from trip history
    pub computed_balance: Decimal,

    /// Debt recomputed from trip history
    pub computed_debt: Decimal,

    /// Live snapshot balance
    pub stored_balance: Decimal,

    /// Live snapshot debt
    pub stored_debt: Decimal,

    /// `stored_balance - computed_balance`
    pub balance_delta: Decimal,

    /// `stored_debt - computed_debt`
    pub debt_delta: Decimal,

    /// Completed trips replayed
    pub trips_replayed: usize,

    /// Whether the live snapshot was overwritten with the replay result
    pub applied: bool,
}

impl ReconcileReport {
    /// Whether the live ledger matches the replay exactly
    pub fn in_sync(&self) -> bool {
        self.balance_delta.is_zero() && self.debt_delta.is_zero()
    }
}

/// Reporting window for earnings summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EarningsWindow {
    /// Trailing 24 hours
    Day,
    /// Trailing 7 days
    Week,
    /// Trailing 30 days
    Month,
}

impl EarningsWindow {
    /// Window start relative to `now`
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            EarningsWindow::Day => now - Duration::days(1),
            EarningsWindow::Week => now - Duration::days(7),
            EarningsWindow::Month => now - Duration::days(30),
        }
    }
}

/// Earnings aggregation over settled trips in a window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsSummary {
    /// Driver summarized
    pub driver_id: DriverId,

    /// Reporting window
    pub window: EarningsWindow,

    /// Window start
    pub from: DateTime<Utc>,

    /// Window end
    pub to: DateTime<Utc>,

    /// Settled trips in the window
    pub trip_count: usize,

    /// Sum of driver gross over the window
    pub gross_earnings: Decimal,

    /// Sum of platform fees over the window
    pub fees: Decimal,

    /// Cash trips in the window
    pub cash_trips: usize,

    /// Digital trips in the window
    pub digital_trips: usize,
}
