//! Core types for trips, driver ledgers, and transaction records
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Driver identifier (auth uid from the mobile platform)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriverId(String);

impl DriverId {
    /// Create new driver ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the passenger paid for a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Cash handed to the driver; the platform fee becomes driver debt
    Cash,
    /// In-app payment; the platform collects and credits the driver
    Digital,
}

impl PaymentMethod {
    /// Wire code
    pub fn code(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Digital => "digital",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "digital" => Some(PaymentMethod::Digital),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Trip lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TripStatus {
    /// Passenger requested, searching for a driver
    Searching = 1,
    /// Driver accepted the request
    Accepted = 2,
    /// Driver arrived at pickup
    Arrived = 3,
    /// Ride in progress
    InProgress = 4,
    /// Ride finished (terminal)
    Completed = 5,
    /// Ride cancelled (terminal)
    Cancelled = 6,
}

impl TripStatus {
    /// Check if status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

/// A ride from request to completion
///
/// `fee_charged`, `driver_gross` and `settled_at` are written exactly once,
/// by the settlement commit, in the same atomic batch as the ledger update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    /// Unique trip ID
    pub trip_id: Uuid,

    /// Assigned driver (none until a driver accepts)
    pub driver_id: Option<DriverId>,

    /// Total price paid by the passenger
    pub total_price: Decimal,

    /// Payment method
    pub payment_method: PaymentMethod,

    /// Current lifecycle status
    pub status: TripStatus,

    /// Platform fee retained, set at settlement
    pub fee_charged: Option<Decimal>,

    /// Driver gross (price minus fee), set at settlement
    pub driver_gross: Option<Decimal>,

    /// Settlement timestamp; presence is the idempotency guard
    pub settled_at: Option<DateTime<Utc>>,

    /// When the trip reached Completed
    pub completed_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Trip {
    /// Create a new trip in the Searching state
    pub fn new(trip_id: Uuid, total_price: Decimal, payment_method: PaymentMethod) -> Self {
        Self {
            trip_id,
            driver_id: None,
            total_price,
            payment_method,
            status: TripStatus::Searching,
            fee_charged: None,
            driver_gross: None,
            settled_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Whether settlement already ran for this trip
    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }
}

/// Daily cash-ride counter with its reference date
///
/// The reset-on-date-change transition lives here so call sites never
/// compare dates inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashRideCounter {
    /// Cash rides recorded on `date`
    pub count: u32,

    /// Reference date for `count`
    pub date: NaiveDate,
}

impl CashRideCounter {
    /// Zero counter anchored to `today`
    pub fn new(today: NaiveDate) -> Self {
        Self { count: 0, date: today }
    }

    /// Count valid for `today` (stale counters read as zero)
    pub fn current(&self, today: NaiveDate) -> u32 {
        if self.date == today {
            self.count
        } else {
            0
        }
    }

    /// Record one cash ride on `today`, resetting if the date changed
    pub fn record(self, today: NaiveDate) -> Self {
        if self.date == today {
            Self {
                count: self.count + 1,
                date: today,
            }
        } else {
            Self { count: 1, date: today }
        }
    }
}

/// Per-driver financial state
///
/// Owned exclusively by the settlement commit path; all fields are always
/// written together as one snapshot. `version` implements optimistic
/// concurrency: every committed snapshot bumps it by one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverLedger {
    /// Driver this ledger belongs to
    pub driver_id: DriverId,

    /// Withdrawable funds owed to the driver, never negative
    pub balance: Decimal,

    /// Platform fees outstanding from cash trips, never negative
    pub debt: Decimal,

    /// Daily cash-ride counter
    pub cash_rides: CashRideCounter,

    /// Whether the driver may accept cash trips (enforced elsewhere)
    pub blocked_for_cash: bool,

    /// Snapshot version for optimistic concurrency (0 = never persisted)
    pub version: u64,

    /// Last snapshot write
    pub updated_at: DateTime<Utc>,
}

impl DriverLedger {
    /// Lazy zero state for a driver with no ledger yet
    pub fn new(driver_id: DriverId, today: NaiveDate) -> Self {
        Self {
            driver_id,
            balance: Decimal::ZERO,
            debt: Decimal::ZERO,
            cash_rides: CashRideCounter::new(today),
            blocked_for_cash: false,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Check the non-negativity invariant
    pub fn check_invariants(&self) -> crate::Result<()> {
        if self.balance < Decimal::ZERO {
            return Err(crate::Error::InvariantViolation(format!(
                "negative balance {} for driver {}",
                self.balance, self.driver_id
            )));
        }
        if self.debt < Decimal::ZERO {
            return Err(crate::Error::InvariantViolation(format!(
                "negative debt {} for driver {}",
                self.debt, self.driver_id
            )));
        }
        Ok(())
    }
}

/// Kind of ledger mutation a transaction record explains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionKind {
    /// Platform fee retained (informational, no balance/debt effect)
    Fee = 1,
    /// Earnings credited to the driver balance
    Credit = 2,
    /// Debt incurred (cash trip fee kept by the driver)
    DebtIncrease = 3,
    /// Debt repaid from digital trip earnings
    DebtDecrease = 4,
    /// Manual payout from the driver balance
    Payout = 5,
}

impl TransactionKind {
    /// Wire code
    pub fn code(&self) -> &'static str {
        match self {
            TransactionKind::Fee => "fee",
            TransactionKind::Credit => "credit",
            TransactionKind::DebtIncrease => "debt_increase",
            TransactionKind::DebtDecrease => "debt_decrease",
            TransactionKind::Payout => "payout",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Append-only audit entry explaining one ledger mutation
///
/// Never updated or deleted. `record_id` is a UUIDv7, so record ids sort
/// by creation time and double as the ordering key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique record ID (UUIDv7 for time-ordering)
    pub record_id: Uuid,

    /// Driver whose ledger this record mutates
    pub driver_id: DriverId,

    /// Trip that caused the mutation (none for payouts)
    pub trip_id: Option<Uuid>,

    /// Kind of mutation
    pub kind: TransactionKind,

    /// Mutation amount, always non-negative
    pub amount: Decimal,

    /// Balance before this record applied
    pub balance_before: Decimal,

    /// Balance after this record applied
    pub balance_after: Decimal,

    /// Debt before this record applied
    pub debt_before: Decimal,

    /// Debt after this record applied
    pub debt_after: Decimal,

    /// Free-text reason
    pub reason: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Apply this record's effect to a running (balance, debt) pair
    pub fn apply(&self, balance: Decimal, debt: Decimal) -> (Decimal, Decimal) {
        match self.kind {
            TransactionKind::Fee => (balance, debt),
            TransactionKind::Credit => (balance + self.amount, debt),
            TransactionKind::Payout => (balance - self.amount, debt),
            TransactionKind::DebtIncrease => (balance, debt + self.amount),
            TransactionKind::DebtDecrease => (balance, debt - self.amount),
        }
    }
}

/// Replay records in creation order into a final (balance, debt)
///
/// The transaction log is the source of truth: for any driver, this must
/// reproduce the live ledger snapshot exactly.
pub fn replay_records(records: &[TransactionRecord]) -> (Decimal, Decimal) {
    records.iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(balance, debt), record| record.apply(balance, debt),
    )
}
