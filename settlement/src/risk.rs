//! Cash-ride risk policy
//!
//! A driver keeps the full cash fare on cash trips, so the platform fee
//! accrues as debt. Past a configured debt level, or past a daily cash-ride
//! cap, the driver is blocked from accepting further cash trips until the
//! numbers fall back under the thresholds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cash-ride risk policy
///
/// Pure, total function of the post-settlement ledger numbers. Enforcement
/// of the resulting flag (hiding cash requests from the driver) happens
/// outside this engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CashRiskPolicy {
    debt_threshold: Decimal,
    max_daily_cash_rides: u32,
}

impl CashRiskPolicy {
    /// Create a policy from configured thresholds
    pub fn new(debt_threshold: Decimal, max_daily_cash_rides: u32) -> Self {
        Self {
            debt_threshold,
            max_daily_cash_rides,
        }
    }

    /// Whether the driver is blocked for cash rides
    pub fn is_blocked(&self, debt: Decimal, cash_rides_today: u32) -> bool {
        debt >= self.debt_threshold || cash_rides_today >= self.max_daily_cash_rides
    }
}
