//! Fare/fee policy
//!
//! Splits a trip's total price into the platform fee and the driver gross.
//! Pure computation; the only failure mode is invalid input.

use crate::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Result of splitting a trip price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareSplit {
    /// Platform fee retained
    pub fee: Decimal,

    /// Driver gross (total minus fee)
    pub driver_gross: Decimal,
}

/// Fare/fee policy
///
/// The fee is rounded half-up to 2 decimal places exactly once; the driver
/// gross is the remainder. Rounding both legs independently can lose or
/// mint a cent on odd totals, so `fee + driver_gross == total` holds as an
/// identity here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FarePolicy {
    fee_percentage: Decimal,
}

impl FarePolicy {
    /// Create a policy; the percentage must be within [0, 1]
    pub fn new(fee_percentage: Decimal) -> Result<Self> {
        if fee_percentage < Decimal::ZERO || fee_percentage > Decimal::ONE {
            return Err(Error::Validation(format!(
                "fee percentage must be within [0, 1], got {}",
                fee_percentage
            )));
        }
        Ok(Self { fee_percentage })
    }

    /// Configured fee percentage
    pub fn fee_percentage(&self) -> Decimal {
        self.fee_percentage
    }

    /// Split a total price into fee and driver gross
    pub fn split(&self, total: Decimal) -> Result<FareSplit> {
        if total < Decimal::ZERO {
            return Err(Error::Validation(format!(
                "trip price must be non-negative, got {}",
                total
            )));
        }

        let fee = (total * self.fee_percentage)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let driver_gross = total - fee;

        Ok(FareSplit { fee, driver_gross })
    }
}
