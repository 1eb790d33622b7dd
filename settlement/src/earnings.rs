//! Earnings summaries
//!
//! Read-only aggregation over a driver's settled trips for reporting
//! windows. Not part of the write path; results can be served stale.

use crate::types::{EarningsSummary, EarningsWindow};
use crate::Result;
use chrono::Utc;
use ledger_core::{DriverId, Ledger, PaymentMethod};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Earnings reporting service
pub struct EarningsService {
    ledger: Arc<Ledger>,
}

impl EarningsService {
    /// Create new service
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Summarize settled trips for a driver over a reporting window
    pub async fn summary(
        &self,
        driver_id: &DriverId,
        window: EarningsWindow,
    ) -> Result<EarningsSummary> {
        let now = Utc::now();
        let from = window.start(now);

        let trips = self.ledger.get_completed_trips(driver_id).await?;

        let mut summary = EarningsSummary {
            driver_id: driver_id.clone(),
            window,
            from,
            to: now,
            trip_count: 0,
            gross_earnings: Decimal::ZERO,
            fees: Decimal::ZERO,
            cash_trips: 0,
            digital_trips: 0,
        };

        for trip in trips {
            if !matches!(trip.completed_at, Some(t) if t >= from) {
                continue;
            }

            // Only settled trips carry fee/gross
            let (Some(gross), Some(fee)) = (trip.driver_gross, trip.fee_charged) else {
                continue;
            };

            summary.trip_count += 1;
            summary.gross_earnings += gross;
            summary.fees += fee;
            match trip.payment_method {
                PaymentMethod::Cash => summary.cash_trips += 1,
                PaymentMethod::Digital => summary.digital_trips += 1,
            }
        }

        Ok(summary)
    }
}
