//! Settlement processor
//!
//! The single implementation of trip settlement. Both invocation paths
//! (the trip-status watcher and the in-process completion service) call
//! `settle` here; the algorithm is never duplicated.
//!
//! # Algorithm
//!
//! 1. Guard: skip if the trip already carries `settled_at` (idempotency)
//! 2. Split the price into fee and driver gross
//! 3. Read the driver ledger, apply the digital/cash branch
//! 4. Recompute the cash-ride block flag
//! 5. Commit trip + ledger snapshot + records in one atomic batch
//! 6. On version conflict, retry from the fresh read with backoff

use crate::{
    config::RetryConfig,
    fare::{FarePolicy, FareSplit},
    risk::CashRiskPolicy,
    types::{SettlementOutcome, SettlementSummary},
    Error, Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use ledger_core::{
    DriverId, DriverLedger, Ledger, PaymentMethod, TransactionKind, TransactionRecord, Trip,
    TripStatus,
};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// New ledger snapshot plus the records justifying it
#[derive(Debug, Clone)]
pub struct SettlementApplication {
    /// Post-settlement ledger snapshot (version untouched; the commit
    /// path bumps it)
    pub ledger: DriverLedger,

    /// Records to append, in emission order
    pub records: Vec<TransactionRecord>,
}

/// Apply one trip to a ledger state, in memory
///
/// Pure with respect to storage; the reconciliation tool replays history
/// through this exact function, so any change here changes both paths.
pub fn apply_trip(
    ledger: &DriverLedger,
    trip_id: Uuid,
    payment_method: PaymentMethod,
    split: &FareSplit,
    risk: &CashRiskPolicy,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> SettlementApplication {
    let mut balance = ledger.balance;
    let mut debt = ledger.debt;
    let mut cash_rides = ledger.cash_rides;
    let mut records = Vec::with_capacity(2);

    let mut push = |kind: TransactionKind,
                    amount: Decimal,
                    balance_after: Decimal,
                    debt_after: Decimal,
                    balance: &mut Decimal,
                    debt: &mut Decimal,
                    reason: &str| {
        records.push(TransactionRecord {
            record_id: Uuid::now_v7(),
            driver_id: ledger.driver_id.clone(),
            trip_id: Some(trip_id),
            kind,
            amount,
            balance_before: *balance,
            balance_after,
            debt_before: *debt,
            debt_after,
            reason: reason.to_string(),
            created_at: now,
        });
        *balance = balance_after;
        *debt = debt_after;
    };

    match payment_method {
        PaymentMethod::Digital => {
            let gross = split.driver_gross;

            if debt > Decimal::ZERO {
                if gross >= debt {
                    let repaid = debt;
                    let remainder = gross - repaid;
                    push(
                        TransactionKind::DebtDecrease,
                        repaid,
                        balance,
                        Decimal::ZERO,
                        &mut balance,
                        &mut debt,
                        "debt repaid from trip earnings",
                    );
                    if remainder > Decimal::ZERO {
                        push(
                            TransactionKind::Credit,
                            remainder,
                            balance + remainder,
                            debt,
                            &mut balance,
                            &mut debt,
                            "trip earnings after debt repayment",
                        );
                    }
                } else {
                    push(
                        TransactionKind::DebtDecrease,
                        gross,
                        balance,
                        debt - gross,
                        &mut balance,
                        &mut debt,
                        "partial debt repayment from trip earnings",
                    );
                }
            } else {
                push(
                    TransactionKind::Credit,
                    gross,
                    balance + gross,
                    debt,
                    &mut balance,
                    &mut debt,
                    "trip earnings",
                );
            }

            // Informational audit entry for the fee the platform retained
            push(
                TransactionKind::Fee,
                split.fee,
                balance,
                debt,
                &mut balance,
                &mut debt,
                "platform fee retained",
            );
        }

        PaymentMethod::Cash => {
            // Driver kept the cash; the platform fee becomes debt
            push(
                TransactionKind::DebtIncrease,
                split.fee,
                balance,
                debt + split.fee,
                &mut balance,
                &mut debt,
                "platform fee owed on cash trip",
            );
            cash_rides = cash_rides.record(today);
        }
    }

    let blocked_for_cash = risk.is_blocked(debt, cash_rides.current(today));

    let mut snapshot = ledger.clone();
    snapshot.balance = balance;
    snapshot.debt = debt;
    snapshot.cash_rides = cash_rides;
    snapshot.blocked_for_cash = blocked_for_cash;
    snapshot.updated_at = now;

    SettlementApplication {
        ledger: snapshot,
        records,
    }
}

/// Settlement processor
pub struct SettlementProcessor {
    /// Ledger (storage + single-writer actor)
    ledger: Arc<Ledger>,

    /// Fare/fee policy
    fare: FarePolicy,

    /// Cash-ride risk policy
    risk: CashRiskPolicy,

    /// Retry behavior on ledger contention
    retry: RetryConfig,
}

impl SettlementProcessor {
    /// Create new processor
    pub fn new(
        ledger: Arc<Ledger>,
        fare: FarePolicy,
        risk: CashRiskPolicy,
        retry: RetryConfig,
    ) -> Self {
        Self {
            ledger,
            fare,
            risk,
            retry,
        }
    }

    /// Create from configuration
    pub fn from_config(ledger: Arc<Ledger>, config: &crate::Config) -> Result<Self> {
        Ok(Self::new(
            ledger,
            config.fare_policy()?,
            config.risk_policy(),
            config.retry.clone(),
        ))
    }

    /// Settle a completed trip
    ///
    /// Idempotent: a second call for an already-settled trip is a no-op
    /// that appends zero records. The trip is re-read on every attempt,
    /// so a concurrent duplicate delivery that wins the commit race turns
    /// the loser's retry into `AlreadySettled` instead of a second apply.
    pub async fn settle(&self, trip_id: Uuid) -> Result<SettlementOutcome> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            // Fresh trip read each attempt: the guard must observe commits
            // that landed between attempts
            let trip = self.ledger.get_trip(trip_id).await?;

            if trip.is_settled() {
                tracing::debug!(trip_id = %trip_id, "Trip already settled, skipping");
                return Ok(SettlementOutcome::AlreadySettled { trip_id });
            }

            if trip.status != TripStatus::Completed {
                return Err(Error::Validation(format!(
                    "trip {} is {:?}, only completed trips settle",
                    trip_id, trip.status
                )));
            }

            let driver_id = trip.driver_id.clone().ok_or_else(|| {
                Error::Validation(format!("trip {} has no driver assigned", trip_id))
            })?;

            let split = self.fare.split(trip.total_price)?;

            match self.try_commit(&trip, &driver_id, &split).await {
                Ok(summary) => return Ok(SettlementOutcome::Settled(summary)),

                Err(Error::Ledger(e)) if e.is_retryable() => {
                    if attempt >= self.retry.max_attempts {
                        tracing::warn!(
                            trip_id = %trip_id,
                            driver_id = %driver_id,
                            attempts = attempt,
                            "Settlement retries exhausted, trip remains unsettled"
                        );
                        return Err(Error::RetryExhausted {
                            trip_id: trip_id.to_string(),
                            attempts: attempt,
                        });
                    }

                    let backoff = self.backoff(attempt);
                    tracing::debug!(
                        trip_id = %trip_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Ledger contention, retrying settlement"
                    );
                    tokio::time::sleep(backoff).await;
                }

                Err(e) => return Err(e),
            }
        }
    }

    /// One read-compute-write pass
    async fn try_commit(
        &self,
        trip: &Trip,
        driver_id: &DriverId,
        split: &FareSplit,
    ) -> Result<SettlementSummary> {
        let now = Utc::now();
        let today = now.date_naive();

        // Fresh read each attempt
        let ledger_state = self.ledger.get_driver_ledger(driver_id).await?;
        let expected_version = ledger_state.version;

        let application = apply_trip(
            &ledger_state,
            trip.trip_id,
            trip.payment_method,
            split,
            &self.risk,
            now,
            today,
        );

        let mut settled_trip = trip.clone();
        settled_trip.fee_charged = Some(split.fee);
        settled_trip.driver_gross = Some(split.driver_gross);
        settled_trip.settled_at = Some(now);
        if settled_trip.completed_at.is_none() {
            settled_trip.completed_at = Some(now);
        }

        let record_count = application.records.len();
        let summary = SettlementSummary {
            trip_id: trip.trip_id,
            driver_id: driver_id.clone(),
            payment_method: trip.payment_method,
            fee: split.fee,
            driver_gross: split.driver_gross,
            balance_after: application.ledger.balance,
            debt_after: application.ledger.debt,
            blocked_for_cash: application.ledger.blocked_for_cash,
            record_count,
        };

        self.ledger
            .commit_settlement(
                settled_trip,
                application.ledger,
                application.records,
                expected_version,
            )
            .await?;

        tracing::info!(
            trip_id = %trip.trip_id,
            driver_id = %driver_id,
            payment = %trip.payment_method,
            fee = %split.fee,
            driver_gross = %split.driver_gross,
            balance_after = %summary.balance_after,
            debt_after = %summary.debt_after,
            blocked_for_cash = summary.blocked_for_cash,
            "Trip settled"
        );

        Ok(summary)
    }

    /// Exponential backoff with jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.retry.base_backoff_ms;
        let exp = base.saturating_mul(1u64 << (attempt - 1).min(8));
        let jitter = rand::thread_rng().gen_range(0..=base);
        Duration::from_millis(exp + jitter)
    }

    /// Fare policy in use
    pub fn fare_policy(&self) -> &FarePolicy {
        &self.fare
    }

    /// Risk policy in use
    pub fn risk_policy(&self) -> &CashRiskPolicy {
        &self.risk
    }
}
