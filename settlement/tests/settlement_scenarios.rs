//! End-to-end settlement scenarios over a real ledger
//!
//! Each test drives trips through the public API (ledger + processor)
//! and checks ledger state plus the emitted transaction records.

use ledger_core::{
    DriverId, Ledger, PaymentMethod, TransactionKind, Trip, TripStatus,
};
use rust_decimal::Decimal;
use settlement::{
    CompletionService, Config, EarningsService, EarningsWindow, Reconciler, SettlementOutcome,
    SettlementProcessor,
};
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    ledger: Arc<Ledger>,
    processor: Arc<SettlementProcessor>,
    driver: DriverId,
    _temp: tempfile::TempDir,
}

async fn harness() -> Harness {
    let temp = tempfile::tempdir().unwrap();
    let mut ledger_config = ledger_core::Config::default();
    ledger_config.data_dir = temp.path().to_path_buf();
    let ledger = Arc::new(Ledger::open(ledger_config).await.unwrap());

    let config = Config::default();
    let processor = Arc::new(SettlementProcessor::from_config(ledger.clone(), &config).unwrap());

    Harness {
        ledger,
        processor,
        driver: DriverId::new("driver-1"),
        _temp: temp,
    }
}

impl Harness {
    /// Create a completed (but unsettled) trip for the harness driver
    async fn completed_trip(&self, cents: i64, method: PaymentMethod) -> Uuid {
        let mut trip = Trip::new(Uuid::new_v4(), Decimal::new(cents, 2), method);
        trip.driver_id = Some(self.driver.clone());
        trip.status = TripStatus::Completed;
        trip.completed_at = Some(chrono::Utc::now());
        self.ledger.create_trip(trip).await.unwrap()
    }

    async fn settle(&self, trip_id: Uuid) -> SettlementOutcome {
        self.processor.settle(trip_id).await.unwrap()
    }

    async fn balance_debt(&self) -> (Decimal, Decimal) {
        let ledger = self.ledger.get_driver_ledger(&self.driver).await.unwrap();
        (ledger.balance, ledger.debt)
    }

    async fn record_kinds(&self) -> Vec<TransactionKind> {
        self.ledger
            .get_driver_records(&self.driver)
            .await
            .unwrap()
            .iter()
            .map(|r| r.kind)
            .collect()
    }
}

#[tokio::test]
async fn digital_trip_credits_net_earnings() {
    let h = harness().await;

    let trip_id = h.completed_trip(100_00, PaymentMethod::Digital).await;
    let outcome = h.settle(trip_id).await;

    let SettlementOutcome::Settled(summary) = outcome else {
        panic!("expected settlement");
    };
    assert_eq!(summary.fee, Decimal::new(20_00, 2));
    assert_eq!(summary.driver_gross, Decimal::new(80_00, 2));

    let (balance, debt) = h.balance_debt().await;
    assert_eq!(balance, Decimal::new(80_00, 2));
    assert_eq!(debt, Decimal::ZERO);

    assert_eq!(
        h.record_kinds().await,
        vec![TransactionKind::Credit, TransactionKind::Fee]
    );

    let trip = h.ledger.get_trip(trip_id).await.unwrap();
    assert_eq!(trip.fee_charged, Some(Decimal::new(20_00, 2)));
    assert_eq!(trip.driver_gross, Some(Decimal::new(80_00, 2)));
    assert!(trip.settled_at.is_some());
}

#[tokio::test]
async fn digital_trip_clears_debt_with_remainder() {
    let h = harness().await;

    // Seed debt 5.00 with a cash trip (25.00 → fee 5.00)
    let cash = h.completed_trip(25_00, PaymentMethod::Cash).await;
    h.settle(cash).await;
    assert_eq!(h.balance_debt().await, (Decimal::ZERO, Decimal::new(5_00, 2)));

    // Digital 50.00 → fee 10.00, gross 40.00; clears debt, credits 35.00
    let digital = h.completed_trip(50_00, PaymentMethod::Digital).await;
    h.settle(digital).await;

    let (balance, debt) = h.balance_debt().await;
    assert_eq!(balance, Decimal::new(35_00, 2));
    assert_eq!(debt, Decimal::ZERO);

    let records = h.ledger.get_driver_records(&h.driver).await.unwrap();
    let kinds: Vec<_> = records.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::DebtIncrease,
            TransactionKind::DebtDecrease,
            TransactionKind::Credit,
            TransactionKind::Fee,
        ]
    );
    assert_eq!(records[1].amount, Decimal::new(5_00, 2));
    assert_eq!(records[2].amount, Decimal::new(35_00, 2));
    assert_eq!(records[3].amount, Decimal::new(10_00, 2));
}

#[tokio::test]
async fn digital_trip_partial_debt_repayment_no_credit() {
    let h = harness().await;

    // Seed debt 45.00 (cash 225.00 → fee 45.00)
    let cash = h.completed_trip(225_00, PaymentMethod::Cash).await;
    h.settle(cash).await;

    // Digital 50.00 → gross 40.00, all of it repays debt
    let digital = h.completed_trip(50_00, PaymentMethod::Digital).await;
    h.settle(digital).await;

    let (balance, debt) = h.balance_debt().await;
    assert_eq!(balance, Decimal::ZERO); // unchanged
    assert_eq!(debt, Decimal::new(5_00, 2));

    let kinds = h.record_kinds().await;
    assert_eq!(
        kinds,
        vec![
            TransactionKind::DebtIncrease,
            TransactionKind::DebtDecrease,
            TransactionKind::Fee,
        ]
    );
    assert!(!kinds.contains(&TransactionKind::Credit));
}

#[tokio::test]
async fn cash_trip_accrues_debt() {
    let h = harness().await;

    let trip_id = h.completed_trip(30_00, PaymentMethod::Cash).await;
    let outcome = h.settle(trip_id).await;

    let SettlementOutcome::Settled(summary) = outcome else {
        panic!("expected settlement");
    };
    assert_eq!(summary.fee, Decimal::new(6_00, 2));

    let (balance, debt) = h.balance_debt().await;
    assert_eq!(balance, Decimal::ZERO);
    assert_eq!(debt, Decimal::new(6_00, 2));

    let ledger = h.ledger.get_driver_ledger(&h.driver).await.unwrap();
    assert_eq!(ledger.cash_rides.current(chrono::Utc::now().date_naive()), 1);

    assert_eq!(h.record_kinds().await, vec![TransactionKind::DebtIncrease]);
}

#[tokio::test]
async fn double_delivery_is_noop() {
    let h = harness().await;

    let trip_id = h.completed_trip(100_00, PaymentMethod::Digital).await;
    h.settle(trip_id).await;

    let before_records = h.ledger.get_driver_records(&h.driver).await.unwrap();
    let before = h.balance_debt().await;

    // Second delivery
    let outcome = h.settle(trip_id).await;
    assert!(matches!(
        outcome,
        SettlementOutcome::AlreadySettled { trip_id: t } if t == trip_id
    ));

    let after_records = h.ledger.get_driver_records(&h.driver).await.unwrap();
    assert_eq!(after_records.len(), before_records.len());
    assert_eq!(h.balance_debt().await, before);
}

#[tokio::test]
async fn concurrent_duplicate_delivery_settles_once() {
    let h = harness().await;

    let trip_id = h.completed_trip(100_00, PaymentMethod::Digital).await;

    // Both invocation paths fire for the same completion: one settles,
    // the loser's retry must observe the committed settled_at and back off
    let (a, b) = tokio::join!(h.processor.settle(trip_id), h.processor.settle(trip_id));
    let outcomes = [a.unwrap(), b.unwrap()];
    let settled = outcomes
        .iter()
        .filter(|o| matches!(o, SettlementOutcome::Settled(_)))
        .count();
    assert_eq!(settled, 1);

    let (balance, debt) = h.balance_debt().await;
    assert_eq!(balance, Decimal::new(80_00, 2));
    assert_eq!(debt, Decimal::ZERO);
    assert_eq!(
        h.record_kinds().await,
        vec![TransactionKind::Credit, TransactionKind::Fee]
    );
}

#[tokio::test]
async fn debt_threshold_blocks_cash_in_same_write() {
    let h = harness().await;

    // 240.00 cash → fee 48.00, still under the 50.00 threshold
    let first = h.completed_trip(240_00, PaymentMethod::Cash).await;
    h.settle(first).await;
    let ledger = h.ledger.get_driver_ledger(&h.driver).await.unwrap();
    assert!(!ledger.blocked_for_cash);

    // 20.00 cash → fee 4.00, debt 52.00 crosses the threshold
    let second = h.completed_trip(20_00, PaymentMethod::Cash).await;
    let SettlementOutcome::Settled(summary) = h.settle(second).await else {
        panic!("expected settlement");
    };
    assert!(summary.blocked_for_cash);

    let ledger = h.ledger.get_driver_ledger(&h.driver).await.unwrap();
    assert!(ledger.blocked_for_cash);
    assert_eq!(ledger.debt, Decimal::new(52_00, 2));
}

#[tokio::test]
async fn daily_cash_ride_cap_blocks() {
    let h = harness().await;

    // 5 small cash trips (fees well under the debt threshold)
    for _ in 0..5 {
        let trip = h.completed_trip(5_00, PaymentMethod::Cash).await;
        h.settle(trip).await;
    }

    let ledger = h.ledger.get_driver_ledger(&h.driver).await.unwrap();
    assert_eq!(ledger.cash_rides.current(chrono::Utc::now().date_naive()), 5);
    assert!(ledger.blocked_for_cash);
    assert!(ledger.debt < Decimal::new(50_00, 2));
}

#[tokio::test]
async fn completion_service_marks_and_settles() {
    let h = harness().await;

    let mut trip = Trip::new(
        Uuid::new_v4(),
        Decimal::new(100_00, 2),
        PaymentMethod::Digital,
    );
    trip.driver_id = Some(h.driver.clone());
    trip.status = TripStatus::InProgress;
    let trip_id = h.ledger.create_trip(trip).await.unwrap();

    let service = CompletionService::new(h.ledger.clone(), h.processor.clone());

    let outcome = service.complete_trip(trip_id).await.unwrap();
    assert!(matches!(outcome, SettlementOutcome::Settled(_)));

    // Calling again is harmless
    let outcome = service.complete_trip(trip_id).await.unwrap();
    assert!(matches!(outcome, SettlementOutcome::AlreadySettled { .. }));

    let (balance, _) = h.balance_debt().await;
    assert_eq!(balance, Decimal::new(80_00, 2));
}

#[tokio::test]
async fn watcher_settles_completion_events() {
    let h = harness().await;

    let mut trip = Trip::new(
        Uuid::new_v4(),
        Decimal::new(100_00, 2),
        PaymentMethod::Digital,
    );
    trip.driver_id = Some(h.driver.clone());
    trip.status = TripStatus::InProgress;
    let trip_id = h.ledger.create_trip(trip).await.unwrap();

    let (tx, rx) = tokio::sync::mpsc::channel(16);
    let watcher = tokio::spawn(settlement::run_watcher(h.processor.clone(), rx));

    let (previous, current_trip) = h
        .ledger
        .update_trip_status(trip_id, TripStatus::Completed)
        .await
        .unwrap();
    tx.send(settlement::TripStatusEvent {
        trip_id,
        previous,
        current: current_trip.status,
    })
    .await
    .unwrap();

    // Closing the channel stops the watcher after it drains the event
    drop(tx);
    watcher.await.unwrap();

    let trip = h.ledger.get_trip(trip_id).await.unwrap();
    assert!(trip.is_settled());
    let (balance, _) = h.balance_debt().await;
    assert_eq!(balance, Decimal::new(80_00, 2));
}

#[tokio::test]
async fn settle_rejects_unfinished_or_driverless_trips() {
    let h = harness().await;

    // In-progress trip
    let mut trip = Trip::new(
        Uuid::new_v4(),
        Decimal::new(10_00, 2),
        PaymentMethod::Digital,
    );
    trip.driver_id = Some(h.driver.clone());
    trip.status = TripStatus::InProgress;
    let trip_id = h.ledger.create_trip(trip).await.unwrap();
    assert!(h.processor.settle(trip_id).await.is_err());

    // Completed trip without a driver
    let mut trip = Trip::new(
        Uuid::new_v4(),
        Decimal::new(10_00, 2),
        PaymentMethod::Digital,
    );
    trip.status = TripStatus::Completed;
    trip.completed_at = Some(chrono::Utc::now());
    let trip_id = h.ledger.create_trip(trip).await.unwrap();
    assert!(h.processor.settle(trip_id).await.is_err());

    // No ledger state was touched
    assert_eq!(h.balance_debt().await, (Decimal::ZERO, Decimal::ZERO));
    assert!(h.record_kinds().await.is_empty());
}

#[tokio::test]
async fn reconcile_reports_and_repairs_drift() {
    let h = harness().await;

    for cents in [100_00, 37_50, 25_00] {
        let trip = h.completed_trip(cents, PaymentMethod::Digital).await;
        h.settle(trip).await;
    }
    let cash = h.completed_trip(30_00, PaymentMethod::Cash).await;
    h.settle(cash).await;

    let config = Config::default();
    let reconciler = Reconciler::from_config(h.ledger.clone(), &config).unwrap();

    // Drift-free ledger reconciles clean
    let report = reconciler.reconcile(&h.driver, false).await.unwrap();
    assert!(report.in_sync());
    assert_eq!(report.trips_replayed, 4);
    assert!(!report.applied);

    // Corrupt the live snapshot out-of-band
    let mut corrupted = h.ledger.get_driver_ledger(&h.driver).await.unwrap();
    let good_balance = corrupted.balance;
    corrupted.balance += Decimal::new(13_37, 2);
    let version = corrupted.version;
    h.ledger.overwrite_ledger(corrupted, version).await.unwrap();

    // Report-only mode detects but does not touch
    let report = reconciler.reconcile(&h.driver, false).await.unwrap();
    assert!(!report.in_sync());
    assert_eq!(report.balance_delta, Decimal::new(13_37, 2));
    assert!(!report.applied);

    // Apply mode repairs
    let report = reconciler.reconcile(&h.driver, true).await.unwrap();
    assert!(report.applied);
    assert_eq!(report.computed_balance, good_balance);

    let repaired = h.ledger.get_driver_ledger(&h.driver).await.unwrap();
    assert_eq!(repaired.balance, good_balance);

    // And reconciles clean afterwards
    let report = reconciler.reconcile(&h.driver, false).await.unwrap();
    assert!(report.in_sync());
}

#[tokio::test]
async fn earnings_summary_over_window() {
    let h = harness().await;

    for cents in [100_00, 50_00] {
        let trip = h.completed_trip(cents, PaymentMethod::Digital).await;
        h.settle(trip).await;
    }
    let cash = h.completed_trip(30_00, PaymentMethod::Cash).await;
    h.settle(cash).await;

    // An unsettled completed trip does not count
    h.completed_trip(999_00, PaymentMethod::Digital).await;

    let earnings = EarningsService::new(h.ledger.clone());
    let summary = earnings
        .summary(&h.driver, EarningsWindow::Day)
        .await
        .unwrap();

    assert_eq!(summary.trip_count, 3);
    assert_eq!(summary.digital_trips, 2);
    assert_eq!(summary.cash_trips, 1);
    // gross: 80 + 40 + 24, fees: 20 + 10 + 6
    assert_eq!(summary.gross_earnings, Decimal::new(144_00, 2));
    assert_eq!(summary.fees, Decimal::new(36_00, 2));
}

#[tokio::test]
async fn reconcile_accounts_for_payouts() {
    let h = harness().await;

    let trip = h.completed_trip(100_00, PaymentMethod::Digital).await;
    h.settle(trip).await;

    h.ledger
        .record_payout(&h.driver, Decimal::new(50_00, 2), "weekly payout")
        .await
        .unwrap();

    let config = Config::default();
    let reconciler = Reconciler::from_config(h.ledger.clone(), &config).unwrap();

    // A paid-out driver is not drift
    let report = reconciler.reconcile(&h.driver, false).await.unwrap();
    assert!(report.in_sync());
    assert_eq!(report.computed_balance, Decimal::new(30_00, 2));
    assert!(!report.applied);
}

#[tokio::test]
async fn payout_keeps_ledger_derivable() {
    let h = harness().await;

    let trip = h.completed_trip(100_00, PaymentMethod::Digital).await;
    h.settle(trip).await;

    h.ledger
        .record_payout(&h.driver, Decimal::new(50_00, 2), "weekly payout")
        .await
        .unwrap();

    let (balance, _) = h.balance_debt().await;
    assert_eq!(balance, Decimal::new(30_00, 2));

    h.ledger.verify_ledger_derivability(&h.driver).await.unwrap();
}
