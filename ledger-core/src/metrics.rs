//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring settlement.
//!
//! # Metrics
//!
//! - `settlements_total` - Total settlements committed
//! - `transaction_records_total` - Total transaction records appended
//! - `ledger_conflicts_total` - Version conflicts hit at commit time
//! - `trips_created_total` - Total trips created
//! - `settlement_commit_duration_seconds` - Histogram of commit latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Total settlements committed
    pub settlements_total: IntCounter,

    /// Total transaction records appended
    pub records_total: IntCounter,

    /// Version conflicts at commit time
    pub conflicts_total: IntCounter,

    /// Total trips created
    pub trips_total: IntCounter,

    /// Commit duration histogram
    pub commit_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let settlements_total =
            IntCounter::new("settlements_total", "Total settlements committed")?;
        registry.register(Box::new(settlements_total.clone()))?;

        let records_total = IntCounter::new(
            "transaction_records_total",
            "Total transaction records appended",
        )?;
        registry.register(Box::new(records_total.clone()))?;

        let conflicts_total = IntCounter::new(
            "ledger_conflicts_total",
            "Version conflicts hit at commit time",
        )?;
        registry.register(Box::new(conflicts_total.clone()))?;

        let trips_total = IntCounter::new("trips_created_total", "Total trips created")?;
        registry.register(Box::new(trips_total.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "settlement_commit_duration_seconds",
                "Histogram of settlement commit latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        Ok(Self {
            settlements_total,
            records_total,
            conflicts_total,
            trips_total,
            commit_duration,
            registry,
        })
    }

    /// Record a committed settlement with its record count
    pub fn record_settlement(&self, record_count: usize) {
        self.settlements_total.inc();
        self.records_total.inc_by(record_count as u64);
    }

    /// Record a version conflict
    pub fn record_conflict(&self) {
        self.conflicts_total.inc();
    }

    /// Record a created trip
    pub fn record_trip_created(&self) {
        self.trips_total.inc();
    }

    /// Record commit duration
    pub fn record_commit_duration(&self, duration_seconds: f64) {
        self.commit_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
