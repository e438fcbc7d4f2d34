//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_trades_settled_total` - Trade settlements committed
//! - `ledger_cashouts_settled_total` - Partner cash-outs committed
//! - `ledger_charges_total` - Payment charges committed
//! - `ledger_rejections_total{kind}` - Business rejections by kind
//! - `ledger_commit_duration_seconds` - Unit-of-work latencies
//!
//! Collectors are registered on an instance-owned registry (not the global
//! one) so many ledgers can coexist in one test process.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Trade settlements committed
    pub trades_settled: IntCounter,

    /// Partner cash-outs committed
    pub cashouts_settled: IntCounter,

    /// Payment charges committed
    pub charges: IntCounter,

    /// Business rejections, labeled by kind
    pub rejections: IntCounterVec,

    /// Unit-of-work commit latencies
    pub commit_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let trades_settled = IntCounter::new(
            "ledger_trades_settled_total",
            "Trade settlements committed",
        )?;
        registry.register(Box::new(trades_settled.clone()))?;

        let cashouts_settled = IntCounter::new(
            "ledger_cashouts_settled_total",
            "Partner cash-outs committed",
        )?;
        registry.register(Box::new(cashouts_settled.clone()))?;

        let charges = IntCounter::new("ledger_charges_total", "Payment charges committed")?;
        registry.register(Box::new(charges.clone()))?;

        let rejections = IntCounterVec::new(
            Opts::new("ledger_rejections_total", "Business rejections by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(rejections.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_commit_duration_seconds",
                "Unit-of-work commit latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        Ok(Self {
            trades_settled,
            cashouts_settled,
            charges,
            rejections,
            commit_duration,
            registry,
        })
    }

    /// Record a committed trade settlement
    pub fn record_trade_settled(&self) {
        self.trades_settled.inc();
    }

    /// Record a committed partner cash-out
    pub fn record_cashout_settled(&self) {
        self.cashouts_settled.inc();
    }

    /// Record a committed payment charge
    pub fn record_charge(&self) {
        self.charges.inc();
    }

    /// Record a business rejection
    pub fn record_rejection(&self, kind: &str) {
        self.rejections.with_label_values(&[kind]).inc();
    }

    /// Record a unit-of-work commit duration
    pub fn record_commit_duration(&self, duration_seconds: f64) {
        self.commit_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
