//! Prometheus metrics for event dispatch

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

lazy_static! {
    /// Total events dispatched, by event name and outcome
    pub static ref EVENTS_DISPATCHED_TOTAL: CounterVec = register_counter_vec!(
        "dispatch_events_total",
        "Total settlement events dispatched",
        &["event", "outcome"]
    )
    .unwrap();

    /// Dispatch duration, by event name
    pub static ref DISPATCH_DURATION: HistogramVec = register_histogram_vec!(
        "dispatch_duration_seconds",
        "Settlement event dispatch duration in seconds",
        &["event"]
    )
    .unwrap();
}
