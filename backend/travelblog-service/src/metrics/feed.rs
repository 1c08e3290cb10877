use lazy_static::lazy_static;
use prometheus::{register_histogram, register_int_counter_vec, Histogram, IntCounterVec};

lazy_static! {
    /// Feed controller operations by name and outcome (success/validation/not_found/transport/...).
    pub static ref FEED_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_operations_total",
        "Feed controller operations segmented by operation and result",
        &["operation", "result"]
    )
    .expect("failed to register feed_operations_total");

    /// Duration of a full feed fetch (posts + comments).
    pub static ref FEED_FETCH_DURATION_SECONDS: Histogram = register_histogram!(
        "feed_fetch_duration_seconds",
        "Duration of feed fetches against the document store"
    )
    .expect("failed to register feed_fetch_duration_seconds");
}

/// Record one feed operation outcome.
pub fn record(operation: &str, result: &str) {
    FEED_OPERATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
}
