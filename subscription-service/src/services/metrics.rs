//! Prometheus metrics for webhook processing and subscription operations.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "subscription_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Webhook deliveries by provider, event type and outcome.
pub static WEBHOOK_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "subscription_webhook_events_total",
            "Webhook events received by provider, event type and outcome"
        ),
        &["provider", "event_type", "outcome"]
    )
    .expect("Failed to register WEBHOOK_EVENTS_TOTAL")
});

/// Subscription store operations (activate, fail, drop, cancel, expire).
pub static SUBSCRIPTION_OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "subscription_operations_total",
            "Subscription store operations by type"
        ),
        &["operation"]
    )
    .expect("Failed to register SUBSCRIPTION_OPERATIONS_TOTAL")
});

/// Initialize all metrics. Call once at startup so the first scrape sees
/// every series registered.
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&WEBHOOK_EVENTS_TOTAL);
    Lazy::force(&SUBSCRIPTION_OPERATIONS_TOTAL);
}

pub fn record_webhook_event(provider: &str, event_type: &str, outcome: &str) {
    WEBHOOK_EVENTS_TOTAL
        .with_label_values(&[provider, event_type, outcome])
        .inc();
}

pub fn record_subscription_operation(operation: &str) {
    SUBSCRIPTION_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

/// Render all registered metrics in the Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
