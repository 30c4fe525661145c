//! Prometheus metrics for ordering-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Order counter by status.
pub static ORDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ordering_orders_total",
        "Total number of orders by status",
        &["status"] // pending, processing, shipped, delivered, cancelled, returned
    )
    .expect("Failed to register orders_total")
});

/// Quote counter by status.
pub static QUOTES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ordering_quotes_total",
        "Total number of quotes by status",
        &["status"] // draft, sent, accepted, rejected, expired, converted, cancelled
    )
    .expect("Failed to register quotes_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "ordering_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Stock movement counter by direction.
pub static STOCK_MOVEMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ordering_stock_movements_total",
        "Total number of stock reservations and releases",
        &["direction"] // reserve, release
    )
    .expect("Failed to register stock_movements_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&ORDERS_TOTAL);
    Lazy::force(&QUOTES_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&STOCK_MOVEMENTS_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
