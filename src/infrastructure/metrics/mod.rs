//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts by method, path, and status
//! - HTTP request latency histograms
//! - Booking attempts by outcome
//! - Payment transitions by status
//! - Tickets issued and seat holds expired

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "cinema";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Booking attempts by outcome ("created", "replayed", "seats_unavailable", ...)
pub static BOOKINGS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bookings_total", "Booking attempts by outcome").namespace(NAMESPACE),
        &["outcome"],
    )
    .expect("Failed to create BOOKINGS_TOTAL metric")
});

/// Payment status transitions
pub static PAYMENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("payments_total", "Payment status transitions").namespace(NAMESPACE),
        &["status"],
    )
    .expect("Failed to create PAYMENTS_TOTAL metric")
});

pub static TICKETS_ISSUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("tickets_issued_total", "Tickets issued").namespace(NAMESPACE),
    )
    .expect("Failed to create TICKETS_ISSUED_TOTAL metric")
});

pub static HOLDS_EXPIRED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("holds_expired_total", "Seat holds expired by the sweeper or on booking")
            .namespace(NAMESPACE),
    )
    .expect("Failed to create HOLDS_EXPIRED_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(BOOKINGS_TOTAL.clone()))
        .expect("Failed to register BOOKINGS_TOTAL");
    registry
        .register(Box::new(PAYMENTS_TOTAL.clone()))
        .expect("Failed to register PAYMENTS_TOTAL");
    registry
        .register(Box::new(TICKETS_ISSUED_TOTAL.clone()))
        .expect("Failed to register TICKETS_ISSUED_TOTAL");
    registry
        .register(Box::new(HOLDS_EXPIRED_TOTAL.clone()))
        .expect("Failed to register HOLDS_EXPIRED_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn record_booking(outcome: &str) {
    BOOKINGS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_payment(status: &str) {
    PAYMENTS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_tickets_issued(count: usize) {
    TICKETS_ISSUED_TOTAL.inc_by(count as u64);
}

pub fn record_holds_expired(count: usize) {
    HOLDS_EXPIRED_TOTAL.inc_by(count as u64);
}
