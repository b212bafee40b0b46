//! Prometheus metrics for reconciliation-frontend.

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::LazyLock;

/// Counter for HTTP requests by method, route and status.
pub static HTTP_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "reconciliation_frontend_http_requests_total",
        "Total number of HTTP requests",
        &["method", "route", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS_TOTAL")
});

pub static HTTP_REQUEST_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "reconciliation_frontend_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "route"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS")
});

/// Suggestion fetches by outcome (success, error).
pub static SUGGESTION_FETCHES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "reconciliation_suggestion_fetches_total",
        "Total number of suggestion fetches",
        &["outcome"]
    )
    .expect("Failed to register SUGGESTION_FETCHES")
});

/// Submissions by outcome (reconciled, failed, ignored).
pub static SUBMISSIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "reconciliation_submissions_total",
        "Total number of reconciliation submissions",
        &["outcome"]
    )
    .expect("Failed to register SUBMISSIONS")
});

pub static OPEN_SESSIONS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "reconciliation_open_sessions",
        "Number of open reconciliation sessions"
    )
    .expect("Failed to register OPEN_SESSIONS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    LazyLock::force(&HTTP_REQUESTS_TOTAL);
    LazyLock::force(&HTTP_REQUEST_DURATION_SECONDS);
    LazyLock::force(&SUGGESTION_FETCHES);
    LazyLock::force(&SUBMISSIONS);
    LazyLock::force(&OPEN_SESSIONS);
}

/// Get all metrics as Prometheus text format.
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

pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, route, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, route])
        .observe(duration_secs);
}

pub fn record_suggestion_fetch(outcome: &str) {
    SUGGESTION_FETCHES.with_label_values(&[outcome]).inc();
}

pub fn record_submission(outcome: &str) {
    SUBMISSIONS.with_label_values(&[outcome]).inc();
}

pub fn set_open_sessions(count: usize) {
    OPEN_SESSIONS.set(count as i64);
}
