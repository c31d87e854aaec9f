//! Prometheus Metrics Module
//!
//! # Metrics Collected
//! - HTTP request counts and latency by method, path and status
//! - Active socket sessions
//! - Inbound socket frames by outcome
//! - Presence notifications sent
//! - Background task failures by task

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

const NAMESPACE: &str = "dm_gateway";

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

/// Registered socket sessions
pub static SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("sessions_active", "Number of registered socket sessions").namespace(NAMESPACE),
    )
    .expect("Failed to create SESSIONS_ACTIVE metric")
});

/// Inbound frames by processing outcome
pub static FRAMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("frames_total", "Inbound socket frames by outcome").namespace(NAMESPACE),
        &["outcome"],
    )
    .expect("Failed to create FRAMES_TOTAL metric")
});

pub static PRESENCE_NOTIFICATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("presence_notifications_total", "Status frames dispatched to peers")
            .namespace(NAMESPACE),
    )
    .expect("Failed to create PRESENCE_NOTIFICATIONS_TOTAL metric")
});

pub static BACKGROUND_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("background_failures_total", "Failed fire-and-forget tasks").namespace(NAMESPACE),
        &["task"],
    )
    .expect("Failed to create BACKGROUND_FAILURES_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
        Box::new(SESSIONS_ACTIVE.clone()),
        Box::new(FRAMES_TOTAL.clone()),
        Box::new(PRESENCE_NOTIFICATIONS_TOTAL.clone()),
        Box::new(BACKGROUND_FAILURES_TOTAL.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            tracing::error!(error = %e, "Failed to register metric");
        }
    }
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
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

pub fn set_active_sessions(count: usize) {
    SESSIONS_ACTIVE.set(count as i64);
}

pub fn record_frame(outcome: &str) {
    FRAMES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_presence_notifications(sent: usize) {
    PRESENCE_NOTIFICATIONS_TOTAL.inc_by(sent as u64);
}

pub fn record_background_failure(task: &str) {
    BACKGROUND_FAILURES_TOTAL.with_label_values(&[task]).inc();
}
