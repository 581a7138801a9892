//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Submission attempts and outcomes
//! - Confirmation latency and timeouts
//! - Exhausted executions

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    pub static ref ATTEMPTS: CounterVec = register_counter_vec!(
        "execution_engine_attempts_total",
        "Total execution attempts started",
        &["endpoint"]
    ).unwrap();

    pub static ref ATTEMPT_FAILURES: CounterVec = register_counter_vec!(
        "execution_engine_attempt_failures_total",
        "Total failed attempts by error kind",
        &["endpoint", "kind"]
    ).unwrap();

    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "execution_engine_transactions_submitted_total",
        "Total transactions accepted by an endpoint",
        &["endpoint"]
    ).unwrap();

    pub static ref TX_CONFIRMED: CounterVec = register_counter_vec!(
        "execution_engine_transactions_confirmed_total",
        "Total transactions reaching the requested confirmation level",
        &["endpoint"]
    ).unwrap();

    pub static ref EXECUTIONS_FAILED: CounterVec = register_counter_vec!(
        "execution_engine_executions_failed_total",
        "Total executions that exhausted their retry budget",
        &["endpoint"]
    ).unwrap();

    pub static ref CONFIRMATION_LATENCY: HistogramVec = register_histogram_vec!(
        "execution_engine_confirmation_latency_seconds",
        "Time from submission to confirmation",
        &["endpoint"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]
    ).unwrap();
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

// Helper functions to record metrics

pub fn record_attempt(endpoint: &str) {
    ATTEMPTS.with_label_values(&[endpoint]).inc();
}

pub fn record_attempt_failure(endpoint: &str, kind: &str) {
    ATTEMPT_FAILURES.with_label_values(&[endpoint, kind]).inc();
}

pub fn record_tx_submitted(endpoint: &str) {
    TX_SUBMITTED.with_label_values(&[endpoint]).inc();
}

pub fn record_tx_confirmed(endpoint: &str, latency_secs: f64) {
    TX_CONFIRMED.with_label_values(&[endpoint]).inc();
    CONFIRMATION_LATENCY
        .with_label_values(&[endpoint])
        .observe(latency_secs);
}

pub fn record_execution_failed(endpoint: &str) {
    EXECUTIONS_FAILED.with_label_values(&[endpoint]).inc();
}
