//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (retries, conflicts, transactions, responses)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `booking_retry_attempts_total` (counter): retries scheduled, by operation
//! - `booking_retry_exhausted_total` (counter): retry loops that gave up
//! - `booking_version_conflicts_total` (counter): stale writes, by entity
//! - `booking_transactions_total` (counter): transactions by outcome
//! - `booking_transaction_duration_seconds` (histogram): executor latency
//! - `booking_http_responses_total` (counter): API responses by method, status
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Labels are static strings or status codes; never ids

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(err) => tracing::error!(address = %addr, error = %err, "Failed to install metrics exporter"),
    }
}

pub fn record_retry_attempt(operation: &'static str) {
    counter!("booking_retry_attempts_total", "operation" => operation).increment(1);
}

pub fn record_retry_exhausted(operation: &'static str) {
    counter!("booking_retry_exhausted_total", "operation" => operation).increment(1);
}

pub fn record_version_conflict(entity: &'static str) {
    counter!("booking_version_conflicts_total", "entity" => entity).increment(1);
}

pub fn record_transaction(outcome: &'static str, started: Instant) {
    counter!("booking_transactions_total", "outcome" => outcome).increment(1);
    histogram!("booking_transaction_duration_seconds", "outcome" => outcome).record(started.elapsed().as_secs_f64());
}

pub fn record_http_response(method: &str, status: u16) {
    counter!(
        "booking_http_responses_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
