//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gate metrics (classifications, retries, failure events, approvals)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gate_errors_classified_total` (counter): classifications by category
//! - `gate_retry_attempts_total` (counter): attempts by operation
//! - `gate_retry_outcomes_total` (counter): retry results by operation, outcome
//! - `gate_failure_events_total` (counter): failure events by outcome
//! - `gate_success_events_total` (counter): success events
//! - `gate_escalations_total` (counter): failure limits reached
//! - `gate_approval_transitions_total` (counter): request transitions by status
//! - `gate_pending_requests` (gauge): current pending request count
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels are low-cardinality (category, operation, outcome, status)

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_classification(category: &'static str) {
    metrics::counter!("gate_errors_classified_total", "category" => category).increment(1);
}

pub fn record_retry_attempt(operation: &str) {
    metrics::counter!("gate_retry_attempts_total", "operation" => operation.to_string()).increment(1);
}

pub fn record_retry_outcome(operation: &str, outcome: &'static str) {
    metrics::counter!(
        "gate_retry_outcomes_total",
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_failure_event(outcome: &'static str) {
    metrics::counter!("gate_failure_events_total", "outcome" => outcome).increment(1);
}

pub fn record_success_event() {
    metrics::counter!("gate_success_events_total").increment(1);
}

pub fn record_escalation() {
    metrics::counter!("gate_escalations_total").increment(1);
}

pub fn record_approval_transition(status: &'static str) {
    metrics::counter!("gate_approval_transitions_total", "status" => status).increment(1);
}

pub fn record_pending_requests(count: usize) {
    metrics::gauge!("gate_pending_requests").set(count as f64);
}
