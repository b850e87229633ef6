//! Prometheus metrics for the controller server
//!
//! Privacy-safe metrics: operation, outcome and counts only, never handles
//! or principals.

use metrics::{counter, gauge};

use crate::error::ServerError;

pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_CLIENT_ERROR: &str = "client_error";
pub const OUTCOME_SERVER_ERROR: &str = "server_error";

pub const OP_SUBMIT: &str = "submit";
pub const OP_PLAN: &str = "plan";
pub const OP_REQUEST_REVEAL: &str = "request_reveal";
pub const OP_SPECIAL_EVENT: &str = "special_event";
pub const OP_ADAPTIVE_CONTROL: &str = "adaptive_control";
pub const OP_TRANSIT_PRIORITY: &str = "transit_priority";
pub const OP_AUTHORIZE: &str = "authorize";

pub const CALLBACK_REVEALED: &str = "revealed";
pub const CALLBACK_REJECTED: &str = "rejected";

/// Outcome label for a handler result
pub fn outcome<T>(result: &Result<T, ServerError>) -> &'static str {
    match result {
        Ok(_) => OUTCOME_OK,
        Err(e) if e.status().is_server_error() => OUTCOME_SERVER_ERROR,
        Err(_) => OUTCOME_CLIENT_ERROR,
    }
}

pub fn record_operation(op: &'static str, outcome: &'static str) {
    counter!("cipherlane_operations_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_callback(outcome: &'static str) {
    counter!("cipherlane_reveal_callbacks_total", "outcome" => outcome).increment(1);
}

pub fn set_pending_reveals(count: usize) {
    gauge!("cipherlane_pending_reveals").set(count as f64);
}

pub fn set_records(count: usize) {
    gauge!("cipherlane_records").set(count as f64);
}

pub fn init_prometheus_recorder() -> Result<metrics_exporter_prometheus::PrometheusHandle, ServerError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Internal(format!("Failed to install Prometheus recorder: {}", e)))
}
