//! Prometheus metric definitions and the `/metrics` scrape endpoint.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

const HTTP_LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0];
const DB_LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

pub static METRICS: Lazy<ApiResult<SwitchyardMetrics>> = Lazy::new(SwitchyardMetrics::new);

/// Container for all process-wide metrics, registered once at startup.
#[derive(Clone)]
pub struct SwitchyardMetrics {
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub db_operations_total: CounterVec,
    pub db_operation_duration_seconds: HistogramVec,

    /// Task claim attempts, labeled by outcome (won/lost/expired).
    pub task_claims_total: CounterVec,
    /// Relay message deliveries, labeled by status (delivered/expired/dead_lettered).
    pub relay_messages_total: CounterVec,
    /// OAuth token grants, labeled by grant type (authorization_code/refresh_token).
    pub oauth_token_grants_total: CounterVec,

    pub active_sessions: Gauge,
    pub dead_letter_queue_depth: Gauge,
}

impl SwitchyardMetrics {
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "switchyard_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register http_requests_total: {e}")))?,

            http_request_duration_seconds: register_histogram_vec!(
                "switchyard_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register http_request_duration_seconds: {e}")))?,

            db_operations_total: register_counter_vec!(
                "switchyard_db_operations_total",
                "Total number of database operations",
                &["operation", "entity", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register db_operations_total: {e}")))?,

            db_operation_duration_seconds: register_histogram_vec!(
                "switchyard_db_operation_duration_seconds",
                "Database operation duration in seconds",
                &["operation", "entity"],
                DB_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register db_operation_duration_seconds: {e}")))?,

            task_claims_total: register_counter_vec!(
                "switchyard_task_claims_total",
                "Total task claim attempts",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register task_claims_total: {e}")))?,

            relay_messages_total: register_counter_vec!(
                "switchyard_relay_messages_total",
                "Total relay message deliveries",
                &["status"]
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register relay_messages_total: {e}")))?,

            oauth_token_grants_total: register_counter_vec!(
                "switchyard_oauth_token_grants_total",
                "Total OAuth token grants",
                &["grant_type"]
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register oauth_token_grants_total: {e}")))?,

            active_sessions: register_gauge!("switchyard_active_sessions", "Current number of active sessions")
                .map_err(|e| ApiError::internal_error(format!("failed to register active_sessions: {e}")))?,

            dead_letter_queue_depth: register_gauge!(
                "switchyard_dead_letter_queue_depth",
                "Current number of dead-lettered relay messages"
            )
            .map_err(|e| ApiError::internal_error(format!("failed to register dead_letter_queue_depth: {e}")))?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total.with_label_values(&[method, path, &status_str]).inc();
        self.http_request_duration_seconds.with_label_values(&[method, path]).observe(duration_secs);
    }

    pub fn record_db_operation(&self, operation: &str, entity: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.db_operations_total.with_label_values(&[operation, entity, status]).inc();
        self.db_operation_duration_seconds.with_label_values(&[operation, entity]).observe(duration_secs);
    }

    pub fn record_task_claim(&self, outcome: &str) {
        self.task_claims_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_relay_message(&self, status: &str) {
        self.relay_messages_total.with_label_values(&[status]).inc();
    }

    pub fn record_oauth_token_grant(&self, grant_type: &str) {
        self.oauth_token_grants_total.with_label_values(&[grant_type]).inc();
    }

    pub fn set_active_sessions(&self, count: i64) {
        self.active_sessions.set(count as f64);
    }

    pub fn set_dead_letter_queue_depth(&self, count: i64) {
        self.dead_letter_queue_depth.set(count as f64);
    }
}

impl Default for SwitchyardMetrics {
    fn default() -> Self {
        Self::new().expect("metrics registration should not fail")
    }
}

/// `GET /metrics` — Prometheus text exposition format.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (StatusCode::OK, [("content-type", "text/plain; version=0.0.4; charset=utf-8")], buffer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, [("content-type", "text/plain")], format!("Failed to encode metrics: {e}").into_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn metrics_register_without_error() -> Result<(), String> {
        let metrics = METRICS.as_ref().map_err(|e| format!("metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn record_http_request_does_not_panic() -> Result<(), String> {
        let metrics = METRICS.as_ref().map_err(|e| format!("metrics init failed: {}", e.message))?;
        metrics.record_http_request("GET", "/v1/tasks", 200, 0.015);
        Ok(())
    }

    #[test]
    fn record_task_claim_and_relay_message() -> Result<(), String> {
        let metrics = METRICS.as_ref().map_err(|e| format!("metrics init failed: {}", e.message))?;
        metrics.record_task_claim("won");
        metrics.record_task_claim("lost");
        metrics.record_relay_message("delivered");
        Ok(())
    }

    #[test]
    fn gauges_accept_updates() -> Result<(), String> {
        let metrics = METRICS.as_ref().map_err(|e| format!("metrics init failed: {}", e.message))?;
        metrics.set_active_sessions(3);
        metrics.set_dead_letter_queue_depth(0);
        Ok(())
    }
}
