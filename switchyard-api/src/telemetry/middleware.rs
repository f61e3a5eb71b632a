//! Per-request observability: a tracing span plus Prometheus metrics for
//! every HTTP request.

use axum::{body::Body, middleware::Next, response::Response};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::METRICS;

/// Collapses UUIDs and bare numeric ids out of a path so per-entity routes
/// don't explode Prometheus label cardinality.
fn normalize_path(path: &str) -> String {
    static UUID_REGEX: OnceLock<Result<regex::Regex, regex::Error>> = OnceLock::new();
    static ID_REGEX: OnceLock<Result<regex::Regex, regex::Error>> = OnceLock::new();

    let uuid_regex = UUID_REGEX
        .get_or_init(|| regex::Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}"));
    let id_regex = ID_REGEX.get_or_init(|| regex::Regex::new(r"/\d+(/|$)"));

    let mut result = path.to_string();
    match uuid_regex {
        Ok(regex) => result = regex.replace_all(&result, "{id}").to_string(),
        Err(err) => tracing::error!(error = %err, "failed to compile uuid regex"),
    }
    match id_regex {
        Ok(regex) => result = regex.replace_all(&result, "/{id}$1").to_string(),
        Err(err) => tracing::error!(error = %err, "failed to compile numeric id regex"),
    }
    result
}

pub async fn observability_middleware(request: axum::http::Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);

    let span = info_span!("http_request", http.method = %method, http.route = %normalized_path);
    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_http_request(method.as_str(), &normalized_path, status.as_u16(), duration.as_secs_f64());
    } else {
        tracing::error!("metrics registry unavailable, skipping http request metrics");
    }

    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis(),
        "request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_collapses_uuid() {
        assert_eq!(normalize_path("/v1/tasks/550e8400-e29b-41d4-a716-446655440000"), "/v1/tasks/{id}");
    }

    #[test]
    fn normalize_path_collapses_numeric_id() {
        assert_eq!(normalize_path("/v1/items/12345"), "/v1/items/{id}");
    }

    #[test]
    fn normalize_path_leaves_bare_routes_alone() {
        assert_eq!(normalize_path("/v1/tasks"), "/v1/tasks");
        assert_eq!(normalize_path("/healthz"), "/healthz");
    }
}
