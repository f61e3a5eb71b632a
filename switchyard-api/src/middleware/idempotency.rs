//! HTTP-level idempotency-key handling for mutating requests.
//!
//! Clients may send an `Idempotency-Key` header on POST/PUT/PATCH/DELETE.
//! The first request with a given key executes normally and its response is
//! cached; replays with the same key and an identical request body return
//! the cached response. A replay with a *different* body under the same key
//! is a 409 conflict — the key was reused for something else.
//!
//! This is distinct from the relay engine's own `idempotency_key` column on
//! `relay_messages`, which dedupes at the domain level rather than the
//! transport level.

use crate::auth::AuthContext;
use crate::db::DbClient;
use crate::error::{ApiError, ErrorCode};
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::digest_secret;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const MAX_BODY_HASH_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    pub ttl: Duration,
    pub max_body_size: usize,
    pub require_key: bool,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_body_size: MAX_BODY_HASH_SIZE,
            require_key: false,
        }
    }
}

#[derive(Clone)]
pub struct IdempotencyState {
    pub db: Arc<DbClient>,
    pub config: IdempotencyConfig,
}

impl IdempotencyState {
    pub fn new(db: Arc<DbClient>) -> Self {
        Self {
            db,
            config: IdempotencyConfig::default(),
        }
    }

    pub fn with_config(db: Arc<DbClient>, config: IdempotencyConfig) -> Self {
        Self { db, config }
    }
}

pub async fn idempotency_middleware(
    State(state): State<IdempotencyState>,
    request: Request,
    next: Next,
) -> Result<Response, IdempotencyError> {
    let method = request.method().clone();
    if !is_mutating_method(&method) {
        return Ok(next.run(request).await);
    }

    let idempotency_key = request
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    let idempotency_key = match idempotency_key {
        Some(key) => {
            if key.is_empty() || key.len() > 256 {
                return Err(IdempotencyError::InvalidKey(
                    "Idempotency key must be 1-256 characters".to_string(),
                ));
            }
            key
        }
        None => {
            if state.config.require_key {
                return Err(IdempotencyError::MissingKey);
            }
            return Ok(next.run(request).await);
        }
    };

    let tenant_id = request
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.tenant_id.as_uuid())
        .ok_or_else(|| {
            IdempotencyError::Internal("Auth context missing, ensure auth middleware runs first".to_string())
        })?;

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, state.config.max_body_size)
        .await
        .map_err(|e| IdempotencyError::Internal(format!("Failed to read request body: {}", e)))?;

    let request_hash = compute_request_hash(&method, parts.uri.path(), &body_bytes);

    let cached = state
        .db
        .idempotency_key_lookup(&idempotency_key, tenant_id, state.config.ttl.as_secs() as i64)
        .await
        .map_err(|e| IdempotencyError::Internal(e.to_string()))?;

    match cached {
        Some((stored_hash, status, body)) => {
            if stored_hash != request_hash {
                return Err(IdempotencyError::Conflict(idempotency_key));
            }

            tracing::debug!(idempotency_key = %idempotency_key, "Returning cached response for idempotency key");

            let status_code = StatusCode::from_u16(status as u16).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let body_str = serde_json::to_string(&body)
                .map_err(|e| IdempotencyError::Internal(format!("Failed to serialize cached response: {}", e)))?;

            Response::builder()
                .status(status_code)
                .header("content-type", "application/json")
                .header("x-idempotency-replay", "true")
                .body(Body::from(body_str))
                .map_err(|e| IdempotencyError::Internal(format!("Failed to build response: {}", e)))
        }
        None => {
            let request = Request::from_parts(parts, Body::from(body_bytes));
            let response = next.run(request).await;

            let (resp_parts, resp_body) = response.into_parts();
            let resp_bytes = axum::body::to_bytes(resp_body, state.config.max_body_size)
                .await
                .unwrap_or_default();

            let status = resp_parts.status.as_u16() as i32;
            let body_json = serde_json::from_slice(&resp_bytes).unwrap_or(serde_json::Value::Null);

            if let Err(e) = state
                .db
                .idempotency_key_store(&idempotency_key, tenant_id, &request_hash, status, &body_json)
                .await
            {
                tracing::warn!(error = %e, idempotency_key = %idempotency_key, "Failed to store idempotency response");
            }

            Ok(Response::from_parts(resp_parts, Body::from(resp_bytes)))
        }
    }
}

fn is_mutating_method(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Hex SHA-256 of method + path + body, reusing the same digest used for
/// opaque secrets so there is only one hashing convention in the crate.
fn compute_request_hash(method: &Method, path: &str, body: &Bytes) -> String {
    digest_secret(&format!("{}|{}|{}", method.as_str(), path, String::from_utf8_lossy(body)))
}

#[derive(Debug)]
pub enum IdempotencyError {
    MissingKey,
    InvalidKey(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for IdempotencyError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            IdempotencyError::MissingKey => (
                StatusCode::BAD_REQUEST,
                ApiError::new(
                    ErrorCode::MissingField,
                    format!("Header '{}' is required for this operation", IDEMPOTENCY_KEY_HEADER),
                ),
            ),
            IdempotencyError::InvalidKey(msg) => (StatusCode::BAD_REQUEST, ApiError::new(ErrorCode::InvalidFormat, msg)),
            IdempotencyError::Conflict(key) => (
                StatusCode::CONFLICT,
                ApiError::new(
                    ErrorCode::IdempotencyConflict,
                    format!("Idempotency key '{}' was already used with a different request", key),
                ),
            ),
            IdempotencyError::Internal(msg) => {
                tracing::error!(error = %msg, "Idempotency middleware internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::new(ErrorCode::InternalError, "Internal server error"))
            }
        };

        (status, axum::Json(error)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_mutating_method_matches_verbs() {
        assert!(is_mutating_method(&Method::POST));
        assert!(is_mutating_method(&Method::PUT));
        assert!(is_mutating_method(&Method::PATCH));
        assert!(is_mutating_method(&Method::DELETE));
        assert!(!is_mutating_method(&Method::GET));
        assert!(!is_mutating_method(&Method::HEAD));
    }

    #[test]
    fn request_hash_is_deterministic_and_sensitive_to_inputs() {
        let body = Bytes::from(r#"{"name":"a"}"#);
        let h1 = compute_request_hash(&Method::POST, "/v1/tasks", &body);
        let h2 = compute_request_hash(&Method::POST, "/v1/tasks", &body);
        assert_eq!(h1, h2);

        let h3 = compute_request_hash(&Method::PUT, "/v1/tasks", &body);
        assert_ne!(h1, h3);

        let other_body = Bytes::from(r#"{"name":"b"}"#);
        let h4 = compute_request_hash(&Method::POST, "/v1/tasks", &other_body);
        assert_ne!(h1, h4);
    }

    #[test]
    fn idempotency_config_default_is_optional() {
        let config = IdempotencyConfig::default();
        assert_eq!(config.ttl, DEFAULT_TTL);
        assert!(!config.require_key);
    }
}
