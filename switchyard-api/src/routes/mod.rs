//! REST API routes, organized by domain.
//!
//! Every handler returns `ApiResult<impl IntoResponse>`; success bodies are
//! wrapped in [`Envelope`] so the wire shape stays uniform with the error
//! branch `ApiError::into_response` produces.

pub mod health;
pub mod messages;
pub mod oauth;
pub mod sessions;
pub mod tasks;

use axum::Json;
use serde::Serialize;

/// Uniform success envelope: `{success: true, data, meta: {timestamp}}`.
/// Mirrors the shape `ApiError::into_response` emits on the error branch.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub meta: Meta,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Wraps a success payload in the standard envelope.
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { success: true, data, meta: Meta { timestamp: chrono::Utc::now() } })
}

use axum::{
    middleware::from_fn_with_state,
    routing::get,
    Router,
};

use crate::middleware::{auth_middleware, idempotency_middleware, rate_limit_middleware};
use crate::state::AppState;

/// Assembles the full router with the middleware stack ordered per the
/// transport layer's layering contract: trace (applied by the caller) →
/// CORS (applied by the caller) → body-limit (applied by the caller) →
/// idempotency → auth → rate limit → capability/scope/admin-class/compliance
/// gates (inline in handlers, since scope and session-compliance checks need
/// the parsed request body or path) → handler. `Router::layer` wraps
/// outside-in, so the first `.layer()` call here is the innermost (closest
/// to the handler).
pub fn create_router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .merge(tasks::create_router())
        .merge(messages::create_router())
        .merge(sessions::create_router())
        .layer(from_fn_with_state(state.idempotency_state.clone(), idempotency_middleware))
        .layer(from_fn_with_state(state.auth_state.clone(), auth_middleware))
        .layer(from_fn_with_state(state.rate_limit_state.clone(), rate_limit_middleware));

    Router::new()
        .merge(protected)
        .merge(oauth::create_router())
        .route("/healthz", get(health::healthz))
        .route("/metrics", get(crate::telemetry::metrics_handler))
}
