//! Axum middleware stack.
//!
//! Applied outermost-first: rate limiting wraps auth (so a failed-auth 401
//! can be charged against the IP brake), auth wraps idempotency (idempotency
//! needs the tenant id auth provides), idempotency wraps the handler.
//!
//! ```ignore
//! Router::new()
//!     .route("/v1/tasks", post(create_task))
//!     .layer(middleware::from_fn_with_state(idempotency_state, idempotency_middleware))
//!     .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
//!     .layer(middleware::from_fn_with_state(rate_limit_state, rate_limit_middleware))
//! ```

mod auth;
pub mod idempotency;

pub use auth::{
    auth_middleware, extract_auth_context, extract_auth_context_owned, rate_limit_middleware,
    AuthExtractor, AuthMiddlewareError, AuthMiddlewareState, InMemoryRateLimiter, RateLimitError,
    RateLimitHeaders, RateLimitState, RateLimiter,
};
pub(crate) use auth::client_ip_from_headers;

pub use idempotency::{
    idempotency_middleware, IdempotencyConfig, IdempotencyError, IdempotencyState,
    IDEMPOTENCY_KEY_HEADER,
};
