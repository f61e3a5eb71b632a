//! Switchyard control-plane API.
//!
//! Exposes the task dispatch engine, the inter-program relay, session/
//! compliance tracking, and an OAuth 2.1 authorization server over a REST
//! surface built on Axum and backed by PostgreSQL.

pub mod auth;
pub mod capabilities;
pub mod config;
pub mod constants;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod jobs;
pub mod macros;
pub mod middleware;
pub mod oauth;
pub mod relay;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod telemetry;

pub use auth::{authenticate, AuthContext, AuthMethod};
pub use config::{AppConfig, AuthConfig};
pub use db::DbClient;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{cleanup_task, CleanupConfig, CleanupMetrics};
pub use middleware::{
    auth_middleware, idempotency_middleware, rate_limit_middleware, AuthExtractor,
    AuthMiddlewareState, IdempotencyConfig, IdempotencyState, RateLimitState,
    IDEMPOTENCY_KEY_HEADER,
};
pub use routes::create_router;
pub use state::AppState;
pub use telemetry::{init_logging, metrics_handler, SwitchyardMetrics, METRICS};
