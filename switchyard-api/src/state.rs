//! Shared application state for Axum routers.

use std::sync::Arc;

use switchyard_core::SharedClock;

use crate::config::AppConfig;
use crate::db::DbClient;
use crate::middleware::{AuthMiddlewareState, IdempotencyState, RateLimitState};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub db: DbClient,
    pub config: Arc<AppConfig>,
    pub clock: SharedClock,
    pub auth_state: AuthMiddlewareState,
    pub rate_limit_state: RateLimitState,
    pub idempotency_state: IdempotencyState,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(db: DbClient, config: Arc<AppConfig>, clock: SharedClock) -> Self {
        let auth_state = AuthMiddlewareState::new(db.clone(), Arc::new(config.auth.clone()));
        let rate_limit_state = RateLimitState::new(&config.rate_limit);
        let idempotency_state = IdempotencyState::new(Arc::new(db.clone()));

        Self {
            db,
            config,
            clock,
            auth_state,
            rate_limit_state,
            idempotency_state,
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(DbClient, db);
crate::impl_from_ref!(Arc<AppConfig>, config);
crate::impl_from_ref!(SharedClock, clock);
crate::impl_from_ref!(AuthMiddlewareState, auth_state);
crate::impl_from_ref!(RateLimitState, rate_limit_state);
crate::impl_from_ref!(IdempotencyState, idempotency_state);
crate::impl_from_ref!(std::time::Instant, start_time);
