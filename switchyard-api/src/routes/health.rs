//! Liveness/readiness endpoint. No authentication required.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::db::DbClient;

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    database: &'static str,
    uptime_seconds: u64,
    version: &'static str,
}

/// `GET /healthz`: pings the database pool and reports process uptime.
pub async fn healthz(State(db): State<DbClient>, State(start_time): State<std::time::Instant>) -> impl IntoResponse {
    let database = match db.health_check().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!(error = %e, "health check database probe failed");
            "unhealthy"
        }
    };
    Json(HealthBody {
        status: if database == "healthy" { "healthy" } else { "degraded" },
        database,
        uptime_seconds: start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
