//! Switchyard API server entry point.
//!
//! Bootstraps configuration, connects the Postgres pool, assembles the
//! router with its middleware stack, spawns the background cleanup task,
//! and serves until `SIGINT`/`SIGTERM`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use switchyard_api::{
    cleanup_task, create_router, AppConfig, AppState, ApiError, ApiResult, CleanupConfig, DbClient,
};
use switchyard_core::SystemClock;

#[tokio::main]
async fn main() -> ApiResult<()> {
    switchyard_api::telemetry::init_logging();

    let config = Arc::new(AppConfig::from_env());
    let db = DbClient::from_config(&config.db)?;
    let clock: switchyard_core::SharedClock = Arc::new(SystemClock);

    let state = AppState::new(db.clone(), Arc::clone(&config), clock);

    let cors_origins = config.api.cors_origins.clone();
    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let config_for_origin = Arc::clone(&config);
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers(tower_http::cors::Any)
            .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
                origin.to_str().map(|o| config_for_origin.api.is_origin_allowed(o)).unwrap_or(false)
            }))
    };

    let app: Router = create_router(state.clone())
        .layer(RequestBodyLimitLayer::new(config.api.max_request_body_bytes))
        .layer(cors)
        .layer(axum::middleware::from_fn(switchyard_api::telemetry::middleware::observability_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup_handle = tokio::spawn(cleanup_task(Arc::new(db), CleanupConfig::from_env(), shutdown_rx));

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .map_err(|e| ApiError::invalid_input(format!("invalid BIND_ADDR '{}': {e}", config.bind_addr)))?;
    tracing::info!(%addr, "switchyard API listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("failed to bind {addr}: {e}")))?;

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>());
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("server error: {e}")))?;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = cleanup_handle.await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
