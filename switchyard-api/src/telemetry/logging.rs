//! Structured logging initialization.
//!
//! No OTLP exporter: spans stay local and are emitted as JSON log lines via
//! `tracing-subscriber`. A deployment that wants distributed tracing puts a
//! collector in front of stdout, it doesn't need a library dependency here.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global `tracing` subscriber. Call once at startup, before
/// the first `tracing::info!` or span is created.
pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("switchyard_api=info,tower_http=info,info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
