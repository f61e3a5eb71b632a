//! Logging and metrics: structured `tracing` spans plus a Prometheus
//! `/metrics` endpoint. No OTLP exporter — see [`logging::init_logging`].

pub mod logging;
pub mod metrics;
pub mod middleware;

pub use logging::init_logging;
pub use metrics::{metrics_handler, SwitchyardMetrics, METRICS};
pub use middleware::observability_middleware;
