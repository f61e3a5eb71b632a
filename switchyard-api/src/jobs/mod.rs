//! Background jobs.
//!
//! - `cleanup`: sweeps orphaned task claims, expired/dead-lettered relay
//!   messages, idle sessions, and expired OAuth pending authorizations.
//!
//! Spawned once at startup alongside a `tokio::sync::watch` shutdown
//! signal:
//!
//! ```ignore
//! use switchyard_api::jobs::{cleanup_task, CleanupConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(cleanup_task(Arc::clone(&db), CleanupConfig::from_env(), shutdown_rx));
//! // later: let _ = shutdown_tx.send(true);
//! ```

pub mod cleanup;

pub use cleanup::{cleanup_task, CleanupConfig, CleanupMetrics};
