//! Background cleanup task (spec §9.A).
//!
//! One `tokio::time::interval` loop running, in order on every tick: task
//! orphan sweep, relay TTL sweep, relay DLQ sweep, expired-session
//! cleanup, and expired OAuth pending-authorization cleanup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::db::DbClient;
use crate::{dispatch, oauth, relay, sessions};

const DEFAULT_CLEANUP_CHECK_INTERVAL_SECS: u64 = 60;

/// Configuration for the background cleanup task.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to run a full sweep cycle (default: 60 seconds).
    pub check_interval: Duration,
    pub log_sweeps: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_CLEANUP_CHECK_INTERVAL_SECS),
            log_sweeps: true,
        }
    }
}

impl CleanupConfig {
    /// # Environment Variables
    /// - `SWITCHYARD_CLEANUP_CHECK_INTERVAL_SECS` (default: 60)
    /// - `SWITCHYARD_CLEANUP_LOG_SWEEPS` (default: true)
    pub fn from_env() -> Self {
        let check_interval = Duration::from_secs(
            std::env::var("SWITCHYARD_CLEANUP_CHECK_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CLEANUP_CHECK_INTERVAL_SECS),
        );
        let log_sweeps = std::env::var("SWITCHYARD_CLEANUP_LOG_SWEEPS")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);
        Self { check_interval, log_sweeps }
    }

    pub fn development() -> Self {
        Self { check_interval: Duration::from_secs(5), log_sweeps: true }
    }
}

/// Counters tracking cleanup activity since startup, exposed via the
/// Prometheus endpoint's gauges.
#[derive(Debug, Default)]
pub struct CleanupMetrics {
    pub tasks_orphaned: AtomicU64,
    pub messages_ttl_expired: AtomicU64,
    pub messages_dead_lettered: AtomicU64,
    pub sessions_expired: AtomicU64,
    pub pending_authorizations_expired: AtomicU64,
    pub cleanup_cycles: AtomicU64,
    pub cleanup_errors: AtomicU64,
}

impl CleanupMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CleanupSnapshot {
        CleanupSnapshot {
            tasks_orphaned: self.tasks_orphaned.load(Ordering::Relaxed),
            messages_ttl_expired: self.messages_ttl_expired.load(Ordering::Relaxed),
            messages_dead_lettered: self.messages_dead_lettered.load(Ordering::Relaxed),
            sessions_expired: self.sessions_expired.load(Ordering::Relaxed),
            pending_authorizations_expired: self.pending_authorizations_expired.load(Ordering::Relaxed),
            cleanup_cycles: self.cleanup_cycles.load(Ordering::Relaxed),
            cleanup_errors: self.cleanup_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanupSnapshot {
    pub tasks_orphaned: u64,
    pub messages_ttl_expired: u64,
    pub messages_dead_lettered: u64,
    pub sessions_expired: u64,
    pub pending_authorizations_expired: u64,
    pub cleanup_cycles: u64,
    pub cleanup_errors: u64,
}

/// Runs cleanup sweeps on a fixed interval until the shutdown signal fires.
pub async fn cleanup_task(
    db: Arc<DbClient>,
    config: CleanupConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<CleanupMetrics> {
    let metrics = Arc::new(CleanupMetrics::new());
    let mut tick = interval(config.check_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(check_interval_secs = config.check_interval.as_secs(), "cleanup task started");

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("cleanup task shutting down");
                    break;
                }
            }
            _ = tick.tick() => {
                run_cleanup_cycle(&db, &config, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        tasks_orphaned = snapshot.tasks_orphaned,
        messages_ttl_expired = snapshot.messages_ttl_expired,
        messages_dead_lettered = snapshot.messages_dead_lettered,
        sessions_expired = snapshot.sessions_expired,
        pending_authorizations_expired = snapshot.pending_authorizations_expired,
        cleanup_cycles = snapshot.cleanup_cycles,
        cleanup_errors = snapshot.cleanup_errors,
        "cleanup task completed"
    );

    metrics
}

async fn run_cleanup_cycle(db: &DbClient, config: &CleanupConfig, metrics: &CleanupMetrics) {
    metrics.cleanup_cycles.fetch_add(1, Ordering::Relaxed);

    match dispatch::sweep_orphans(db).await {
        Ok(n) if n > 0 => {
            metrics.tasks_orphaned.fetch_add(n as u64, Ordering::Relaxed);
            if config.log_sweeps {
                tracing::info!(count = n, "swept orphaned tasks");
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "task orphan sweep failed");
            metrics.cleanup_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    match relay::sweep_expired(db).await {
        Ok(n) if n > 0 => {
            metrics.messages_ttl_expired.fetch_add(n as u64, Ordering::Relaxed);
            if config.log_sweeps {
                tracing::info!(count = n, "swept TTL-expired relay messages");
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "relay TTL sweep failed");
            metrics.cleanup_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    match relay::sweep_dead_letters(db).await {
        Ok(n) if n > 0 => {
            metrics.messages_dead_lettered.fetch_add(n as u64, Ordering::Relaxed);
            if config.log_sweeps {
                tracing::info!(count = n, "dead-lettered stuck relay messages");
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "relay DLQ sweep failed");
            metrics.cleanup_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    match sessions::cleanup_expired(db).await {
        Ok(n) if n > 0 => {
            metrics.sessions_expired.fetch_add(n as u64, Ordering::Relaxed);
            if config.log_sweeps {
                tracing::info!(count = n, "archived expired sessions");
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "session cleanup sweep failed");
            metrics.cleanup_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    match oauth::cleanup_expired_pending_authorizations(db).await {
        Ok(n) if n > 0 => {
            metrics.pending_authorizations_expired.fetch_add(n as u64, Ordering::Relaxed);
            if config.log_sweeps {
                tracing::info!(count = n, "removed expired pending OAuth authorizations");
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "oauth pending-authorization sweep failed");
            metrics.cleanup_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_sixty_second_interval() {
        let config = CleanupConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(60));
        assert!(config.log_sweeps);
    }

    #[test]
    fn development_config_ticks_faster() {
        let config = CleanupConfig::development();
        assert_eq!(config.check_interval, Duration::from_secs(5));
    }

    #[test]
    fn metrics_snapshot_reflects_stored_counts() {
        let metrics = CleanupMetrics::new();
        metrics.tasks_orphaned.store(4, Ordering::Relaxed);
        metrics.sessions_expired.store(2, Ordering::Relaxed);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_orphaned, 4);
        assert_eq!(snapshot.sessions_expired, 2);
    }
}
