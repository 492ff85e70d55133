//! Background health monitor
//!
//! Periodically walks every configured account and restores the unhealthy
//! ones whose last failure is older than the quiescence window. The monitor
//! is only started explicitly, and stops when its [`MonitorHandle`] is shut
//! down or dropped.

use std::{sync::Arc, time::Duration};

use mailpool_common::internal;
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use crate::{
    account::AccountRegistry,
    config::LimitsConfig,
    error::ConfigError,
    health::{HealthTracker, RecoveryCheck},
};

/// Account counts after one health check pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthCheckSummary {
    pub healthy: usize,
    pub unhealthy: usize,
    pub total: usize,
}

#[derive(Debug)]
pub struct HealthMonitor {
    registry: Arc<AccountRegistry>,
    tracker: Arc<HealthTracker>,
    interval: Duration,
    quiescence: Duration,
}

impl HealthMonitor {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLimit`] if `limits` does not validate,
    /// including a zero health check interval.
    pub fn new(
        registry: Arc<AccountRegistry>,
        tracker: Arc<HealthTracker>,
        limits: &LimitsConfig,
    ) -> Result<Self, ConfigError> {
        limits.validate()?;

        Ok(Self {
            registry,
            tracker,
            interval: limits.health_check_interval(),
            quiescence: limits.quiescence_window(),
        })
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single pass over every monitored account.
    pub fn run_health_check_once(&self) -> HealthCheckSummary {
        let mut summary = HealthCheckSummary::default();

        for account in self.registry.monitored() {
            summary.total += 1;

            if self.tracker.ensure(&account.address) {
                summary.healthy += 1;
                continue;
            }

            match self.tracker.try_recover(&account.address, self.quiescence) {
                RecoveryCheck::Healthy | RecoveryCheck::Recovered => summary.healthy += 1,
                RecoveryCheck::StillUnhealthy => summary.unhealthy += 1,
            }
        }

        internal!(
            level = INFO,
            healthy = summary.healthy,
            unhealthy = summary.unhealthy,
            total = summary.total,
            "Health check complete"
        );

        if let Some(metrics) = mailpool_metrics::metrics() {
            metrics
                .pool
                .set_account_counts(summary.healthy as u64, summary.unhealthy as u64);
        }

        summary
    }

    /// Spawn the periodic check. The first pass runs one interval after start.
    #[must_use]
    pub fn start(self: &Arc<Self>) -> MonitorHandle {
        let monitor = Arc::clone(self);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            internal!(
                level = INFO,
                interval_secs = monitor.interval.as_secs(),
                "Health monitor starting"
            );

            let mut ticker = tokio::time::interval(monitor.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.run_health_check_once();
                    }
                    _ = shutdown_rx.changed() => {
                        internal!(level = INFO, "Health monitor shutting down");
                        break;
                    }
                }
            }
        });

        MonitorHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Owns the running monitor task.
#[derive(Debug)]
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop the monitor and wait for the task to finish.
    pub async fn shutdown(self) {
        let Self { shutdown, task } = self;
        shutdown.send_replace(true);

        if let Err(e) = task.await
            && !e.is_cancelled()
        {
            internal!(level = ERROR, error = %e, "Health monitor task failed");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
