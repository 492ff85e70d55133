//! Liveness and readiness for the account pool

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use mailpool_dispatch::PoolStatusService;
use serde::Serialize;

/// Readiness tracking over a pool status service
///
/// Ready means the health monitor is running and at least one account can
/// send.
pub struct HealthChecker {
    pool: Arc<dyn PoolStatusService>,

    /// Whether the background health monitor has been started
    monitor_running: AtomicBool,
}

impl std::fmt::Debug for HealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthChecker")
            .field("monitor_running", &self.monitor_running)
            .finish_non_exhaustive()
    }
}

impl HealthChecker {
    #[must_use]
    pub fn new(pool: Arc<dyn PoolStatusService>) -> Self {
        Self {
            pool,
            monitor_running: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &dyn PoolStatusService {
        self.pool.as_ref()
    }

    pub fn set_monitor_running(&self, running: bool) {
        self.monitor_running.store(running, Ordering::Relaxed);
        tracing::debug!(running, "Health monitor state updated");
    }

    /// If this can be called, the process is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        true
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        let monitor_ok = self.monitor_running.load(Ordering::Relaxed);
        let can_send = self.pool.can_send_any();
        let ready = monitor_ok && can_send;

        if !ready {
            tracing::debug!(
                monitor_running = monitor_ok,
                can_send,
                "Readiness check failed"
            );
        }

        ready
    }

    #[must_use]
    pub fn get_status(&self) -> ReadinessStatus {
        let report = self.pool.health_report(false);
        ReadinessStatus {
            alive: self.is_alive(),
            ready: self.is_ready(),
            monitor_running: self.monitor_running.load(Ordering::Relaxed),
            can_send: report.system.can_send,
            healthy_accounts: report.accounts.healthy,
            total_accounts: report.accounts.total,
        }
    }
}

/// Readiness details returned when the probe fails
#[derive(Debug, Clone, Serialize)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Status struct intentionally has multiple boolean fields for clarity"
)]
pub struct ReadinessStatus {
    pub alive: bool,
    pub ready: bool,
    pub monitor_running: bool,
    pub can_send: bool,
    pub healthy_accounts: usize,
    pub total_accounts: usize,
}
