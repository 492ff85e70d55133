//! Per-account health tracking
//!
//! Every sender account has one [`AccountHealth`] record holding its rolling
//! hourly send count, consecutive failure streak and lifetime totals. Records
//! are created lazily on first reference, and each record sits behind its own
//! lock so updates for one account never block another.
//!
//! # Quarantine
//!
//! An account becomes unhealthy once its consecutive failures reach the
//! configured threshold. A later success resets the streak but does not
//! restore health: an unhealthy account only comes back through [`HealthTracker::reset`]
//! or the quiescence check run by the health monitor.
//!
//! # Rolling hour
//!
//! The hourly counter is zeroed lazily, the first time the account is
//! touched more than an hour after it was last used.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use mailpool_common::internal;
use parking_lot::Mutex;

use crate::{
    config::LimitsConfig,
    error::TransportError,
    time::{Clock, SystemClock},
};

const ROLLING_HOUR: Duration = Duration::from_secs(3600);
const RECENT_ERROR_CAPACITY: usize = 100;

/// Snapshot of one account's health.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountHealth {
    pub address: String,
    pub is_healthy: bool,
    pub last_used_at: Instant,
    pub hourly_count: u32,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    pub total_sent: u64,
    pub total_failed: u64,
    pub last_error: Option<String>,
}

impl AccountHealth {
    fn new(address: &str, now: Instant) -> Self {
        Self {
            address: address.to_string(),
            is_healthy: true,
            last_used_at: now,
            hourly_count: 0,
            consecutive_failures: 0,
            last_failure_at: None,
            total_sent: 0,
            total_failed: 0,
            last_error: None,
        }
    }

    /// Percentage of successful attempts, 100 when nothing was attempted yet.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let attempts = self.total_sent + self.total_failed;
        if attempts == 0 {
            100.0
        } else {
            self.total_sent as f64 / attempts as f64 * 100.0
        }
    }

    fn roll_hour(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_used_at) > ROLLING_HOUR {
            self.hourly_count = 0;
        }
    }

    fn restore(&mut self) {
        self.is_healthy = true;
        self.consecutive_failures = 0;
        self.hourly_count = 0;
        self.last_failure_at = None;
        self.last_error = None;
    }
}

/// A failed attempt kept for the health report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub at: Instant,
    pub account: String,
    pub error: String,
    pub retryable: bool,
}

/// Outcome of [`HealthTracker::try_recover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCheck {
    Healthy,
    Recovered,
    StillUnhealthy,
}

/// Thread-safe registry of account health records.
#[derive(Debug)]
pub struct HealthTracker {
    records: DashMap<String, Arc<Mutex<AccountHealth>>>,
    recent_failures: Mutex<VecDeque<SendFailure>>,
    max_consecutive_failures: u32,
    hourly_cap: u32,
    clock: Arc<dyn Clock>,
}

impl HealthTracker {
    #[must_use]
    pub fn new(limits: &LimitsConfig) -> Self {
        Self::with_clock(limits, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(limits: &LimitsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            recent_failures: Mutex::new(VecDeque::with_capacity(RECENT_ERROR_CAPACITY)),
            max_consecutive_failures: limits.max_consecutive_failures,
            hourly_cap: limits.per_account_hourly,
            clock,
        }
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    #[must_use]
    pub const fn hourly_cap(&self) -> u32 {
        self.hourly_cap
    }

    fn record(&self, address: &str) -> Arc<Mutex<AccountHealth>> {
        // Fast path for existing records
        if let Some(record) = self.records.get(address) {
            return Arc::clone(record.value());
        }

        let now = self.clock.now();
        Arc::clone(
            self.records
                .entry(address.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(AccountHealth::new(address, now))))
                .value(),
        )
    }

    /// Make sure a record exists for `address`.
    ///
    /// Returns `true` if the record was created by this call.
    pub fn ensure(&self, address: &str) -> bool {
        if self.records.contains_key(address) {
            return false;
        }

        let now = self.clock.now();
        let mut created = false;
        self.records.entry(address.to_string()).or_insert_with(|| {
            created = true;
            Arc::new(Mutex::new(AccountHealth::new(address, now)))
        });
        created
    }

    /// Record the outcome of one send attempt.
    ///
    /// Returns `true` if this attempt quarantined the account.
    pub fn record_attempt(
        &self,
        address: &str,
        success: bool,
        error: Option<&TransportError>,
    ) -> bool {
        let now = self.clock.now();
        let record = self.record(address);
        let mut health = record.lock();

        health.roll_hour(now);
        health.last_used_at = now;

        if success {
            health.total_sent += 1;
            health.hourly_count = health.hourly_count.saturating_add(1);
            health.consecutive_failures = 0;
            return false;
        }

        health.total_failed += 1;
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        health.last_failure_at = Some(now);
        let message = error.map_or_else(|| "unknown error".to_string(), ToString::to_string);
        health.last_error = Some(message.clone());

        self.push_failure(SendFailure {
            at: now,
            account: address.to_string(),
            error: message,
            retryable: error.is_none_or(TransportError::is_temporary),
        });

        if health.is_healthy && health.consecutive_failures >= self.max_consecutive_failures {
            health.is_healthy = false;
            internal!(
                level = WARN,
                account = %address,
                consecutive_failures = health.consecutive_failures,
                threshold = self.max_consecutive_failures,
                "Account marked unhealthy"
            );

            if let Some(metrics) = mailpool_metrics::metrics() {
                metrics.pool.record_quarantine(address);
            }
            return true;
        }

        false
    }

    fn push_failure(&self, failure: SendFailure) {
        let mut failures = self.recent_failures.lock();
        if failures.len() == RECENT_ERROR_CAPACITY {
            failures.pop_front();
        }
        failures.push_back(failure);
    }

    /// Whether the account may send right now.
    ///
    /// Unknown accounts are created healthy and may send.
    pub fn can_send(&self, address: &str) -> bool {
        let now = self.clock.now();
        let record = self.record(address);
        let mut health = record.lock();

        health.roll_hour(now);

        if !health.is_healthy {
            return false;
        }

        if health.hourly_count >= self.hourly_cap {
            internal!(
                level = DEBUG,
                account = %address,
                hourly_count = health.hourly_count,
                "Account reached its hourly cap"
            );
            return false;
        }

        true
    }

    #[must_use]
    pub fn get_health(&self, address: &str) -> Option<AccountHealth> {
        self.records
            .get(address)
            .map(|record| record.value().lock().clone())
    }

    /// Snapshots of every known account, ordered by address.
    #[must_use]
    pub fn get_all_health(&self) -> Vec<AccountHealth> {
        let mut all: Vec<_> = self
            .records
            .iter()
            .map(|entry| entry.value().lock().clone())
            .collect();
        all.sort_by(|a, b| a.address.cmp(&b.address));
        all
    }

    /// Restore an account to healthy. Lifetime totals are kept.
    pub fn reset(&self, address: &str) {
        let record = self.record(address);
        let mut health = record.lock();
        let was_unhealthy = !health.is_healthy;
        health.restore();
        drop(health);

        internal!(level = INFO, account = %address, "Account health reset");

        if was_unhealthy && let Some(metrics) = mailpool_metrics::metrics() {
            metrics.pool.record_recovery(address, false);
        }
    }

    /// Restore an unhealthy account whose last failure is older than `quiescence`.
    ///
    /// An unhealthy account that never recorded a failure time counts as quiescent.
    pub fn try_recover(&self, address: &str, quiescence: Duration) -> RecoveryCheck {
        let now = self.clock.now();
        let record = self.record(address);
        let mut health = record.lock();

        if health.is_healthy {
            return RecoveryCheck::Healthy;
        }

        let quiet = health
            .last_failure_at
            .is_none_or(|at| now.saturating_duration_since(at) > quiescence);

        if !quiet {
            return RecoveryCheck::StillUnhealthy;
        }

        health.restore();
        drop(health);

        internal!(level = INFO, account = %address, "Auto-recovered account");

        if let Some(metrics) = mailpool_metrics::metrics() {
            metrics.pool.record_recovery(address, true);
        }

        RecoveryCheck::Recovered
    }

    /// The most recent failures, newest last.
    #[must_use]
    pub fn recent_failures(&self, limit: usize) -> Vec<SendFailure> {
        let failures = self.recent_failures.lock();
        let skip = failures.len().saturating_sub(limit);
        failures.iter().skip(skip).cloned().collect()
    }
}
