//! Account pool metrics
//!
//! Quarantine and recovery events, plus gauges for the current number of
//! healthy and unhealthy sender accounts.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Meter},
};

use crate::MetricsError;

/// Pool metrics collector
#[derive(Debug)]
pub struct PoolMetrics {
    /// Accounts moved to the unhealthy state
    quarantined_total: Counter<u64>,

    /// Accounts restored to healthy, by trigger (`auto` or `manual`)
    recovered_total: Counter<u64>,

    // Shared with the observable gauge callback
    healthy: Arc<AtomicU64>,
    unhealthy: Arc<AtomicU64>,
}

impl PoolMetrics {
    /// Create a new pool metrics collector
    ///
    /// # Errors
    ///
    /// Returns an error if metric instruments cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let meter = meter();

        let quarantined_total = meter
            .u64_counter("mailpool.pool.quarantined.total")
            .with_description("Sender accounts moved to the unhealthy state")
            .build();

        let recovered_total = meter
            .u64_counter("mailpool.pool.recovered.total")
            .with_description("Sender accounts restored to healthy")
            .build();

        let healthy = Arc::new(AtomicU64::new(0));
        let unhealthy = Arc::new(AtomicU64::new(0));

        let healthy_ref = Arc::clone(&healthy);
        let unhealthy_ref = Arc::clone(&unhealthy);

        meter
            .u64_observable_gauge("mailpool.pool.accounts")
            .with_description("Sender accounts by health state")
            .with_callback(move |observer| {
                observer.observe(
                    healthy_ref.load(Ordering::Relaxed),
                    &[KeyValue::new("state", "healthy")],
                );
                observer.observe(
                    unhealthy_ref.load(Ordering::Relaxed),
                    &[KeyValue::new("state", "unhealthy")],
                );
            })
            .build();

        Ok(Self {
            quarantined_total,
            recovered_total,
            healthy,
            unhealthy,
        })
    }

    /// Record an account being quarantined
    pub fn record_quarantine(&self, account: &str) {
        self.quarantined_total
            .add(1, &[KeyValue::new("account", account.to_string())]);
    }

    /// Record an account being restored
    pub fn record_recovery(&self, account: &str, automatic: bool) {
        let trigger = if automatic { "auto" } else { "manual" };
        self.recovered_total.add(
            1,
            &[
                KeyValue::new("account", account.to_string()),
                KeyValue::new("trigger", trigger),
            ],
        );
    }

    /// Update the account gauges after a health check
    pub fn set_account_counts(&self, healthy: u64, unhealthy: u64) {
        self.healthy.store(healthy, Ordering::Relaxed);
        self.unhealthy.store(unhealthy, Ordering::Relaxed);
    }

    /// Last reported `(healthy, unhealthy)` counts
    #[must_use]
    pub fn account_counts(&self) -> (u64, u64) {
        (
            self.healthy.load(Ordering::Relaxed),
            self.unhealthy.load(Ordering::Relaxed),
        )
    }
}

fn meter() -> Meter {
    opentelemetry::global::meter("mailpool.pool")
}
