//! The account pool: registry, health, selection and distribution wired
//! together behind one handle.

use std::sync::Arc;

use mailpool_common::internal;

use crate::{
    account::{AccountRegistry, Purpose, SenderAccount},
    config::{LimitsConfig, PoolConfig},
    distributor::{DispatchPlan, Distributor},
    error::{DispatchError, TransportError},
    health::{AccountHealth, HealthTracker},
    monitor::{HealthCheckSummary, HealthMonitor, MonitorHandle},
    rate_limiter::RateLimiter,
    report::HealthReport,
    selector::{AccountSelector, UsablePool},
    service::PoolStatusService,
    time::{Clock, SystemClock},
};

#[derive(Debug)]
pub struct AccountPool {
    registry: Arc<AccountRegistry>,
    tracker: Arc<HealthTracker>,
    selector: Arc<AccountSelector>,
    distributor: Distributor,
    limiter: RateLimiter,
    monitor: Arc<HealthMonitor>,
    limits: LimitsConfig,
}

impl AccountPool {
    /// Validate the configuration and build the pool.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the accounts or limits are invalid.
    pub fn new(config: PoolConfig) -> Result<Self, DispatchError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build the pool with an explicit time source.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the accounts or limits are invalid.
    pub fn with_clock(config: PoolConfig, clock: Arc<dyn Clock>) -> Result<Self, DispatchError> {
        let PoolConfig {
            accounts,
            fallback,
            limits,
        } = config;

        limits.validate()?;
        let registry = Arc::new(AccountRegistry::new(accounts, fallback)?);
        let tracker = Arc::new(HealthTracker::with_clock(&limits, clock));
        let selector = Arc::new(AccountSelector::new(
            Arc::clone(&registry),
            Arc::clone(&tracker),
        ));
        let limiter = RateLimiter::new(&limits);
        let distributor = Distributor::new(Arc::clone(&selector), limiter.clone());
        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&tracker),
            &limits,
        )?);

        internal!(
            level = INFO,
            accounts = registry.accounts().len(),
            bulk = registry.bulk().count(),
            fallback = registry.fallback_enabled(),
            "Account pool initialised"
        );

        Ok(Self {
            registry,
            tracker,
            selector,
            distributor,
            limiter,
            monitor,
            limits,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn tracker(&self) -> &Arc<HealthTracker> {
        &self.tracker
    }

    #[must_use]
    pub const fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    #[must_use]
    pub const fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// # Errors
    ///
    /// Returns a configuration error if bulk selection is needed and the bulk tier is empty.
    pub fn select_for_purpose(&self, purpose: Purpose) -> Result<SenderAccount, DispatchError> {
        self.selector.select_for_purpose(purpose)
    }

    /// # Errors
    ///
    /// Returns a configuration error if the bulk tier is empty.
    pub fn select_for_bulk(&self) -> Result<SenderAccount, DispatchError> {
        self.selector.select_for_bulk()
    }

    /// # Errors
    ///
    /// Returns a configuration error if the bulk tier is empty.
    pub fn list_usable_bulk_accounts(&self) -> Result<Vec<SenderAccount>, DispatchError> {
        self.selector.list_usable_bulk_accounts()
    }

    /// # Errors
    ///
    /// Returns a configuration error if the bulk tier is empty.
    pub fn usable_pool(&self) -> Result<UsablePool, DispatchError> {
        self.selector.usable_pool()
    }

    /// # Errors
    ///
    /// See [`Distributor::distribute`].
    pub fn distribute(&self, recipients: &[String]) -> Result<DispatchPlan, DispatchError> {
        self.distributor.distribute(recipients)
    }

    pub fn record_attempt(
        &self,
        address: &str,
        success: bool,
        error: Option<&TransportError>,
    ) -> bool {
        self.tracker.record_attempt(address, success, error)
    }

    pub fn can_send(&self, address: &str) -> bool {
        self.tracker.can_send(address)
    }

    #[must_use]
    pub fn get_health(&self, address: &str) -> Option<AccountHealth> {
        self.tracker.get_health(address)
    }

    #[must_use]
    pub fn get_all_health(&self) -> Vec<AccountHealth> {
        self.tracker.get_all_health()
    }

    pub fn reset(&self, address: &str) {
        self.tracker.reset(address);
    }

    /// Reset every monitored account, returning how many were reset.
    pub fn reset_all(&self) -> usize {
        let mut count = 0;
        for account in self.registry.monitored() {
            self.tracker.reset(&account.address);
            count += 1;
        }
        count
    }

    pub fn run_health_check_once(&self) -> HealthCheckSummary {
        self.monitor.run_health_check_once()
    }

    /// Start the periodic health monitor.
    #[must_use]
    pub fn start_monitor(&self) -> MonitorHandle {
        self.monitor.start()
    }

    /// Whether any account may send right now, with a reason when none can.
    pub fn send_capability(&self) -> (bool, Option<String>) {
        if self.registry.active_fallback().is_some() {
            return (true, None);
        }

        if self
            .registry
            .accounts()
            .iter()
            .any(|a| self.tracker.can_send(&a.address))
        {
            (true, None)
        } else {
            (
                false,
                Some("All accounts are unhealthy or at their hourly limit".to_string()),
            )
        }
    }

    #[must_use]
    pub fn health_report(&self, include_errors: bool) -> HealthReport {
        let (can_send, reason) = self.send_capability();
        HealthReport::build(
            &self.registry,
            &self.tracker,
            &self.limits,
            can_send,
            reason,
            include_errors,
        )
    }
}

impl PoolStatusService for AccountPool {
    fn health_report(&self, include_errors: bool) -> HealthReport {
        Self::health_report(self, include_errors)
    }

    fn run_health_check(&self) -> HealthCheckSummary {
        self.run_health_check_once()
    }

    fn reset_account(&self, address: &str) -> bool {
        if !self.registry.contains(address) {
            return false;
        }
        self.reset(address);
        true
    }

    fn reset_all_accounts(&self) -> usize {
        self.reset_all()
    }

    fn can_send_any(&self) -> bool {
        self.send_capability().0
    }
}
