//! Service trait for operator interfaces
//!
//! Decouples the HTTP health endpoints from [`AccountPool`](crate::AccountPool)
//! so handlers can be tested against a stub.
//!
//! # Example
//!
//! ```rust,ignore
//! fn ready(service: &dyn PoolStatusService) -> bool {
//!     service.can_send_any()
//! }
//! ```

use crate::{monitor::HealthCheckSummary, report::HealthReport};

pub trait PoolStatusService: Send + Sync {
    /// Current health report, optionally with the most recent send errors.
    fn health_report(&self, include_errors: bool) -> HealthReport;

    /// Run one health check pass immediately.
    fn run_health_check(&self) -> HealthCheckSummary;

    /// Reset one configured account.
    ///
    /// Returns `false` if the address is not a configured account.
    fn reset_account(&self, address: &str) -> bool;

    /// Reset every configured account, returning how many were reset.
    fn reset_all_accounts(&self) -> usize;

    /// Whether at least one account may send right now.
    fn can_send_any(&self) -> bool;
}
