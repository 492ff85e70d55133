//! Operator-facing health report
//!
//! The system score weighs the healthy share of accounts and the average
//! success rate at 40% each, and whether anything can send at 20%:
//!
//! ```text
//! score = round((healthy / total * 0.4 + avg_success / 100 * 0.4 + can_send * 0.2) * 100)
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::{
    account::{AccountRegistry, Purpose},
    config::LimitsConfig,
    health::{AccountHealth, HealthTracker},
};

const REPORTED_ERRORS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl HealthStatus {
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            90.. => Self::Excellent,
            70..=89 => Self::Good,
            50..=69 => Self::Warning,
            _ => Self::Critical,
        }
    }
}

/// Weighted system health score in `0..=100`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn health_score(healthy: usize, total: usize, avg_success_rate: f64, can_send: bool) -> u8 {
    let healthy_share = if total == 0 {
        0.0
    } else {
        healthy as f64 / total as f64
    };
    let send = if can_send { 1.0 } else { 0.0 };

    let score = (healthy_share * 0.4 + avg_success_rate / 100.0 * 0.4 + send * 0.2) * 100.0;
    score.round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub score: u8,
    pub status: HealthStatus,
    pub can_send: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountDetail {
    pub address: String,
    pub purpose: Option<Purpose>,
    pub is_healthy: bool,
    pub success_rate: f64,
    pub total_sent: u64,
    pub total_failed: u64,
    pub hourly_count: u32,
    pub hourly_limit: u32,
    pub utilization_percent: u32,
    pub consecutive_failures: u32,
    pub last_used_secs_ago: u64,
    pub last_failure_secs_ago: Option<u64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountsSection {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub details: Vec<AccountDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub hourly_capacity: u64,
    pub current_utilization: u64,
    pub total_sent: u64,
    pub total_failed: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub account: String,
    pub error: String,
    pub retryable: bool,
    pub secs_ago: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Seconds since the Unix epoch
    pub generated_at: u64,
    pub system: SystemHealth,
    pub accounts: AccountsSection,
    pub statistics: Statistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_errors: Option<Vec<ErrorEntry>>,
    pub limits: LimitsConfig,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn utilization(count: u32, limit: u32) -> u32 {
    if limit == 0 {
        return 0;
    }
    (f64::from(count) / f64::from(limit) * 100.0).round() as u32
}

impl HealthReport {
    /// Build a report over every monitored account.
    ///
    /// `reason` explains a `false` `can_send`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn build(
        registry: &AccountRegistry,
        tracker: &HealthTracker,
        limits: &LimitsConfig,
        can_send: bool,
        reason: Option<String>,
        include_errors: bool,
    ) -> Self {
        let clock = tracker.clock();

        let snapshots: Vec<(Option<Purpose>, AccountHealth)> = registry
            .monitored()
            .filter_map(|account| {
                tracker.ensure(&account.address);
                tracker
                    .get_health(&account.address)
                    .map(|health| (Some(account.purpose), health))
            })
            .collect();

        let total = snapshots.len();
        let healthy = snapshots.iter().filter(|(_, h)| h.is_healthy).count();
        let avg_success_rate = if total == 0 {
            100.0
        } else {
            snapshots.iter().map(|(_, h)| h.success_rate()).sum::<f64>() / total as f64
        };

        let score = health_score(healthy, total, avg_success_rate, can_send);

        let details = snapshots
            .iter()
            .map(|(purpose, health)| AccountDetail {
                address: health.address.clone(),
                purpose: *purpose,
                is_healthy: health.is_healthy,
                success_rate: round2(health.success_rate()),
                total_sent: health.total_sent,
                total_failed: health.total_failed,
                hourly_count: health.hourly_count,
                hourly_limit: limits.per_account_hourly,
                utilization_percent: utilization(health.hourly_count, limits.per_account_hourly),
                consecutive_failures: health.consecutive_failures,
                last_used_secs_ago: clock.elapsed(health.last_used_at).as_secs(),
                last_failure_secs_ago: health.last_failure_at.map(|at| clock.elapsed(at).as_secs()),
                last_error: health.last_error.clone(),
            })
            .collect();

        let statistics = Statistics {
            hourly_capacity: healthy as u64 * u64::from(limits.per_account_hourly),
            current_utilization: snapshots.iter().map(|(_, h)| u64::from(h.hourly_count)).sum(),
            total_sent: snapshots.iter().map(|(_, h)| h.total_sent).sum(),
            total_failed: snapshots.iter().map(|(_, h)| h.total_failed).sum(),
            success_rate: round2(avg_success_rate),
        };

        let recent_errors = include_errors.then(|| {
            tracker
                .recent_failures(REPORTED_ERRORS)
                .into_iter()
                .map(|failure| ErrorEntry {
                    secs_ago: clock.elapsed(failure.at).as_secs(),
                    account: failure.account,
                    error: failure.error,
                    retryable: failure.retryable,
                })
                .collect()
        });

        Self {
            generated_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
            system: SystemHealth {
                score,
                status: HealthStatus::from_score(score),
                can_send,
                reason: if can_send { None } else { reason },
            },
            accounts: AccountsSection {
                total,
                healthy,
                unhealthy: total - healthy,
                details,
            },
            statistics,
            recent_errors,
            limits: limits.clone(),
        }
    }
}
