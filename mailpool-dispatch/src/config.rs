//! Pool configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    account::{FallbackConfig, SenderAccount},
    error::ConfigError,
};

/// Sending limits and health thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Sends allowed per account within a rolling hour
    #[serde(default = "default_per_account_hourly")]
    pub per_account_hourly: u32,

    /// Attempts allowed per campaign run
    #[serde(default = "default_per_campaign_hourly")]
    pub per_campaign_hourly: u32,

    /// Pause between consecutive sends from one account (milliseconds)
    #[serde(default = "default_delay_between_sends_ms")]
    pub delay_between_sends_ms: u64,

    /// Consecutive failures that quarantine an account
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Health monitor period (milliseconds)
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,

    /// Quiet period after the last failure before automatic recovery (seconds)
    #[serde(default = "default_quiescence_secs")]
    pub quiescence_secs: u64,

    /// Attempts made by a single transactional send
    #[serde(default = "default_send_attempts")]
    pub send_attempts: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            per_account_hourly: default_per_account_hourly(),
            per_campaign_hourly: default_per_campaign_hourly(),
            delay_between_sends_ms: default_delay_between_sends_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            health_check_interval_ms: default_health_check_interval_ms(),
            quiescence_secs: default_quiescence_secs(),
            send_attempts: default_send_attempts(),
        }
    }
}

const fn default_per_account_hourly() -> u32 {
    500
}

const fn default_per_campaign_hourly() -> u32 {
    4500
}

const fn default_delay_between_sends_ms() -> u64 {
    100
}

const fn default_max_consecutive_failures() -> u32 {
    3
}

const fn default_health_check_interval_ms() -> u64 {
    300_000 // 5 minutes
}

const fn default_quiescence_secs() -> u64 {
    3600
}

const fn default_send_attempts() -> u32 {
    3
}

impl LimitsConfig {
    /// Reject limits that would stall the pool.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLimit`] for zero caps, thresholds or intervals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 5] = [
            ("per_account_hourly", self.per_account_hourly > 0),
            ("per_campaign_hourly", self.per_campaign_hourly > 0),
            ("max_consecutive_failures", self.max_consecutive_failures > 0),
            ("health_check_interval_ms", self.health_check_interval_ms > 0),
            ("send_attempts", self.send_attempts > 0),
        ];

        for (field, ok) in checks {
            if !ok {
                return Err(ConfigError::InvalidLimit {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        Ok(())
    }

    #[must_use]
    pub const fn send_delay(&self) -> Duration {
        Duration::from_millis(self.delay_between_sends_ms)
    }

    #[must_use]
    pub const fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    #[must_use]
    pub const fn quiescence_window(&self) -> Duration {
        Duration::from_secs(self.quiescence_secs)
    }
}

/// Everything needed to build an [`AccountPool`](crate::AccountPool).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub accounts: Vec<SenderAccount>,

    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}
