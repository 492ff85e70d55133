//! Send pacing and campaign budgets
//!
//! Two limits apply to a campaign besides the per-account hourly cap enforced
//! by the [`HealthTracker`](crate::HealthTracker):
//!
//! - a fixed pause between consecutive sends from the same account
//! - a per-campaign budget of send attempts shared by all workers
//!
//! # Example
//!
//! ```text
//! delay: 100ms, budget: 4500
//! - each worker sends, sleeps 100ms, sends again
//! - the 4501st attempt across all workers is refused
//! - refused recipients are reported as pending
//! ```

use std::{
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use crate::{cancel::CancelSignal, config::LimitsConfig};

/// Paces sends and hands out campaign budgets.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    send_delay: Duration,
    per_campaign: u32,
}

impl RateLimiter {
    /// `limits` is expected to have passed [`LimitsConfig::validate`]. A zero
    /// campaign cap yields budgets that refuse every send.
    #[must_use]
    pub const fn new(limits: &LimitsConfig) -> Self {
        Self {
            send_delay: limits.send_delay(),
            per_campaign: limits.per_campaign_hourly,
        }
    }

    #[must_use]
    pub const fn send_delay(&self) -> Duration {
        self.send_delay
    }

    /// Time one account needs for `sends` paced sends.
    #[must_use]
    pub fn estimate(&self, sends: usize) -> Duration {
        self.send_delay
            .saturating_mul(u32::try_from(sends).unwrap_or(u32::MAX))
    }

    /// A fresh attempt budget for one campaign run.
    #[must_use]
    pub const fn campaign_budget(&self) -> CampaignBudget {
        CampaignBudget::new(self.per_campaign)
    }

    /// Wait out the inter-send delay.
    ///
    /// Returns `false` if the campaign was cancelled before or during the wait.
    pub async fn pace(&self, cancel: &mut CancelSignal) -> bool {
        if cancel.is_cancelled() {
            return false;
        }

        if self.send_delay.is_zero() {
            return true;
        }

        tokio::select! {
            () = tokio::time::sleep(self.send_delay) => !cancel.is_cancelled(),
            () = cancel.cancelled() => false,
        }
    }
}

/// Attempts remaining for one campaign run.
#[derive(Debug)]
pub struct CampaignBudget {
    remaining: AtomicU32,
}

impl CampaignBudget {
    #[must_use]
    pub const fn new(limit: u32) -> Self {
        Self {
            remaining: AtomicU32::new(limit),
        }
    }

    /// Take one attempt from the budget, `false` once it is spent.
    pub fn try_acquire(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }
}
