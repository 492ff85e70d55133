//! Recipient distribution
//!
//! Splits a campaign's recipients into contiguous chunks of `ceil(R / k)`
//! across the `k` usable accounts. Chunk `i` goes to account `i mod k`, so the
//! plan has at most `k` entries and the last one may be short.
//!
//! ```text
//! 13 recipients, 3 accounts, chunk = 5
//! no-reply1: r0..r4    (5)
//! no-reply2: r5..r9    (5)
//! no-reply3: r10..r12  (3)
//! ```

use std::{sync::Arc, time::Duration};

use mailpool_common::internal;
use serde::Serialize;

use crate::{
    account::SenderAccount,
    error::DispatchError,
    rate_limiter::RateLimiter,
    selector::{AccountSelector, SelectionMode},
};

/// One account's share of a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub account: SenderAccount,
    pub recipients: Vec<String>,
    pub estimated_duration: Duration,
}

/// Assignment of recipients to accounts for one campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchPlan {
    pub entries: Vec<PlanEntry>,
    pub mode: SelectionMode,
}

impl DispatchPlan {
    #[must_use]
    pub fn total_recipients(&self) -> usize {
        self.entries.iter().map(|e| e.recipients.len()).sum()
    }

    /// Wall-clock estimate; entries run concurrently.
    #[must_use]
    pub fn estimated_duration(&self) -> Duration {
        self.entries
            .iter()
            .map(|e| e.estimated_duration)
            .max()
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
pub struct Distributor {
    selector: Arc<AccountSelector>,
    limiter: RateLimiter,
}

impl Distributor {
    #[must_use]
    pub const fn new(selector: Arc<AccountSelector>, limiter: RateLimiter) -> Self {
        Self { selector, limiter }
    }

    /// Build a dispatch plan for `recipients`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::EmptyRecipients`] for an empty recipient list
    /// - [`DispatchError::NoAccountsAvailable`] if no account can be offered
    /// - a configuration error if the bulk tier is empty
    pub fn distribute(&self, recipients: &[String]) -> Result<DispatchPlan, DispatchError> {
        if recipients.is_empty() {
            return Err(DispatchError::EmptyRecipients);
        }

        let pool = self.selector.usable_pool()?;
        if pool.accounts.is_empty() {
            return Err(DispatchError::NoAccountsAvailable);
        }

        let plan = partition(recipients, &pool.accounts, &self.limiter, pool.mode);

        internal!(
            level = INFO,
            recipients = recipients.len(),
            accounts = plan.len(),
            mode = ?plan.mode,
            estimated_secs = plan.estimated_duration().as_secs(),
            "Distributed recipients"
        );

        Ok(plan)
    }
}

fn partition(
    recipients: &[String],
    accounts: &[SenderAccount],
    limiter: &RateLimiter,
    mode: SelectionMode,
) -> DispatchPlan {
    let chunk = recipients.len().div_ceil(accounts.len());

    let entries = recipients
        .chunks(chunk)
        .enumerate()
        .map(|(i, chunk)| PlanEntry {
            account: accounts[i % accounts.len()].clone(),
            recipients: chunk.to_vec(),
            estimated_duration: limiter.estimate(chunk.len()),
        })
        .collect();

    DispatchPlan { entries, mode }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        account::{AccountRegistry, FallbackConfig, Purpose},
        config::LimitsConfig,
        health::HealthTracker,
    };

    fn accounts(k: usize) -> Vec<SenderAccount> {
        (1..=k)
            .map(|i| SenderAccount::new(format!("no-reply{i}@example.org"), Purpose::Bulk, 1))
            .collect()
    }

    fn recipients(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("member{i}@example.com")).collect()
    }

    fn distributor(k: usize) -> Distributor {
        let limits = LimitsConfig::default();
        let registry = Arc::new(AccountRegistry::new(accounts(k), FallbackConfig::default()).unwrap());
        let tracker = Arc::new(HealthTracker::new(&limits));
        Distributor::new(Arc::new(AccountSelector::new(registry, tracker)), RateLimiter::new(&limits))
    }

    #[test]
    fn test_partition_properties() {
        let limiter = RateLimiter::new(&LimitsConfig::default());

        for k in [1, 2, 3, 9] {
            for r in [1, k, k + 1, 7 * k + 3] {
                let input = recipients(r);
                let plan = partition(&input, &accounts(k), &limiter, SelectionMode::Healthy);

                // Concatenation in plan order is the input
                let flattened: Vec<String> =
                    plan.entries.iter().flat_map(|e| e.recipients.clone()).collect();
                assert_eq!(flattened, input, "k={k} r={r}");

                let chunk = r.div_ceil(k);
                assert!(plan.len() <= k);
                assert!(plan.entries.iter().all(|e| e.recipients.len() <= chunk));

                // Entries are assigned to distinct accounts
                let mut used: Vec<_> = plan.entries.iter().map(|e| &e.account.address).collect();
                used.dedup();
                assert_eq!(used.len(), plan.len());
            }
        }
    }

    #[test]
    fn test_thirteen_over_three() {
        let plan = distributor(3).distribute(&recipients(13)).unwrap();

        let sizes: Vec<usize> = plan.entries.iter().map(|e| e.recipients.len()).collect();
        assert_eq!(sizes, [5, 5, 3]);

        let durations: Vec<Duration> = plan.entries.iter().map(|e| e.estimated_duration).collect();
        assert_eq!(
            durations,
            [Duration::from_millis(500), Duration::from_millis(500), Duration::from_millis(300)]
        );
        assert_eq!(plan.estimated_duration(), Duration::from_millis(500));
        assert_eq!(plan.total_recipients(), 13);
        assert_eq!(plan.entries[2].recipients[0], "member10@example.com");
    }

    #[test]
    fn test_fewer_recipients_than_accounts() {
        let plan = distributor(9).distribute(&recipients(4)).unwrap();
        assert_eq!(plan.len(), 4);
        assert!(plan.entries.iter().all(|e| e.recipients.len() == 1));
    }

    #[test]
    fn test_empty_recipients_rejected() {
        let err = distributor(3).distribute(&[]).unwrap_err();
        assert!(matches!(err, DispatchError::EmptyRecipients));
    }
}
