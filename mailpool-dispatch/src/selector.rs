//! Sender account selection
//!
//! Picks one account for a transactional send, or the usable bulk set for a
//! campaign. Bulk selection rotates through the healthy accounts in priority
//! order using a shared atomic counter, so concurrent callers spread evenly.
//!
//! When no bulk account is healthy the selector degrades instead of failing:
//! single selection returns the first bulk account and the usable set becomes
//! the whole bulk tier.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use mailpool_common::internal;
use serde::Serialize;

use crate::{
    account::{AccountRegistry, Purpose, SenderAccount},
    error::{ConfigError, DispatchError},
    health::HealthTracker,
};

/// How the usable set was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Only accounts passing `can_send`
    Healthy,
    /// No account passed `can_send`; the whole bulk tier is used anyway
    Degraded,
    /// Fallback mode; the fallback account is used unconditionally
    Fallback,
}

impl SelectionMode {
    /// Whether workers should check `can_send` before each send.
    #[must_use]
    pub const fn enforces_health(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// The accounts a distribution may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsablePool {
    pub accounts: Vec<SenderAccount>,
    pub mode: SelectionMode,
}

#[derive(Debug)]
pub struct AccountSelector {
    registry: Arc<AccountRegistry>,
    tracker: Arc<HealthTracker>,
    counter: AtomicUsize,
}

impl AccountSelector {
    #[must_use]
    pub const fn new(registry: Arc<AccountRegistry>, tracker: Arc<HealthTracker>) -> Self {
        Self {
            registry,
            tracker,
            counter: AtomicUsize::new(0),
        }
    }

    /// Account for a one-off send.
    ///
    /// Transactional purposes use their designated account while it can
    /// send, otherwise the request falls through to bulk selection.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the bulk tier is needed but empty.
    pub fn select_for_purpose(&self, purpose: Purpose) -> Result<SenderAccount, DispatchError> {
        if let Some(fallback) = self.registry.active_fallback() {
            return Ok(fallback.clone());
        }

        if purpose.is_transactional()
            && let Some(account) = self.registry.designated(purpose)
        {
            if self.tracker.can_send(&account.address) {
                internal!(level = DEBUG, purpose = %purpose, account = %account.address, "Selected designated account");
                return Ok(account.clone());
            }

            internal!(
                level = DEBUG,
                purpose = %purpose,
                account = %account.address,
                "Designated account cannot send, using bulk tier"
            );
        }

        self.select_for_bulk()
    }

    /// Next bulk account in round-robin order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the bulk tier is empty.
    pub fn select_for_bulk(&self) -> Result<SenderAccount, DispatchError> {
        if let Some(fallback) = self.registry.active_fallback() {
            return Ok(fallback.clone());
        }

        let bulk: Vec<&SenderAccount> = self.registry.bulk().collect();
        let Some(first) = bulk.first() else {
            return Err(ConfigError::EmptyBulkTier.into());
        };

        let mut healthy: Vec<&SenderAccount> = bulk
            .iter()
            .copied()
            .filter(|a| self.tracker.can_send(&a.address))
            .collect();

        if healthy.is_empty() {
            internal!(level = WARN, "No healthy accounts available, using first bulk account");
            return Ok((*first).clone());
        }

        // Stable, so equal priorities keep configuration order
        healthy.sort_by_key(|a| a.priority);

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % healthy.len();
        let account = healthy[index];
        internal!(level = DEBUG, account = %account.address, index, "Selected bulk account");

        Ok(account.clone())
    }

    /// Usable bulk accounts together with how they were chosen.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the bulk tier is empty.
    pub fn usable_pool(&self) -> Result<UsablePool, DispatchError> {
        if let Some(fallback) = self.registry.active_fallback() {
            return Ok(UsablePool {
                accounts: vec![fallback.clone()],
                mode: SelectionMode::Fallback,
            });
        }

        let bulk: Vec<&SenderAccount> = self.registry.bulk().collect();
        if bulk.is_empty() {
            return Err(ConfigError::EmptyBulkTier.into());
        }

        let healthy: Vec<SenderAccount> = bulk
            .iter()
            .filter(|a| self.tracker.can_send(&a.address))
            .map(|a| (*a).clone())
            .collect();

        if healthy.is_empty() {
            internal!(
                level = WARN,
                bulk_accounts = bulk.len(),
                "No healthy accounts available, using all bulk accounts"
            );
            return Ok(UsablePool {
                accounts: bulk.into_iter().cloned().collect(),
                mode: SelectionMode::Degraded,
            });
        }

        Ok(UsablePool {
            accounts: healthy,
            mode: SelectionMode::Healthy,
        })
    }

    /// Usable bulk accounts in configuration order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the bulk tier is empty.
    pub fn list_usable_bulk_accounts(&self) -> Result<Vec<SenderAccount>, DispatchError> {
        self.usable_pool().map(|pool| pool.accounts)
    }
}
