//! Sender account catalog
//!
//! Accounts are loaded once from configuration and never change afterwards.
//! Each account has a purpose; transactional purposes have at most one
//! designated account, while the bulk tier holds the accounts used for
//! campaign fan-out and as the last resort for transactional mail.

use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What an account is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Admin,
    Info,
    Events,
    System,
    Bulk,
    Fallback,
}

impl Purpose {
    /// Purposes served by a single designated account.
    pub const TRANSACTIONAL: [Self; 4] = [Self::Admin, Self::Info, Self::Events, Self::System];

    #[must_use]
    pub const fn is_transactional(self) -> bool {
        matches!(self, Self::Admin | Self::Info | Self::Events | Self::System)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Info => "info",
            Self::Events => "events",
            Self::System => "system",
            Self::Bulk => "bulk",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single outbound identity.
///
/// `credential` names where the transport finds the secret (for example an
/// environment variable); the secret itself never lives in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderAccount {
    pub address: String,
    pub purpose: Purpose,

    /// Lower is preferred.
    #[serde(default = "default_priority")]
    pub priority: u32,

    #[serde(default)]
    pub credential: Option<String>,
}

const fn default_priority() -> u32 {
    1
}

impl SenderAccount {
    pub fn new(address: impl Into<String>, purpose: Purpose, priority: u32) -> Self {
        Self {
            address: address.into(),
            purpose,
            priority,
            credential: None,
        }
    }

    #[must_use]
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }
}

/// Fallback account settings.
///
/// When `enabled`, every selection returns the fallback account and the rest
/// of the catalog is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub credential: Option<String>,
}

/// Validated, immutable set of sender accounts.
#[derive(Debug, Clone)]
pub struct AccountRegistry {
    accounts: Vec<SenderAccount>,
    fallback: Option<SenderAccount>,
    fallback_enabled: bool,
}

impl AccountRegistry {
    /// Build the registry, rejecting catalogs the pool cannot work with.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the bulk tier is empty (outside fallback
    /// mode), an address is duplicated, a transactional purpose has more than
    /// one account, or fallback mode is enabled without an address.
    pub fn new(accounts: Vec<SenderAccount>, fallback: FallbackConfig) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut purposes = HashSet::new();

        for account in &accounts {
            if !seen.insert(account.address.as_str()) {
                return Err(ConfigError::DuplicateAccount(account.address.clone()));
            }

            if account.purpose == Purpose::Fallback {
                return Err(ConfigError::MisplacedFallback(account.address.clone()));
            }

            if account.purpose.is_transactional() && !purposes.insert(account.purpose) {
                return Err(ConfigError::DuplicatePurpose(account.purpose));
            }
        }

        let fallback_account = fallback.address.map(|address| SenderAccount {
            address,
            purpose: Purpose::Fallback,
            priority: default_priority(),
            credential: fallback.credential,
        });

        if let Some(account) = &fallback_account
            && seen.contains(account.address.as_str())
        {
            return Err(ConfigError::DuplicateAccount(account.address.clone()));
        }

        if fallback.enabled && fallback_account.is_none() {
            return Err(ConfigError::MissingFallbackAccount);
        }

        let has_bulk = accounts.iter().any(|a| a.purpose == Purpose::Bulk);
        if !has_bulk && !fallback.enabled {
            return Err(ConfigError::EmptyBulkTier);
        }

        Ok(Self {
            accounts,
            fallback: fallback_account,
            fallback_enabled: fallback.enabled,
        })
    }

    /// All configured accounts, excluding the fallback account.
    #[must_use]
    pub fn accounts(&self) -> &[SenderAccount] {
        &self.accounts
    }

    /// The bulk tier in configuration order.
    pub fn bulk(&self) -> impl Iterator<Item = &SenderAccount> {
        self.accounts.iter().filter(|a| a.purpose == Purpose::Bulk)
    }

    /// The account designated for a transactional purpose, if any.
    #[must_use]
    pub fn designated(&self, purpose: Purpose) -> Option<&SenderAccount> {
        if !purpose.is_transactional() {
            return None;
        }
        self.accounts.iter().find(|a| a.purpose == purpose)
    }

    /// The fallback account when fallback mode is on.
    #[must_use]
    pub fn active_fallback(&self) -> Option<&SenderAccount> {
        self.fallback.as_ref().filter(|_| self.fallback_enabled)
    }

    #[must_use]
    pub fn fallback(&self) -> Option<&SenderAccount> {
        self.fallback.as_ref()
    }

    #[must_use]
    pub const fn fallback_enabled(&self) -> bool {
        self.fallback_enabled
    }

    /// Every account the health monitor watches: the catalog plus the
    /// fallback account when one is configured.
    pub fn monitored(&self) -> impl Iterator<Item = &SenderAccount> {
        self.accounts.iter().chain(self.fallback.iter())
    }

    #[must_use]
    pub fn get(&self, address: &str) -> Option<&SenderAccount> {
        self.monitored().find(|a| a.address == address)
    }

    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        self.get(address).is_some()
    }
}
