//! Typed errors for the dispatch layer.
//!
//! Only configuration problems are fatal. Send failures are scoped to a single
//! recipient and feed the health tracker instead of aborting a campaign.

use thiserror::Error;

use crate::account::Purpose;

/// Top-level dispatch error type.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The account catalog or limits are unusable.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// No sender account could be offered for a distribution.
    #[error("No email accounts available for sending")]
    NoAccountsAvailable,

    /// A distribution was requested for an empty recipient list.
    #[error("Recipient list is empty")]
    EmptyRecipients,

    /// The recipient list for a campaign could not be loaded.
    #[error("Recipient provider failed: {0}")]
    Provider(#[from] ProviderError),

    /// A single send exhausted every attempt.
    #[error("All {attempts} send attempts failed, last error: {last_error}")]
    SendFailed { attempts: u32, last_error: String },
}

impl DispatchError {
    /// Returns `true` for errors caused by configuration rather than runtime state.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Problems with the configured sender accounts or limits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No account carries the bulk purpose.
    #[error("bulk account tier is empty")]
    EmptyBulkTier,

    /// Fallback mode was switched on without a fallback account.
    #[error("fallback mode is enabled but no fallback account is configured")]
    MissingFallbackAccount,

    /// The same address is configured twice.
    #[error("duplicate sender account: {0}")]
    DuplicateAccount(String),

    /// A transactional purpose has more than one designated account.
    #[error("more than one account designated for purpose {0}")]
    DuplicatePurpose(Purpose),

    /// An account in the main catalog uses the fallback purpose.
    #[error("account {0} uses the fallback purpose outside the fallback section")]
    MisplacedFallback(String),

    /// A limit is out of range.
    #[error("invalid limit {field}: {reason}")]
    InvalidLimit { field: &'static str, reason: String },
}

/// Failure reported by a transport for one send attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, throttling or 4xx-style failure; the account may recover.
    #[error("Temporary failure: {0}")]
    Temporary(String),

    /// Rejection that will not succeed on retry (bad credentials, 5xx-style).
    #[error("Permanent failure: {0}")]
    Permanent(String),
}

impl TransportError {
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

/// Failure to produce a campaign's recipient list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("Recipient lookup failed: {0}")]
    Lookup(String),
}
