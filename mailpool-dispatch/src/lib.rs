//! Sender-account pool for outbound campaign email
//!
//! This crate provides functionality to:
//! - Keep a validated catalog of sender accounts
//! - Track per-account health, hourly usage and quarantine
//! - Select accounts by purpose or round robin over the bulk tier
//! - Split campaign recipients across the usable accounts
//! - Restore quiescent accounts from a background monitor
//! - Run campaigns concurrently with pacing, caps and cancellation

mod account;
mod cancel;
mod config;
mod dispatcher;
mod distributor;
mod error;
mod health;
mod monitor;
mod pool;
mod rate_limiter;
mod report;
mod selector;
mod service;
pub mod time;
mod transport;

pub use account::{AccountRegistry, FallbackConfig, Purpose, SenderAccount};
pub use cancel::{CancelHandle, CancelSignal, cancellation};
pub use config::{LimitsConfig, PoolConfig};
pub use dispatcher::{
    DispatchSummary, Dispatcher, OutcomeStatus, PendingReason, RecipientOutcome, SendReport,
};
pub use distributor::{DispatchPlan, Distributor, PlanEntry};
pub use error::{ConfigError, DispatchError, ProviderError, TransportError};
pub use health::{AccountHealth, HealthTracker, RecoveryCheck, SendFailure};
pub use monitor::{HealthCheckSummary, HealthMonitor, MonitorHandle};
pub use pool::AccountPool;
pub use rate_limiter::{CampaignBudget, RateLimiter};
pub use report::{
    AccountDetail, AccountsSection, ErrorEntry, HealthReport, HealthStatus, Statistics,
    SystemHealth, health_score,
};
pub use selector::{AccountSelector, SelectionMode, UsablePool};
pub use service::PoolStatusService;
pub use transport::{
    CampaignMessage, DeliveryReceipt, OutboundMessage, RecipientProvider, SimulatedTransport,
    TransportSender,
};
