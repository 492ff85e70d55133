//! Dispatch service
//!
//! Runs a [`DispatchPlan`] with one task per plan entry. Within an entry the
//! recipients are sent sequentially with the configured pause between sends.
//! A campaign never fails as a whole: every recipient ends up sent, failed
//! or pending, and the counts are returned in a [`DispatchSummary`].

mod campaign;
mod single;

use std::{sync::Arc, time::Instant};

use serde::Serialize;

pub use self::single::SendReport;
use crate::{pool::AccountPool, transport::TransportSender};

/// Why a recipient was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingReason {
    Cancelled,
    /// The account hit its hourly cap or was quarantined mid-chunk
    AccountUnavailable,
    CampaignCapReached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Sent { message_id: String },
    Failed { error: String },
    Pending { reason: PendingReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientOutcome {
    pub recipient: String,
    pub account: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

/// Result of one campaign run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
    pub pending: usize,
    pub total: usize,
    pub cancelled: bool,
    pub outcomes: Vec<RecipientOutcome>,
}

impl DispatchSummary {
    fn from_outcomes(outcomes: Vec<RecipientOutcome>, cancelled: bool) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            cancelled,
            ..Self::default()
        };

        for outcome in &outcomes {
            match outcome.status {
                OutcomeStatus::Sent { .. } => summary.sent += 1,
                OutcomeStatus::Failed { .. } => summary.failed += 1,
                OutcomeStatus::Pending { .. } => summary.pending += 1,
            }
        }

        summary.outcomes = outcomes;
        summary
    }

    /// Recipients that were not attempted, in plan order.
    pub fn pending_recipients(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Pending { .. }))
            .map(|o| o.recipient.as_str())
    }
}

/// Executes plans and single sends against a transport.
#[derive(Debug)]
pub struct Dispatcher<T: ?Sized> {
    pool: Arc<AccountPool>,
    transport: Arc<T>,
}

impl<T: ?Sized> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T> Dispatcher<T>
where
    T: TransportSender + ?Sized + 'static,
{
    #[must_use]
    pub const fn new(pool: Arc<AccountPool>, transport: Arc<T>) -> Self {
        Self { pool, transport }
    }

    #[must_use]
    pub const fn pool(&self) -> &Arc<AccountPool> {
        &self.pool
    }
}

fn record_send_metrics(account: &str, success: bool, started: Instant) {
    if let Some(metrics) = mailpool_metrics::metrics() {
        metrics
            .dispatch
            .record_attempt(account, success, started.elapsed().as_secs_f64());
    }
}
