//! Seams to the outside world: the transport that delivers one message and
//! the provider that lists a campaign's recipients.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use mailpool_common::outgoing;
use serde::{Deserialize, Serialize};

use crate::{
    account::SenderAccount,
    error::{ProviderError, TransportError},
};

/// A message addressed to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Campaign content shared by every recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignMessage {
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl CampaignMessage {
    pub fn new(subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            html: html.into(),
            text: None,
        }
    }

    #[must_use]
    pub fn for_recipient(&self, to: &str) -> OutboundMessage {
        OutboundMessage {
            to: to.to_string(),
            subject: self.subject.clone(),
            html: self.html.clone(),
            text: self.text.clone(),
        }
    }
}

/// Returned by a transport for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

/// Delivers one message through one sender account.
#[async_trait]
pub trait TransportSender: Send + Sync {
    /// Attempt a single delivery.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] classifying the failure as temporary or
    /// permanent.
    async fn send(
        &self,
        account: &SenderAccount,
        message: &OutboundMessage,
    ) -> Result<DeliveryReceipt, TransportError>;
}

/// Produces the recipient addresses of a campaign.
#[async_trait]
pub trait RecipientProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the campaign is unknown or the lookup fails.
    async fn list_recipients(&self, campaign_id: &str) -> Result<Vec<String>, ProviderError>;
}

/// Transport for test mode: logs the send and always succeeds.
#[derive(Debug, Default)]
pub struct SimulatedTransport {
    sent: AtomicU64,
}

impl SimulatedTransport {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TransportSender for SimulatedTransport {
    async fn send(
        &self,
        account: &SenderAccount,
        message: &OutboundMessage,
    ) -> Result<DeliveryReceipt, TransportError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;

        outgoing!(
            level = INFO,
            from = %account.address,
            to = %message.to,
            subject = %message.subject,
            "Test mode: simulated send"
        );

        Ok(DeliveryReceipt {
            message_id: format!("test-{n}"),
        })
    }
}
