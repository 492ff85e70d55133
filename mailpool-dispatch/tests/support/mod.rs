//! Test doubles for dispatch integration tests
//!
//! - [`ScriptedTransport`]: succeeds unless the sending account is marked as failing
//! - [`StaticRecipients`]: recipient lists keyed by campaign id
#![allow(dead_code)] // Not every helper is used by every test binary

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use mailpool_dispatch::{
    AccountPool, DeliveryReceipt, FallbackConfig, LimitsConfig, OutboundMessage, PoolConfig,
    ProviderError, Purpose, RecipientProvider, SenderAccount, TransportError, TransportSender,
    time::Clock,
};

/// Transport whose failures are scripted per sender account.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    sends: Mutex<Vec<(String, String)>>,
    counter: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each send takes `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_account(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn heal_account(&self, address: &str) {
        self.failing.lock().unwrap().remove(address);
    }

    /// Every attempted `(sender, recipient)` pair, in call order.
    pub fn sends(&self) -> Vec<(String, String)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn sends_from(&self, address: &str) -> usize {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .filter(|(from, _)| from == address)
            .count()
    }
}

#[async_trait]
impl TransportSender for ScriptedTransport {
    async fn send(
        &self,
        account: &SenderAccount,
        message: &OutboundMessage,
    ) -> Result<DeliveryReceipt, TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.sends
            .lock()
            .unwrap()
            .push((account.address.clone(), message.to.clone()));

        if self.failing.lock().unwrap().contains(&account.address) {
            return Err(TransportError::Temporary(
                "421 4.7.0 Try again later".to_string(),
            ));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(DeliveryReceipt {
            message_id: format!("<{n}.{}>", account.address),
        })
    }
}

/// Recipient lists keyed by campaign id.
#[derive(Debug, Default)]
pub struct StaticRecipients {
    campaigns: HashMap<String, Vec<String>>,
}

impl StaticRecipients {
    pub fn with_campaign(mut self, id: &str, recipients: Vec<String>) -> Self {
        self.campaigns.insert(id.to_string(), recipients);
        self
    }
}

#[async_trait]
impl RecipientProvider for StaticRecipients {
    async fn list_recipients(&self, campaign_id: &str) -> Result<Vec<String>, ProviderError> {
        self.campaigns
            .get(campaign_id)
            .cloned()
            .ok_or_else(|| ProviderError::CampaignNotFound(campaign_id.to_string()))
    }
}

pub fn recipients(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("member{i}@example.com")).collect()
}

pub fn bulk_accounts(k: usize) -> Vec<SenderAccount> {
    (1..=k)
        .map(|i| SenderAccount::new(format!("no-reply{i}@example.org"), Purpose::Bulk, 1))
        .collect()
}

/// Four transactional accounts plus nine bulk accounts in three priority tiers.
pub fn church_catalog() -> Vec<SenderAccount> {
    let mut accounts = vec![
        SenderAccount::new("admin@example.org", Purpose::Admin, 1),
        SenderAccount::new("info@example.org", Purpose::Info, 1),
        SenderAccount::new("events@example.org", Purpose::Events, 1),
        SenderAccount::new("system@example.org", Purpose::System, 1),
    ];
    accounts.extend((1..=9u32).map(|i| {
        SenderAccount::new(
            format!("no-reply{i}@example.org"),
            Purpose::Bulk,
            (i - 1) / 3 + 1,
        )
        .with_credential(format!("NO_REPLY{i}_PASSWORD"))
    }));
    accounts
}

/// Limits without the inter-send pause.
pub fn fast_limits() -> LimitsConfig {
    LimitsConfig {
        delay_between_sends_ms: 0,
        ..LimitsConfig::default()
    }
}

pub fn pool(accounts: Vec<SenderAccount>, limits: LimitsConfig) -> Arc<AccountPool> {
    Arc::new(
        AccountPool::new(PoolConfig {
            accounts,
            fallback: FallbackConfig::default(),
            limits,
        })
        .expect("valid pool configuration"),
    )
}

pub fn pool_with_clock(
    accounts: Vec<SenderAccount>,
    limits: LimitsConfig,
    clock: Arc<dyn Clock>,
) -> Arc<AccountPool> {
    Arc::new(
        AccountPool::with_clock(
            PoolConfig {
                accounts,
                fallback: FallbackConfig::default(),
                limits,
            },
            clock,
        )
        .expect("valid pool configuration"),
    )
}

pub fn quarantine(pool: &AccountPool, address: &str) {
    let error = TransportError::Permanent("535 5.7.8 authentication failed".to_string());
    for _ in 0..pool.limits().max_consecutive_failures {
        pool.record_attempt(address, false, Some(&error));
    }
}
