//! Dispatch metrics
//!
//! Tracks the send path:
//! - Send attempts by sender account and outcome
//! - Transport call durations
//! - Campaign outcomes (sent / failed / pending recipients)

use std::sync::atomic::{AtomicU64, Ordering};

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

use crate::MetricsError;

/// Dispatch metrics collector
#[derive(Debug)]
pub struct DispatchMetrics {
    /// Total number of send attempts by account and outcome
    attempts_total: Counter<u64>,

    /// Distribution of transport call durations
    send_duration_seconds: Histogram<f64>,

    /// Total number of campaign runs
    campaigns_total: Counter<u64>,

    /// Campaign recipients by final status
    campaign_recipients: Counter<u64>,

    sent_count: AtomicU64,
    failed_count: AtomicU64,
}

impl DispatchMetrics {
    /// Create a new dispatch metrics collector
    ///
    /// # Errors
    ///
    /// Returns an error if metric instruments cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let meter = meter();

        let attempts_total = meter
            .u64_counter("mailpool.dispatch.attempts.total")
            .with_description("Total number of send attempts by account and outcome")
            .build();

        let send_duration_seconds = meter
            .f64_histogram("mailpool.dispatch.send.duration.seconds")
            .with_description("Distribution of transport call durations")
            .build();

        let campaigns_total = meter
            .u64_counter("mailpool.dispatch.campaigns.total")
            .with_description("Total number of campaign dispatch runs")
            .build();

        let campaign_recipients = meter
            .u64_counter("mailpool.dispatch.campaign.recipients.total")
            .with_description("Campaign recipients by final status")
            .build();

        Ok(Self {
            attempts_total,
            send_duration_seconds,
            campaigns_total,
            campaign_recipients,
            sent_count: AtomicU64::new(0),
            failed_count: AtomicU64::new(0),
        })
    }

    /// Record one transport attempt
    pub fn record_attempt(&self, account: &str, success: bool, duration_secs: f64) {
        let outcome = if success { "sent" } else { "failed" };
        let attributes = [
            KeyValue::new("account", account.to_string()),
            KeyValue::new("outcome", outcome),
        ];
        self.attempts_total.add(1, &attributes);
        self.send_duration_seconds
            .record(duration_secs, &[KeyValue::new("outcome", outcome)]);

        if success {
            self.sent_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record the summary of a finished campaign run
    pub fn record_campaign(&self, sent: u64, failed: u64, pending: u64) {
        self.campaigns_total.add(1, &[]);
        self.campaign_recipients
            .add(sent, &[KeyValue::new("status", "sent")]);
        self.campaign_recipients
            .add(failed, &[KeyValue::new("status", "failed")]);
        self.campaign_recipients
            .add(pending, &[KeyValue::new("status", "pending")]);
    }

    /// Successful attempts recorded by this collector
    #[must_use]
    pub fn sent_count(&self) -> u64 {
        self.sent_count.load(Ordering::Relaxed)
    }

    /// Failed attempts recorded by this collector
    #[must_use]
    pub fn failed_count(&self) -> u64 {
        self.failed_count.load(Ordering::Relaxed)
    }
}

fn meter() -> Meter {
    opentelemetry::global::meter("mailpool.dispatch")
}
