use std::{sync::Arc, time::Instant};

use mailpool_common::{internal, outgoing};
use tokio::task::JoinSet;

use super::{
    Dispatcher, DispatchSummary, OutcomeStatus, PendingReason, RecipientOutcome,
    record_send_metrics,
};
use crate::{
    cancel::CancelSignal,
    distributor::{DispatchPlan, PlanEntry},
    error::DispatchError,
    health::HealthTracker,
    rate_limiter::{CampaignBudget, RateLimiter},
    transport::{CampaignMessage, RecipientProvider, TransportSender},
};

/// Everything a worker needs, cloned per plan entry.
struct Worker<T: ?Sized> {
    tracker: Arc<HealthTracker>,
    limiter: RateLimiter,
    budget: Arc<CampaignBudget>,
    transport: Arc<T>,
    message: Arc<CampaignMessage>,
    cancel: CancelSignal,
    enforce_health: bool,
}

impl<T> Worker<T>
where
    T: TransportSender + ?Sized,
{
    async fn run(mut self, entry: PlanEntry) -> Vec<RecipientOutcome> {
        let PlanEntry {
            account,
            recipients,
            ..
        } = entry;
        let address = account.address.as_str();
        let mut outcomes = Vec::with_capacity(recipients.len());
        let mut remaining = recipients.into_iter();

        let mut first = true;
        while let Some(recipient) = remaining.next() {
            let stop = if !first && !self.limiter.pace(&mut self.cancel).await {
                Some(PendingReason::Cancelled)
            } else if self.cancel.is_cancelled() {
                Some(PendingReason::Cancelled)
            } else if self.enforce_health && !self.tracker.can_send(address) {
                Some(PendingReason::AccountUnavailable)
            } else if !self.budget.try_acquire() {
                Some(PendingReason::CampaignCapReached)
            } else {
                None
            };

            if let Some(reason) = stop {
                let left = std::iter::once(recipient).chain(remaining.by_ref());
                outcomes.extend(left.map(|recipient| RecipientOutcome {
                    recipient,
                    account: address.to_string(),
                    status: OutcomeStatus::Pending { reason },
                }));

                internal!(
                    level = WARN,
                    account = %address,
                    reason = ?reason,
                    "Stopped sending, remaining recipients left pending"
                );
                break;
            }
            first = false;

            let message = self.message.for_recipient(&recipient);
            let started = Instant::now();
            let result = self.transport.send(&account, &message).await;

            self.tracker
                .record_attempt(address, result.is_ok(), result.as_ref().err());
            record_send_metrics(address, result.is_ok(), started);

            let status = match result {
                Ok(receipt) => {
                    outgoing!(
                        level = DEBUG,
                        from = %address,
                        to = %recipient,
                        message_id = %receipt.message_id,
                        "Sent"
                    );
                    OutcomeStatus::Sent {
                        message_id: receipt.message_id,
                    }
                }
                Err(e) => {
                    outgoing!(level = WARN, from = %address, to = %recipient, error = %e, "Send failed");
                    OutcomeStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };

            outcomes.push(RecipientOutcome {
                recipient,
                account: address.to_string(),
                status,
            });
        }

        outcomes
    }
}

/// Outcomes for a chunk whose worker died before reporting.
fn abandoned(account: &str, recipients: Vec<String>) -> Vec<RecipientOutcome> {
    recipients
        .into_iter()
        .map(|recipient| RecipientOutcome {
            recipient,
            account: account.to_string(),
            status: OutcomeStatus::Failed {
                error: "dispatch worker panicked".to_string(),
            },
        })
        .collect()
}

impl<T> Dispatcher<T>
where
    T: TransportSender + ?Sized + 'static,
{
    /// Execute a plan, one task per entry.
    ///
    /// Outcomes are returned in plan order regardless of completion order.
    pub async fn dispatch(
        &self,
        plan: DispatchPlan,
        message: CampaignMessage,
        cancel: CancelSignal,
    ) -> DispatchSummary {
        let budget = Arc::new(self.pool.limiter().campaign_budget());
        let message = Arc::new(message);
        let enforce_health = plan.mode.enforces_health();

        // Recipients per entry, so a worker that dies still reports its chunk
        let assigned: Vec<(String, Vec<String>)> = plan
            .entries
            .iter()
            .map(|entry| (entry.account.address.clone(), entry.recipients.clone()))
            .collect();

        let mut workers = JoinSet::new();
        for (index, entry) in plan.entries.into_iter().enumerate() {
            let worker = Worker {
                tracker: Arc::clone(self.pool.tracker()),
                limiter: self.pool.limiter().clone(),
                budget: Arc::clone(&budget),
                transport: Arc::clone(&self.transport),
                message: Arc::clone(&message),
                cancel: cancel.clone(),
                enforce_health,
            };

            workers.spawn(async move { (index, worker.run(entry).await) });
        }

        let mut results: Vec<Option<Vec<RecipientOutcome>>> =
            std::iter::repeat_with(|| None).take(assigned.len()).collect();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, outcomes)) => results[index] = Some(outcomes),
                Err(e) => internal!(level = ERROR, error = %e, "Dispatch worker failed"),
            }
        }

        let outcomes = results
            .into_iter()
            .zip(assigned)
            .flat_map(|(result, (account, recipients))| {
                result.unwrap_or_else(|| abandoned(&account, recipients))
            })
            .collect();
        let summary = DispatchSummary::from_outcomes(outcomes, cancel.is_cancelled());

        if let Some(metrics) = mailpool_metrics::metrics() {
            metrics.dispatch.record_campaign(
                summary.sent as u64,
                summary.failed as u64,
                summary.pending as u64,
            );
        }

        if summary.failed > 0 || summary.pending > 0 {
            internal!(
                level = WARN,
                sent = summary.sent,
                failed = summary.failed,
                pending = summary.pending,
                cancelled = summary.cancelled,
                "Campaign finished with partial failure"
            );
        } else {
            internal!(level = INFO, sent = summary.sent, "Campaign finished");
        }

        summary
    }

    /// Load a campaign's recipients, plan and dispatch.
    ///
    /// A campaign with no recipients returns an empty summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the recipients cannot be loaded or the pool
    /// configuration is unusable.
    pub async fn dispatch_campaign<P>(
        &self,
        provider: &P,
        campaign_id: &str,
        message: CampaignMessage,
        cancel: CancelSignal,
    ) -> Result<DispatchSummary, DispatchError>
    where
        P: RecipientProvider + ?Sized,
    {
        let recipients = provider.list_recipients(campaign_id).await?;

        if recipients.is_empty() {
            internal!(level = INFO, campaign = %campaign_id, "Campaign has no recipients");
            return Ok(DispatchSummary::default());
        }

        internal!(
            level = INFO,
            campaign = %campaign_id,
            recipients = recipients.len(),
            "Dispatching campaign"
        );

        let plan = self.pool.distribute(&recipients)?;
        Ok(self.dispatch(plan, message, cancel).await)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::Mutex,
    };

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        account::{FallbackConfig, Purpose, SenderAccount},
        cancel::cancellation,
        config::{LimitsConfig, PoolConfig},
        error::TransportError,
        pool::AccountPool,
        transport::{DeliveryReceipt, OutboundMessage},
    };

    /// Fails every send to the listed recipients.
    #[derive(Default)]
    struct Rejecting {
        reject: HashSet<String>,
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl TransportSender for Rejecting {
        async fn send(
            &self,
            account: &SenderAccount,
            message: &OutboundMessage,
        ) -> Result<DeliveryReceipt, TransportError> {
            self.seen
                .lock()
                .unwrap()
                .push((account.address.clone(), message.to.clone()));

            if self.reject.contains(&message.to) {
                Err(TransportError::Permanent("550 mailbox unavailable".to_string()))
            } else {
                Ok(DeliveryReceipt {
                    message_id: format!("<{}>", message.to),
                })
            }
        }
    }

    fn pool(bulk: usize) -> Arc<AccountPool> {
        let accounts = (1..=bulk)
            .map(|i| SenderAccount::new(format!("no-reply{i}@example.org"), Purpose::Bulk, 1))
            .collect();
        Arc::new(
            AccountPool::new(PoolConfig {
                accounts,
                fallback: FallbackConfig::default(),
                limits: LimitsConfig {
                    delay_between_sends_ms: 0,
                    ..LimitsConfig::default()
                },
            })
            .unwrap(),
        )
    }

    fn recipients(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("member{i}@example.com")).collect()
    }

    #[tokio::test]
    async fn test_dispatch_all_sent_in_plan_order() {
        let pool = pool(3);
        let transport = Arc::new(Rejecting::default());
        let dispatcher = Dispatcher::new(Arc::clone(&pool), Arc::clone(&transport));

        let plan = pool.distribute(&recipients(13)).unwrap();
        let summary = dispatcher
            .dispatch(plan, CampaignMessage::new("Hi", "<p>Hi</p>"), CancelSignal::never())
            .await;

        assert_eq!((summary.sent, summary.failed, summary.pending, summary.total), (13, 0, 0, 13));
        let order: Vec<&str> = summary.outcomes.iter().map(|o| o.recipient.as_str()).collect();
        assert_eq!(order, recipients(13));
        assert_eq!(summary.outcomes[12].account, "no-reply3@example.org");
        assert_eq!(transport.seen.lock().unwrap().len(), 13);
    }

    #[tokio::test]
    async fn test_failures_are_counted_per_recipient() {
        let pool = pool(1);
        let transport = Arc::new(Rejecting {
            reject: ["member1@example.com".to_string()].into_iter().collect(),
            ..Rejecting::default()
        });
        let dispatcher = Dispatcher::new(Arc::clone(&pool), transport);

        let plan = pool.distribute(&recipients(4)).unwrap();
        let summary = dispatcher
            .dispatch(plan, CampaignMessage::new("Hi", "<p>Hi</p>"), CancelSignal::never())
            .await;

        assert_eq!((summary.sent, summary.failed, summary.pending), (3, 1, 0));
        assert_eq!(
            summary.outcomes[1].status,
            OutcomeStatus::Failed {
                error: "Permanent failure: 550 mailbox unavailable".to_string()
            }
        );

        let health = pool.get_health("no-reply1@example.org").unwrap();
        assert_eq!(health.total_sent, 3);
        assert_eq!(health.total_failed, 1);
    }

    #[tokio::test]
    async fn test_cancel_before_start_leaves_everything_pending() {
        let pool = pool(2);
        let dispatcher = Dispatcher::new(Arc::clone(&pool), Arc::new(Rejecting::default()));
        let (handle, signal) = cancellation();
        handle.cancel();

        let plan = pool.distribute(&recipients(6)).unwrap();
        let summary = dispatcher
            .dispatch(plan, CampaignMessage::new("Hi", "<p>Hi</p>"), signal)
            .await;

        assert!(summary.cancelled);
        assert_eq!((summary.sent, summary.pending), (0, 6));
        assert_eq!(summary.pending_recipients().count(), 6);
    }

    #[tokio::test]
    async fn test_campaign_budget_limits_attempts() {
        let accounts = (1..=2)
            .map(|i| SenderAccount::new(format!("no-reply{i}@example.org"), Purpose::Bulk, 1))
            .collect();
        let pool = Arc::new(
            AccountPool::new(PoolConfig {
                accounts,
                fallback: FallbackConfig::default(),
                limits: LimitsConfig {
                    delay_between_sends_ms: 0,
                    per_campaign_hourly: 5,
                    ..LimitsConfig::default()
                },
            })
            .unwrap(),
        );
        let dispatcher = Dispatcher::new(Arc::clone(&pool), Arc::new(Rejecting::default()));

        let plan = pool.distribute(&recipients(10)).unwrap();
        let summary = dispatcher
            .dispatch(plan, CampaignMessage::new("Hi", "<p>Hi</p>"), CancelSignal::never())
            .await;

        assert_eq!((summary.sent, summary.pending, summary.total), (5, 5, 10));
        assert!(summary.outcomes.iter().all(|o| match &o.status {
            OutcomeStatus::Pending { reason } => *reason == PendingReason::CampaignCapReached,
            _ => true,
        }));
    }

    /// Panics on every send from one account.
    struct Exploding {
        account: &'static str,
    }

    #[async_trait]
    impl TransportSender for Exploding {
        async fn send(
            &self,
            account: &SenderAccount,
            message: &OutboundMessage,
        ) -> Result<DeliveryReceipt, TransportError> {
            assert_ne!(account.address, self.account, "transport blew up");
            Ok(DeliveryReceipt {
                message_id: format!("<{}>", message.to),
            })
        }
    }

    #[tokio::test]
    async fn test_panicking_worker_reports_its_chunk_as_failed() {
        let pool = pool(3);
        let dispatcher = Dispatcher::new(
            Arc::clone(&pool),
            Arc::new(Exploding {
                account: "no-reply2@example.org",
            }),
        );

        let plan = pool.distribute(&recipients(9)).unwrap();
        let summary = dispatcher
            .dispatch(plan, CampaignMessage::new("Hi", "<p>Hi</p>"), CancelSignal::never())
            .await;

        assert_eq!((summary.sent, summary.failed, summary.pending, summary.total), (6, 3, 0, 9));
        let order: Vec<&str> = summary.outcomes.iter().map(|o| o.recipient.as_str()).collect();
        assert_eq!(order, recipients(9));
        assert!(summary.outcomes[3..6].iter().all(|o| {
            o.account == "no-reply2@example.org"
                && o.status
                    == OutcomeStatus::Failed {
                        error: "dispatch worker panicked".to_string(),
                    }
        }));
    }
}
