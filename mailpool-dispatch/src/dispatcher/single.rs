use std::time::Instant;

use mailpool_common::{internal, outgoing};
use serde::Serialize;

use super::{Dispatcher, record_send_metrics};
use crate::{
    account::Purpose,
    error::DispatchError,
    transport::{DeliveryReceipt, OutboundMessage, TransportSender},
};

/// Outcome of a successful single send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub receipt: DeliveryReceipt,
    pub sender: String,
    pub attempts: u32,
}

impl<T> Dispatcher<T>
where
    T: TransportSender + ?Sized + 'static,
{
    /// Send one transactional message with failover.
    ///
    /// Each attempt selects an account for the current purpose; after the
    /// first failure the purpose switches to bulk. Attempts on an account
    /// that cannot send are skipped but still count.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::SendFailed`] once every attempt is used up, or
    /// a configuration error if selection is impossible.
    pub async fn send_one(
        &self,
        purpose: Purpose,
        message: &OutboundMessage,
    ) -> Result<SendReport, DispatchError> {
        let attempts = self.pool.limits().send_attempts;
        let mut current = purpose;
        let mut last_error = String::from("no account could send");

        for attempt in 1..=attempts {
            let account = self.pool.select_for_purpose(current)?;

            if !self.pool.can_send(&account.address) {
                internal!(
                    level = DEBUG,
                    attempt,
                    account = %account.address,
                    "Account cannot send, trying next account"
                );
                continue;
            }

            let started = Instant::now();
            let result = self.transport.send(&account, message).await;
            self.pool
                .record_attempt(&account.address, result.is_ok(), result.as_ref().err());
            record_send_metrics(&account.address, result.is_ok(), started);

            match result {
                Ok(receipt) => {
                    outgoing!(
                        level = INFO,
                        attempt,
                        from = %account.address,
                        to = %message.to,
                        message_id = %receipt.message_id,
                        "Sent"
                    );
                    return Ok(SendReport {
                        receipt,
                        sender: account.address,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    outgoing!(
                        level = WARN,
                        attempt,
                        from = %account.address,
                        to = %message.to,
                        error = %e,
                        "Send attempt failed"
                    );
                    last_error = e.to_string();

                    if attempt == 1 && current != Purpose::Bulk {
                        current = Purpose::Bulk;
                    }
                }
            }
        }

        internal!(
            level = ERROR,
            attempts,
            to = %message.to,
            error = %last_error,
            "All send attempts failed"
        );

        Err(DispatchError::SendFailed {
            attempts,
            last_error,
        })
    }
}
