use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::channel::{ChannelError, NotificationChannel};
use super::dlq::DeadLetterQueue;
use super::{NotificationMessage, NotificationType, RecipientRole};
use crate::domain::order::Order;
use crate::metrics::Metrics;
use crate::models::Profile;
use crate::utils::{
    retry_on_transient, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, IsTransient,
    RetryPolicy,
};

// ============================================================================
// Notification Dispatcher
// ============================================================================
//
// Each recipient is delivered independently: one failing address never
// blocks or undoes the other. Every send is bounded by a timeout and retried
// with backoff on transient failure. Exhausted sends go to the DLQ.
//
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotificationError {
    #[error("Recipient {recipient} has no contact email")]
    MissingContactInfo { recipient: Uuid },

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Delivery rejected: {0}")]
    Rejected(String),

    #[error("Delivery timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("Notification channel circuit is open")]
    CircuitOpen,

    #[error("No dead letter with id {0}")]
    UnknownDeadLetter(Uuid),
}

impl IsTransient for NotificationError {
    fn is_transient(&self) -> bool {
        matches!(self, NotificationError::Delivery(_) | NotificationError::TimedOut(_))
    }
}

impl From<CircuitBreakerError<ChannelError>> for NotificationError {
    fn from(err: CircuitBreakerError<ChannelError>) -> Self {
        match err {
            CircuitBreakerError::CircuitOpen => NotificationError::CircuitOpen,
            CircuitBreakerError::TimedOut(after) => NotificationError::TimedOut(after),
            CircuitBreakerError::OperationFailed(ChannelError::Transient(e)) => NotificationError::Delivery(e),
            CircuitBreakerError::OperationFailed(ChannelError::Rejected(e)) => NotificationError::Rejected(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub notification_type: NotificationType,
    pub recipient_email: String,
    pub attempts: u32,
    pub delivered_at: DateTime<Utc>,
}

/// Per-recipient outcome of a two-party dispatch
#[derive(Debug, Clone)]
pub struct FanOutReport {
    pub customer: Result<DeliveryReceipt, NotificationError>,
    pub tailor: Result<DeliveryReceipt, NotificationError>,
}

impl FanOutReport {
    pub fn all_delivered(&self) -> bool {
        self.customer.is_ok() && self.tailor.is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub send_timeout: Duration,
    pub retry_policy: RetryPolicy,
    /// Pause between the two sends when customer and tailor share an address
    pub same_recipient_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(10),
            retry_policy: RetryPolicy::default(),
            same_recipient_delay: Duration::from_millis(500),
        }
    }
}

pub struct NotificationDispatcher {
    channel: Arc<dyn NotificationChannel>,
    breaker: CircuitBreaker,
    dlq: Arc<DeadLetterQueue>,
    config: DispatcherConfig,
    metrics: Arc<Metrics>,
}

impl NotificationDispatcher {
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        dlq: Arc<DeadLetterQueue>,
        config: DispatcherConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            channel,
            breaker: CircuitBreaker::new("notification_channel", CircuitBreakerConfig::default()),
            dlq,
            config,
            metrics,
        }
    }

    pub fn dead_letters(&self) -> &DeadLetterQueue {
        &self.dlq
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Deliver one message about `order` to one recipient
    pub async fn notify(
        &self,
        notification_type: NotificationType,
        order: &Order,
        recipient: &Profile,
        extra: serde_json::Value,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let message = self.build_message(notification_type, order, recipient, None, extra)?;
        self.deliver(message).await
    }

    /// Deliver to customer and tailor independently
    pub async fn notify_all(
        &self,
        notification_type: NotificationType,
        order: &Order,
        customer: &Profile,
        tailor: &Profile,
        extra: serde_json::Value,
    ) -> FanOutReport {
        let shared_address = match (customer.contact_email(), tailor.contact_email()) {
            (Some(c), Some(t)) => c.eq_ignore_ascii_case(t),
            _ => false,
        };

        if shared_address {
            tracing::debug!(
                order_id = %order.id,
                notification_type = notification_type.as_str(),
                "Customer and tailor share an address, sending marked copies"
            );

            let customer_result = self
                .send_marked(notification_type, order, customer, RecipientRole::Customer, extra.clone())
                .await;
            tokio::time::sleep(self.config.same_recipient_delay).await;
            let tailor_result = self
                .send_marked(notification_type, order, tailor, RecipientRole::Tailor, extra)
                .await;

            return FanOutReport {
                customer: customer_result,
                tailor: tailor_result,
            };
        }

        let (customer_result, tailor_result) = tokio::join!(
            self.notify(notification_type, order, customer, extra.clone()),
            self.notify(notification_type, order, tailor, extra),
        );

        FanOutReport {
            customer: customer_result,
            tailor: tailor_result,
        }
    }

    /// Retry a dead-lettered notification
    pub async fn redeliver(&self, dead_letter_id: Uuid) -> Result<DeliveryReceipt, NotificationError> {
        let letter = self
            .dlq
            .take(dead_letter_id)
            .ok_or(NotificationError::UnknownDeadLetter(dead_letter_id))?;

        match self.send_with_retry(&letter.message).await {
            Ok(attempts) => {
                tracing::info!(
                    dead_letter_id = %dead_letter_id,
                    reference_id = %letter.message.reference_id,
                    "Dead-lettered notification redelivered"
                );
                self.metrics.dlq_size.set(self.dlq.len() as i64);
                Ok(receipt(&letter.message, attempts))
            }
            Err(e) => {
                self.dlq.restore(letter, &e.to_string());
                Err(e)
            }
        }
    }

    async fn send_marked(
        &self,
        notification_type: NotificationType,
        order: &Order,
        recipient: &Profile,
        role: RecipientRole,
        extra: serde_json::Value,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let message = self.build_message(notification_type, order, recipient, Some(role), extra)?;
        self.deliver(message).await
    }

    fn build_message(
        &self,
        notification_type: NotificationType,
        order: &Order,
        recipient: &Profile,
        role: Option<RecipientRole>,
        extra: serde_json::Value,
    ) -> Result<NotificationMessage, NotificationError> {
        let Some(email) = recipient.contact_email() else {
            tracing::warn!(
                order_id = %order.id,
                recipient = %recipient.user_id,
                notification_type = notification_type.as_str(),
                escalation = "operator",
                "Recipient has no contact email, notification skipped"
            );
            self.metrics.record_notification(notification_type.as_str(), false, 0.0);
            return Err(NotificationError::MissingContactInfo {
                recipient: recipient.user_id,
            });
        };

        Ok(NotificationMessage {
            notification_type,
            recipient_email: email.to_string(),
            recipient_name: recipient.display_name.clone(),
            reference_id: order.id,
            recipient_role: role,
            additional_data: extra,
        })
    }

    async fn deliver(&self, message: NotificationMessage) -> Result<DeliveryReceipt, NotificationError> {
        let started = Instant::now();
        let result = self.send_with_retry(&message).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(attempts) => {
                self.metrics
                    .record_notification(message.notification_type.as_str(), true, elapsed);
                Ok(receipt(&message, attempts))
            }
            Err(e) => {
                self.metrics
                    .record_notification(message.notification_type.as_str(), false, elapsed);
                tracing::error!(
                    reference_id = %message.reference_id,
                    recipient = %message.recipient_email,
                    notification_type = message.notification_type.as_str(),
                    error = %e,
                    escalation = "operator",
                    "Notification delivery failed"
                );
                self.dlq.push(message, &e.to_string());
                self.metrics.record_dlq_message(self.dlq.len());
                Err(e)
            }
        }
    }

    /// Number of attempts it took on success
    async fn send_with_retry(&self, message: &NotificationMessage) -> Result<u32, NotificationError> {
        let mut attempts = 0;

        let result = retry_on_transient("notification_delivery", &self.config.retry_policy, |attempt| {
            attempts = attempt;
            if attempt > 1 {
                self.metrics.record_retry_attempt("notification_delivery");
            }
            async move {
                self.breaker
                    .call(self.config.send_timeout, self.channel.send(message))
                    .await
                    .map_err(NotificationError::from)
            }
        })
        .await
        .into_result();

        self.metrics
            .update_circuit_breaker_state(self.breaker.name(), self.breaker.get_state().await);

        result.map(|()| attempts)
    }
}

fn receipt(message: &NotificationMessage, attempts: u32) -> DeliveryReceipt {
    DeliveryReceipt {
        notification_type: message.notification_type,
        recipient_email: message.recipient_email.clone(),
        attempts,
        delivered_at: Utc::now(),
    }
}
