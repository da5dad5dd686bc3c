use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::event::{CheckoutCompleted, CustomerContact, PaymentEvent};
use super::signature::SignatureVerifier;
use crate::domain::order::{NewOrder, Order, OrderEvent};
use crate::domain::pricing::from_minor_units;
use crate::errors::{MarketError, MarketResult};
use crate::metrics::Metrics;
use crate::models::{CurrencyCode, Profile};
use crate::notifications::{FanOutReport, NotificationDispatcher, NotificationType};
use crate::store::{profile_or_unknown, CreateOrderOutcome, OrderRepository, ProfileDirectory};
use crate::utils::{IsTransient, KeyedLocks};

// ============================================================================
// Payment Event Handler
// ============================================================================
//
// verify -> parse -> reconcile -> (per session) dedupe -> create -> notify
//
// Returning an error makes the processor redeliver the event. Signature
// failures are terminal; malformed payloads and persistence failures are
// retried and also escalated, because the customer has already paid.
//
// ============================================================================

#[derive(Debug, Clone)]
pub enum PaymentEventOutcome {
    OrderCreated {
        order: Order,
        notifications: FanOutReport,
    },
    AlreadyProcessed {
        order_id: Uuid,
    },
    Ignored {
        event_type: String,
    },
}

impl PaymentEventOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentEventOutcome::OrderCreated { .. } => "created",
            PaymentEventOutcome::AlreadyProcessed { .. } => "duplicate",
            PaymentEventOutcome::Ignored { .. } => "ignored",
        }
    }
}

pub struct PaymentEventHandler {
    verifier: SignatureVerifier,
    orders: Arc<dyn OrderRepository>,
    profiles: Arc<dyn ProfileDirectory>,
    dispatcher: Arc<NotificationDispatcher>,
    metrics: Arc<Metrics>,
    settlement_currency: CurrencyCode,
    sessions: KeyedLocks<String>,
}

impl PaymentEventHandler {
    pub fn new(
        verifier: SignatureVerifier,
        orders: Arc<dyn OrderRepository>,
        profiles: Arc<dyn ProfileDirectory>,
        dispatcher: Arc<NotificationDispatcher>,
        metrics: Arc<Metrics>,
        settlement_currency: CurrencyCode,
    ) -> Self {
        Self {
            verifier,
            orders,
            profiles,
            dispatcher,
            metrics,
            settlement_currency,
            sessions: KeyedLocks::new(),
        }
    }

    /// Process one delivery of a processor event
    pub async fn handle(&self, payload: &[u8], signature: Option<&str>) -> MarketResult<PaymentEventOutcome> {
        let result = self.process(payload, signature).await;

        match &result {
            Ok(outcome) => self.metrics.record_payment_event(outcome.label()),
            Err(e) => {
                self.metrics.record_payment_failure(e.kind());
                if e.is_transient() {
                    tracing::error!(
                        error = %e,
                        kind = e.kind(),
                        escalation = "operator",
                        "Payment event failed after payment; awaiting redelivery"
                    );
                } else {
                    tracing::warn!(error = %e, kind = e.kind(), "Payment event rejected");
                }
            }
        }

        result
    }

    async fn process(&self, payload: &[u8], signature: Option<&str>) -> MarketResult<PaymentEventOutcome> {
        self.verifier.verify(payload, signature, Utc::now())?;

        let completed = match PaymentEvent::parse(payload)? {
            PaymentEvent::CheckoutCompleted(completed) => completed,
            PaymentEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Ignoring payment event");
                return Ok(PaymentEventOutcome::Ignored { event_type });
            }
        };

        self.reconcile(&completed);

        let (order, placed) = {
            let _guard = self.sessions.acquire(&completed.session_id).await;

            if let Some(existing) = self.orders.find_by_payment_reference(&completed.session_id).await? {
                tracing::info!(
                    session_id = %completed.session_id,
                    order_id = %existing.id,
                    "Payment event already processed"
                );
                return Ok(PaymentEventOutcome::AlreadyProcessed { order_id: existing.id });
            }

            let (order, placed) = Order::place(self.new_order(&completed), Utc::now())?;

            match self
                .orders
                .create_order(&order, &completed.metadata.bag_item_ids)
                .await?
            {
                CreateOrderOutcome::Created => (order, placed),
                CreateOrderOutcome::Duplicate(existing) => {
                    tracing::info!(
                        session_id = %completed.session_id,
                        order_id = %existing.id,
                        "Order for payment created concurrently"
                    );
                    return Ok(PaymentEventOutcome::AlreadyProcessed { order_id: existing.id });
                }
            }
        };

        self.metrics.orders_created.inc();
        tracing::info!(
            order_id = %order.id,
            session_id = %order.payment_reference,
            customer_id = %order.customer_id,
            tailor_id = %order.tailor_id,
            total = %order.total_amount,
            items = order.items.len(),
            "Order created from payment"
        );

        let notifications = self
            .notify_placed(&order, &placed, completed.customer_contact.as_ref())
            .await;

        Ok(PaymentEventOutcome::OrderCreated { order, notifications })
    }

    /// The charged amount wins; a difference is only recorded
    fn reconcile(&self, completed: &CheckoutCompleted) {
        let expected = completed.metadata.expected_total;
        if completed.amount_total != expected {
            self.metrics.amount_mismatches.inc();
            tracing::warn!(
                session_id = %completed.session_id,
                charged = completed.amount_total,
                expected,
                "Charged amount differs from checkout total"
            );
        }
    }

    fn new_order(&self, completed: &CheckoutCompleted) -> NewOrder {
        let metadata = &completed.metadata;
        let currency = completed
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
            .or_else(|| metadata.currency.as_ref().map(|c| c.to_string()))
            .unwrap_or_else(|| self.settlement_currency.to_string());

        NewOrder {
            customer_id: metadata.customer_id,
            tailor_id: metadata.tailor_id,
            total_amount: from_minor_units(completed.amount_total),
            currency,
            payment_reference: completed.session_id.clone(),
            shipping_address: metadata.shipping_address.clone(),
            items: metadata.order_items(),
        }
    }

    async fn notify_placed(
        &self,
        order: &Order,
        placed: &OrderEvent,
        contact: Option<&CustomerContact>,
    ) -> FanOutReport {
        let mut customer = profile_or_unknown(self.profiles.as_ref(), order.customer_id).await;
        if customer.contact_email().is_none() {
            fill_from_contact(&mut customer, contact);
        }
        let tailor = profile_or_unknown(self.profiles.as_ref(), order.tailor_id).await;

        let report = self
            .dispatcher
            .notify_all(
                NotificationType::OrderPlaced,
                order,
                &customer,
                &tailor,
                placed.notification_payload(),
            )
            .await;

        if !report.all_delivered() {
            tracing::error!(
                order_id = %order.id,
                customer_error = ?report.customer.as_ref().err(),
                tailor_error = ?report.tailor.as_ref().err(),
                escalation = "operator",
                "Order placed but not every party was notified"
            );
        }
        report
    }
}

/// Use what the processor collected when the directory has no email
fn fill_from_contact(profile: &mut Profile, contact: Option<&CustomerContact>) {
    let Some(contact) = contact else {
        return;
    };
    if let Some(email) = contact.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        profile.email = Some(email.to_string());
    }
    if let Some(name) = contact.name.as_deref().filter(|n| !n.trim().is_empty()) {
        profile.display_name = name.to_string();
    }
}
