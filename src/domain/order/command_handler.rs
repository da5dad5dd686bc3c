use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use super::aggregate::{Order, TransitionContext};
use super::commands::OrderCommand;
use super::events::OrderEvent;
use super::value_objects::OrderStatus;
use crate::errors::{MarketError, MarketResult};
use crate::metrics::Metrics;
use crate::models::{Actor, Role};
use crate::notifications::{DeliveryReceipt, NotificationDispatcher, NotificationError, NotificationType};
use crate::store::{profile_or_unknown, DesignCatalog, OrderRepository, ProfileDirectory};

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: load Order -> decide event -> compare-and-set -> notify
//
// Notifications go out only after the new status is stored, and their
// failures are reported alongside the committed order, never as an error.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    /// Added to the design's completion time when an order is accepted
    pub shipping_buffer_weeks: u32,
    /// Used when the catalog does not know a design
    pub default_completion_weeks: u32,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            shipping_buffer_weeks: 1,
            default_completion_weeks: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionNotifications {
    pub customer: Result<DeliveryReceipt, NotificationError>,
    /// Present for transitions the tailor is also told about
    pub tailor: Option<Result<DeliveryReceipt, NotificationError>>,
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub order: Order,
    pub event: OrderEvent,
    pub notifications: TransitionNotifications,
}

pub struct OrderCommandHandler {
    orders: Arc<dyn OrderRepository>,
    designs: Arc<dyn DesignCatalog>,
    profiles: Arc<dyn ProfileDirectory>,
    dispatcher: Arc<NotificationDispatcher>,
    metrics: Arc<Metrics>,
    schedule: ScheduleSettings,
}

impl OrderCommandHandler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        designs: Arc<dyn DesignCatalog>,
        profiles: Arc<dyn ProfileDirectory>,
        dispatcher: Arc<NotificationDispatcher>,
        metrics: Arc<Metrics>,
        schedule: ScheduleSettings,
    ) -> Self {
        Self {
            orders,
            designs,
            profiles,
            dispatcher,
            metrics,
            schedule,
        }
    }

    /// Move an order to `new_status` on behalf of `actor`
    pub async fn transition(
        &self,
        order_id: Uuid,
        actor: &Actor,
        new_status: OrderStatus,
        reason: Option<String>,
    ) -> MarketResult<TransitionOutcome> {
        let order = self.load(order_id).await?;

        let command = OrderCommand::for_target(new_status, reason).ok_or(MarketError::InvalidTransition {
            from: order.status,
            to: new_status,
        })?;

        let mut ctx = TransitionContext::now();
        if command == OrderCommand::Accept {
            ctx = ctx.with_lead_time(self.lead_time(&order).await?);
        }

        let event = order.handle_command(actor, &command, &ctx).map_err(|e| {
            tracing::warn!(
                order_id = %order.id,
                actor = %actor.user_id,
                role = actor.role.as_str(),
                command = command.name(),
                error = %e,
                "Order command refused"
            );
            MarketError::from(e)
        })?;

        let expected = order.status;
        let mut updated = order;
        updated.apply_event(&event);

        if !self.orders.update_status(&updated, expected).await? {
            // Lost the race; report against whatever status won
            let current = self.load(order_id).await?;
            tracing::warn!(
                order_id = %order_id,
                expected = %expected,
                current = %current.status,
                "Concurrent order transition detected"
            );
            return Err(MarketError::InvalidTransition {
                from: current.status,
                to: new_status,
            });
        }

        self.metrics.record_transition(new_status.as_str());
        tracing::info!(
            order_id = %updated.id,
            from = %expected,
            to = %new_status,
            actor = %actor.user_id,
            role = actor.role.as_str(),
            "Order transitioned"
        );

        let notifications = self.notify(&updated, &event).await;

        Ok(TransitionOutcome {
            order: updated,
            event,
            notifications,
        })
    }

    /// An order the actor is allowed to see
    pub async fn get_order(&self, order_id: Uuid, actor: &Actor) -> MarketResult<Order> {
        let order = self.load(order_id).await?;
        if !order.is_visible_to(actor) {
            return Err(MarketError::NotFound(format!("Order {}", order_id)));
        }
        Ok(order)
    }

    pub async fn list_for_customer(&self, customer_id: Uuid) -> MarketResult<Vec<Order>> {
        self.orders.list_for_customer(customer_id).await
    }

    pub async fn list_for_tailor(&self, tailor_id: Uuid) -> MarketResult<Vec<Order>> {
        self.orders.list_for_tailor(tailor_id).await
    }

    /// Orders of the actor's own side of the marketplace
    pub async fn list_for_actor(&self, actor: &Actor) -> MarketResult<Vec<Order>> {
        match actor.role {
            Role::Customer => self.list_for_customer(actor.user_id).await,
            Role::Tailor => self.list_for_tailor(actor.user_id).await,
            Role::Admin => Err(MarketError::Forbidden("admins list orders per customer or tailor".to_string())),
        }
    }

    async fn load(&self, order_id: Uuid) -> MarketResult<Order> {
        self.orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Order {}", order_id)))
    }

    /// Longest production time among the ordered designs plus shipping
    async fn lead_time(&self, order: &Order) -> MarketResult<Duration> {
        let mut weeks = 0;
        for item in &order.items {
            let design_weeks = self
                .designs
                .completion_weeks(item.design_id)
                .await?
                .unwrap_or(self.schedule.default_completion_weeks);
            weeks = weeks.max(design_weeks);
        }

        Ok(Duration::weeks(i64::from(weeks + self.schedule.shipping_buffer_weeks)))
    }

    async fn notify(&self, order: &Order, event: &OrderEvent) -> TransitionNotifications {
        let notification_type = NotificationType::for_status(event.status());
        let payload = event.notification_payload();
        let customer = profile_or_unknown(self.profiles.as_ref(), order.customer_id).await;

        if event.notifies_tailor() {
            let tailor = profile_or_unknown(self.profiles.as_ref(), order.tailor_id).await;
            let report = self
                .dispatcher
                .notify_all(notification_type, order, &customer, &tailor, payload)
                .await;
            return TransitionNotifications {
                customer: report.customer,
                tailor: Some(report.tailor),
            };
        }

        TransitionNotifications {
            customer: self
                .dispatcher
                .notify(notification_type, order, &customer, payload)
                .await,
            tailor: None,
        }
    }
}
