use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::*;
use super::value_objects::{OrderItem, OrderStatus};
use crate::models::{Actor, Role, ShippingAddress};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub customer_id: Uuid,
    pub tailor_id: Uuid,

    // Current State
    pub status: OrderStatus,
    pub total_amount: BigDecimal,
    pub currency: String,
    pub payment_reference: String,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,

    // Optional fields
    pub rejection_reason: Option<String>,
    pub estimated_completion: Option<DateTime<Utc>>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything a confirmed payment knows about the order it pays for
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub tailor_id: Uuid,
    pub total_amount: BigDecimal,
    pub currency: String,
    pub payment_reference: String,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
}

/// Clock and scheduling inputs for a transition
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext {
    pub now: DateTime<Utc>,
    /// Production plus shipping time, used when the order is accepted
    pub lead_time: Duration,
}

impl TransitionContext {
    pub fn now() -> Self {
        Self {
            now: Utc::now(),
            lead_time: Duration::zero(),
        }
    }

    pub fn with_lead_time(mut self, lead_time: Duration) -> Self {
        self.lead_time = lead_time;
        self
    }
}

impl Order {
    /// Materialize a paid order in `pending`
    pub fn place(new_order: NewOrder, now: DateTime<Utc>) -> Result<(Self, OrderEvent), OrderError> {
        if new_order.items.is_empty() {
            return Err(OrderError::EmptyItems);
        }
        if new_order.total_amount < BigDecimal::from(0) {
            return Err(OrderError::NegativeTotal);
        }

        let event = OrderEvent::Placed(OrderPlaced {
            total_amount: new_order.total_amount.clone(),
            currency: new_order.currency.clone(),
            item_count: new_order.items.len(),
            placed_at: now,
        });

        let order = Self {
            id: Uuid::now_v7(),
            customer_id: new_order.customer_id,
            tailor_id: new_order.tailor_id,
            status: OrderStatus::Pending,
            total_amount: new_order.total_amount,
            currency: new_order.currency,
            payment_reference: new_order.payment_reference,
            shipping_address: new_order.shipping_address,
            items: new_order.items,
            rejection_reason: None,
            estimated_completion: None,
            created_at: now,
            updated_at: now,
        };

        Ok((order, event))
    }

    /// Decide the event for `command`; the order itself is not touched
    pub fn handle_command(
        &self,
        actor: &Actor,
        command: &OrderCommand,
        ctx: &TransitionContext,
    ) -> Result<OrderEvent, OrderError> {
        self.authorize(actor, command)?;

        let target = command.target();
        if !self.status.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        let now = ctx.now;
        let event = match command {
            OrderCommand::Accept => OrderEvent::Accepted(OrderAccepted {
                estimated_completion: now + ctx.lead_time,
                accepted_at: now,
            }),
            OrderCommand::Reject { reason } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(OrderError::MissingRejectionReason);
                }
                OrderEvent::Rejected(OrderRejected {
                    reason: reason.to_string(),
                    rejected_at: now,
                })
            }
            OrderCommand::StartWork => OrderEvent::WorkStarted(OrderWorkStarted { started_at: now }),
            OrderCommand::MarkReadyToShip => OrderEvent::ReadyToShip(OrderReadyToShip { ready_at: now }),
            OrderCommand::Ship => OrderEvent::Shipped(OrderShipped { shipped_at: now }),
            OrderCommand::Deliver => OrderEvent::Delivered(OrderDelivered { delivered_at: now }),
            OrderCommand::Cancel { reason } => OrderEvent::Cancelled(OrderCancelled {
                reason: reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string),
                cancelled_by: actor.role,
                cancelled_at: now,
            }),
        };

        Ok(event)
    }

    pub fn apply_event(&mut self, event: &OrderEvent) {
        self.status = event.status();
        self.updated_at = event.occurred_at();

        match event {
            OrderEvent::Accepted(e) => {
                self.estimated_completion = Some(e.estimated_completion);
            }
            OrderEvent::Rejected(e) => {
                self.rejection_reason = Some(e.reason.clone());
            }
            OrderEvent::Placed(_)
            | OrderEvent::WorkStarted(_)
            | OrderEvent::ReadyToShip(_)
            | OrderEvent::Shipped(_)
            | OrderEvent::Delivered(_)
            | OrderEvent::Cancelled(_) => {}
        }
    }

    fn authorize(&self, actor: &Actor, command: &OrderCommand) -> Result<(), OrderError> {
        let is_owning_tailor = actor.role == Role::Tailor && actor.user_id == self.tailor_id;
        let is_owning_customer = actor.role == Role::Customer && actor.user_id == self.customer_id;
        let is_admin = actor.role == Role::Admin;

        let allowed = match command {
            OrderCommand::Accept
            | OrderCommand::Reject { .. }
            | OrderCommand::StartWork
            | OrderCommand::MarkReadyToShip => is_owning_tailor,
            OrderCommand::Ship => is_admin,
            OrderCommand::Deliver | OrderCommand::Cancel { .. } => is_admin || is_owning_customer,
        };

        if allowed {
            Ok(())
        } else {
            Err(OrderError::Forbidden {
                role: actor.role,
                action: command.name(),
            })
        }
    }

    /// Whether `actor` may read this order
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Customer => actor.user_id == self.customer_id,
            Role::Tailor => actor.user_id == self.tailor_id,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::str::FromStr;

    pub(crate) fn sample_address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Ada Obi".to_string(),
            line1: "12 Marina Road".to_string(),
            line2: None,
            city: "Lagos".to_string(),
            region: None,
            postal_code: "100001".to_string(),
            country: "NG".to_string(),
            phone: None,
        }
    }

    pub(crate) fn sample_new_order(customer_id: Uuid, tailor_id: Uuid, reference: &str) -> NewOrder {
        NewOrder {
            customer_id,
            tailor_id,
            total_amount: BigDecimal::from_str("130.00").unwrap(),
            currency: "USD".to_string(),
            payment_reference: reference.to_string(),
            shipping_address: sample_address(),
            items: vec![OrderItem {
                id: Uuid::now_v7(),
                design_id: Uuid::new_v4(),
                fabric_index: Some(1),
                color_index: None,
                price: BigDecimal::from(100),
                notes: None,
                measurement_ref: None,
                source_bag_item_id: None,
            }],
        }
    }

    fn pending_order() -> Order {
        let (order, _) = Order::place(
            sample_new_order(Uuid::new_v4(), Uuid::new_v4(), "cs_test"),
            Utc::now(),
        )
        .unwrap();
        order
    }

    fn advance(order: &mut Order, actor: &Actor, command: OrderCommand) {
        let event = order
            .handle_command(actor, &command, &TransitionContext::now())
            .unwrap();
        order.apply_event(&event);
    }

    #[test]
    fn test_place_order_starts_pending() {
        let order = pending_order();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.rejection_reason.is_none());
    }

    #[test]
    fn test_place_order_without_items_fails() {
        let mut new_order = sample_new_order(Uuid::new_v4(), Uuid::new_v4(), "cs_empty");
        new_order.items.clear();
        assert!(matches!(
            Order::place(new_order, Utc::now()),
            Err(OrderError::EmptyItems)
        ));
    }

    #[test]
    fn test_full_lifecycle() {
        let mut order = pending_order();
        let tailor = Actor::tailor(order.tailor_id);
        let admin = Actor::admin(Uuid::new_v4());
        let customer = Actor::customer(order.customer_id);

        advance(&mut order, &tailor, OrderCommand::Accept);
        advance(&mut order, &tailor, OrderCommand::StartWork);
        advance(&mut order, &tailor, OrderCommand::MarkReadyToShip);
        advance(&mut order, &admin, OrderCommand::Ship);
        advance(&mut order, &customer, OrderCommand::Deliver);

        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.estimated_completion.is_some());
    }

    #[test]
    fn test_accept_sets_estimated_completion() {
        let order = pending_order();
        let ctx = TransitionContext::now().with_lead_time(Duration::weeks(3));
        let event = order
            .handle_command(&Actor::tailor(order.tailor_id), &OrderCommand::Accept, &ctx)
            .unwrap();

        match event {
            OrderEvent::Accepted(e) => assert_eq!(e.estimated_completion, ctx.now + Duration::weeks(3)),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_tailor_cannot_ship() {
        let mut order = pending_order();
        order.status = OrderStatus::ReadyToShip;

        let result = order.handle_command(
            &Actor::tailor(order.tailor_id),
            &OrderCommand::Ship,
            &TransitionContext::now(),
        );
        assert!(matches!(result, Err(OrderError::Forbidden { role: Role::Tailor, .. })));
    }

    #[test]
    fn test_other_tailor_cannot_accept() {
        let order = pending_order();
        let result = order.handle_command(
            &Actor::tailor(Uuid::new_v4()),
            &OrderCommand::Accept,
            &TransitionContext::now(),
        );
        assert!(matches!(result, Err(OrderError::Forbidden { .. })));
    }

    #[test]
    fn test_reject_requires_reason() {
        let order = pending_order();
        let result = order.handle_command(
            &Actor::tailor(order.tailor_id),
            &OrderCommand::Reject { reason: "   ".to_string() },
            &TransitionContext::now(),
        );
        assert!(matches!(result, Err(OrderError::MissingRejectionReason)));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_reject_records_reason() {
        let mut order = pending_order();
        let tailor = Actor::tailor(order.tailor_id);
        advance(&mut order, &tailor, OrderCommand::Reject { reason: " Out of fabric ".to_string() });

        assert_eq!(order.status, OrderStatus::Rejected);
        assert_eq!(order.rejection_reason.as_deref(), Some("Out of fabric"));
    }

    #[test]
    fn test_cannot_cancel_after_acceptance() {
        let mut order = pending_order();
        let tailor = Actor::tailor(order.tailor_id);
        advance(&mut order, &tailor, OrderCommand::Accept);

        let result = order.handle_command(
            &Actor::customer(order.customer_id),
            &OrderCommand::Cancel { reason: None },
            &TransitionContext::now(),
        );
        assert!(matches!(
            result,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Accepted,
                to: OrderStatus::Cancelled
            })
        ));
    }

    #[test]
    fn test_visibility() {
        let order = pending_order();
        assert!(order.is_visible_to(&Actor::customer(order.customer_id)));
        assert!(order.is_visible_to(&Actor::tailor(order.tailor_id)));
        assert!(order.is_visible_to(&Actor::admin(Uuid::new_v4())));
        assert!(!order.is_visible_to(&Actor::customer(Uuid::new_v4())));
    }
}
