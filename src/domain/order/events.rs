use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::value_objects::OrderStatus;
use crate::models::Role;

// ============================================================================
// Order Events - facts produced by the state machine
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed(OrderPlaced),
    Accepted(OrderAccepted),
    Rejected(OrderRejected),
    WorkStarted(OrderWorkStarted),
    ReadyToShip(OrderReadyToShip),
    Shipped(OrderShipped),
    Delivered(OrderDelivered),
    Cancelled(OrderCancelled),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub total_amount: BigDecimal,
    pub currency: String,
    pub item_count: usize,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAccepted {
    pub estimated_completion: DateTime<Utc>,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRejected {
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWorkStarted {
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReadyToShip {
    pub ready_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderShipped {
    pub shipped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDelivered {
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub reason: Option<String>,
    pub cancelled_by: Role,
    pub cancelled_at: DateTime<Utc>,
}

impl OrderEvent {
    /// Status the order is in once this event is applied
    pub fn status(&self) -> OrderStatus {
        match self {
            OrderEvent::Placed(_) => OrderStatus::Pending,
            OrderEvent::Accepted(_) => OrderStatus::Accepted,
            OrderEvent::Rejected(_) => OrderStatus::Rejected,
            OrderEvent::WorkStarted(_) => OrderStatus::InProgress,
            OrderEvent::ReadyToShip(_) => OrderStatus::ReadyToShip,
            OrderEvent::Shipped(_) => OrderStatus::Shipped,
            OrderEvent::Delivered(_) => OrderStatus::Delivered,
            OrderEvent::Cancelled(_) => OrderStatus::Cancelled,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::Placed(e) => e.placed_at,
            OrderEvent::Accepted(e) => e.accepted_at,
            OrderEvent::Rejected(e) => e.rejected_at,
            OrderEvent::WorkStarted(e) => e.started_at,
            OrderEvent::ReadyToShip(e) => e.ready_at,
            OrderEvent::Shipped(e) => e.shipped_at,
            OrderEvent::Delivered(e) => e.delivered_at,
            OrderEvent::Cancelled(e) => e.cancelled_at,
        }
    }

    /// Whether the tailor receives an acknowledgement besides the customer
    pub fn notifies_tailor(&self) -> bool {
        matches!(
            self,
            OrderEvent::Placed(_) | OrderEvent::Cancelled(_) | OrderEvent::Delivered(_)
        )
    }

    /// Transition-specific data carried in the notification
    pub fn notification_payload(&self) -> serde_json::Value {
        let status = self.status().as_str();
        match self {
            OrderEvent::Placed(e) => json!({
                "status": status,
                "totalAmount": e.total_amount.to_string(),
                "currency": e.currency,
                "itemCount": e.item_count,
            }),
            OrderEvent::Accepted(e) => json!({
                "status": status,
                "estimatedCompletion": e.estimated_completion.to_rfc3339(),
            }),
            OrderEvent::Rejected(e) => json!({
                "status": status,
                "rejectionReason": e.reason,
            }),
            OrderEvent::Cancelled(e) => json!({
                "status": status,
                "cancellationReason": e.reason,
                "cancelledBy": e.cancelled_by.as_str(),
            }),
            OrderEvent::WorkStarted(_)
            | OrderEvent::ReadyToShip(_)
            | OrderEvent::Shipped(_)
            | OrderEvent::Delivered(_) => json!({ "status": status }),
        }
    }
}
