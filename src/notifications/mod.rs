// ============================================================================
// Notifications
// ============================================================================
//
// Order status messages to customers and tailors. One delivery channel,
// addressed by recipient email; failed deliveries land in the dead-letter
// queue for operators to redeliver.
//
// ============================================================================

pub mod channel;
pub mod dispatcher;
pub mod dlq;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::OrderStatus;

pub use channel::{ChannelError, LogChannel, NotificationChannel};
pub use dispatcher::{DeliveryReceipt, FanOutReport, NotificationDispatcher, NotificationError};
pub use dlq::{DeadLetter, DeadLetterQueue, DlqStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    OrderPlaced,
    OrderAccepted,
    OrderRejected,
    OrderInProgress,
    OrderReadyToShip,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
}

impl NotificationType {
    /// Message announcing that an order entered `status`
    pub fn for_status(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Pending => NotificationType::OrderPlaced,
            OrderStatus::Accepted => NotificationType::OrderAccepted,
            OrderStatus::Rejected => NotificationType::OrderRejected,
            OrderStatus::InProgress => NotificationType::OrderInProgress,
            OrderStatus::ReadyToShip => NotificationType::OrderReadyToShip,
            OrderStatus::Shipped => NotificationType::OrderShipped,
            OrderStatus::Delivered => NotificationType::OrderDelivered,
            OrderStatus::Cancelled => NotificationType::OrderCancelled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::OrderPlaced => "order_placed",
            NotificationType::OrderAccepted => "order_accepted",
            NotificationType::OrderRejected => "order_rejected",
            NotificationType::OrderInProgress => "order_in_progress",
            NotificationType::OrderReadyToShip => "order_ready_to_ship",
            NotificationType::OrderShipped => "order_shipped",
            NotificationType::OrderDelivered => "order_delivered",
            NotificationType::OrderCancelled => "order_cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientRole {
    Customer,
    Tailor,
}

/// Wire shape handed to the delivery channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub recipient_email: String,
    pub recipient_name: String,
    pub reference_id: Uuid,
    /// Set when customer and tailor share an address so each copy is distinguishable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_role: Option<RecipientRole>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub additional_data: serde_json::Value,
}
