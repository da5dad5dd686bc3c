use super::value_objects::OrderStatus;

// ============================================================================
// Order Commands - requested status changes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OrderCommand {
    Accept,
    Reject { reason: String },
    StartWork,
    MarkReadyToShip,
    Ship,
    Deliver,
    Cancel { reason: Option<String> },
}

impl OrderCommand {
    /// Command that moves an order into `target`; `None` for statuses no
    /// caller may request (only payment confirmation creates `pending`)
    pub fn for_target(target: OrderStatus, reason: Option<String>) -> Option<Self> {
        match target {
            OrderStatus::Pending => None,
            OrderStatus::Accepted => Some(OrderCommand::Accept),
            OrderStatus::Rejected => Some(OrderCommand::Reject {
                reason: reason.unwrap_or_default(),
            }),
            OrderStatus::InProgress => Some(OrderCommand::StartWork),
            OrderStatus::ReadyToShip => Some(OrderCommand::MarkReadyToShip),
            OrderStatus::Shipped => Some(OrderCommand::Ship),
            OrderStatus::Delivered => Some(OrderCommand::Deliver),
            OrderStatus::Cancelled => Some(OrderCommand::Cancel { reason }),
        }
    }

    pub fn target(&self) -> OrderStatus {
        match self {
            OrderCommand::Accept => OrderStatus::Accepted,
            OrderCommand::Reject { .. } => OrderStatus::Rejected,
            OrderCommand::StartWork => OrderStatus::InProgress,
            OrderCommand::MarkReadyToShip => OrderStatus::ReadyToShip,
            OrderCommand::Ship => OrderStatus::Shipped,
            OrderCommand::Deliver => OrderStatus::Delivered,
            OrderCommand::Cancel { .. } => OrderStatus::Cancelled,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::Accept => "accept",
            OrderCommand::Reject { .. } => "reject",
            OrderCommand::StartWork => "start_work",
            OrderCommand::MarkReadyToShip => "mark_ready_to_ship",
            OrderCommand::Ship => "ship",
            OrderCommand::Deliver => "deliver",
            OrderCommand::Cancel { .. } => "cancel",
        }
    }
}
