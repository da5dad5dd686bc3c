use super::value_objects::OrderStatus;
use crate::models::Role;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("A {role:?} may not {action} this order")]
    Forbidden { role: Role, action: &'static str },

    #[error("Order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("A rejection reason is required")]
    MissingRejectionReason,

    #[error("Order items cannot be empty")]
    EmptyItems,

    #[error("Order total cannot be negative")]
    NegativeTotal,
}
