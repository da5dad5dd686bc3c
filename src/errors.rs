use crate::domain::order::{OrderError, OrderStatus};
use crate::utils::IsTransient;

// ============================================================================
// Marketplace Error Taxonomy
// ============================================================================
//
// One error type crosses every component boundary. Transient variants tell
// the payment processor to redeliver; everything else is terminal.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Cannot start checkout: {0}")]
    InvalidCheckoutState(String),

    #[error("Payment event rejected: {0}")]
    InvalidSignature(String),

    #[error("Malformed checkout metadata: {0}")]
    MalformedMetadata(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("No contact information for {0}")]
    MissingContactInfo(String),

    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),
}

pub type MarketResult<T> = Result<T, MarketError>;

impl MarketError {
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        MarketError::PersistenceFailure(err.to_string())
    }

    /// Stable machine-readable name, used in logs, metrics and HTTP bodies
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::Unauthenticated => "unauthenticated",
            MarketError::NotFound(_) => "not_found",
            MarketError::ValidationError(_) => "validation_error",
            MarketError::InvalidCheckoutState(_) => "invalid_checkout_state",
            MarketError::InvalidSignature(_) => "invalid_signature",
            MarketError::MalformedMetadata(_) => "malformed_metadata",
            MarketError::PersistenceFailure(_) => "persistence_failure",
            MarketError::Forbidden(_) => "forbidden",
            MarketError::InvalidTransition { .. } => "invalid_transition",
            MarketError::MissingContactInfo(_) => "missing_contact_info",
            MarketError::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }
}

impl IsTransient for MarketError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            MarketError::MalformedMetadata(_)
                | MarketError::PersistenceFailure(_)
                | MarketError::UpstreamUnavailable(_)
        )
    }
}

impl From<OrderError> for MarketError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Forbidden { .. } => MarketError::Forbidden(err.to_string()),
            OrderError::InvalidTransition { from, to } => MarketError::InvalidTransition { from, to },
            OrderError::MissingRejectionReason => MarketError::ValidationError(err.to_string()),
            OrderError::EmptyItems | OrderError::NegativeTotal => {
                MarketError::MalformedMetadata(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_only_post_payment_failures_are_transient() {
        assert!(MarketError::MalformedMetadata("x".into()).is_transient());
        assert!(MarketError::PersistenceFailure("x".into()).is_transient());
        assert!(!MarketError::InvalidSignature("x".into()).is_transient());
        assert!(!MarketError::ValidationError("x".into()).is_transient());
        assert!(!MarketError::Forbidden("x".into()).is_transient());
    }

    #[test]
    fn test_order_errors_map_onto_taxonomy() {
        let forbidden: MarketError = OrderError::Forbidden {
            role: Role::Tailor,
            action: "ship",
        }
        .into();
        assert!(matches!(forbidden, MarketError::Forbidden(_)));

        let invalid: MarketError = OrderError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Pending,
        }
        .into();
        assert!(matches!(
            invalid,
            MarketError::InvalidTransition { from: OrderStatus::Shipped, to: OrderStatus::Pending }
        ));

        let missing: MarketError = OrderError::MissingRejectionReason.into();
        assert_eq!(missing.kind(), "validation_error");
    }
}
