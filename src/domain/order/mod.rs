// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderItem, OrderStatus and its transition table)
// - Events (OrderPlaced, OrderAccepted, etc.)
// - Commands (Accept, Reject, Ship, etc.)
// - Errors (OrderError enum)
// - Aggregate (Order with authorization and transition rules)
// - Command Handler (OrderCommandHandler: load, decide, compare-and-set, notify)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::{NewOrder, Order, TransitionContext};
pub use command_handler::*;
