// ============================================================================
// Payments - turning processor events into orders
// ============================================================================

pub mod event;
pub mod handler;
pub mod signature;

pub use event::{CheckoutCompleted, CustomerContact, PaymentEvent};
pub use handler::{PaymentEventHandler, PaymentEventOutcome};
pub use signature::SignatureVerifier;
