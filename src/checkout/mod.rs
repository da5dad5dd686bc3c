pub mod gateway;
pub mod initiator;
pub mod metadata;

pub use gateway::{CheckoutSession, GatewayError, LineItem, PaymentGateway, SandboxPaymentGateway, SessionRequest};
pub use initiator::{CheckoutInitiator, CheckoutRedirect, CheckoutRequest, CheckoutSettings, SinglePurchase};
pub use metadata::{CheckoutMetadata, ItemSnapshot};
