// ============================================================================
// Tailor Marketplace - order lifecycle and transaction engine
// ============================================================================
//
// Bag -> Checkout -> (payment processor) -> Payment Event -> Order workflow
//                                                          -> Notifications
//
// Pricing and currency conversion feed the amounts shown and charged.
//
// ============================================================================

pub mod checkout;
pub mod config;
pub mod currency;
pub mod domain;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod payments;
pub mod state;
pub mod store;
pub mod utils;
pub mod web;

pub use config::AppConfig;
pub use errors::{MarketError, MarketResult};
pub use state::AppState;
