use serde::Deserialize;

use crate::checkout::CheckoutMetadata;
use crate::errors::{MarketError, MarketResult};

pub const CHECKOUT_COMPLETED: &str = "checkout_completed";

/// Contact details the processor collected at payment time
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCompleted {
    pub session_id: String,
    /// Amount actually charged, in minor units
    pub amount_total: i64,
    /// Charged currency; processors may omit it for the account default
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer_contact: Option<CustomerContact>,
    pub metadata: CheckoutMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEvent {
    CheckoutCompleted(Box<CheckoutCompleted>),
    /// Any event type that does not create orders
    Other { event_type: String },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
}

impl PaymentEvent {
    /// Parse a verified payload. Only `checkout_completed` bodies are held to
    /// the full schema.
    pub fn parse(payload: &[u8]) -> MarketResult<Self> {
        let envelope: Envelope = serde_json::from_slice(payload)
            .map_err(|e| MarketError::MalformedMetadata(format!("unreadable event: {}", e)))?;

        if envelope.event_type != CHECKOUT_COMPLETED {
            return Ok(PaymentEvent::Other {
                event_type: envelope.event_type,
            });
        }

        let completed: CheckoutCompleted = serde_json::from_slice(payload)
            .map_err(|e| MarketError::MalformedMetadata(e.to_string()))?;

        if completed.session_id.trim().is_empty() {
            return Err(MarketError::MalformedMetadata("empty sessionId".to_string()));
        }
        if completed.amount_total < 0 {
            return Err(MarketError::MalformedMetadata("negative amountTotal".to_string()));
        }
        completed.metadata.validate()?;

        Ok(PaymentEvent::CheckoutCompleted(Box::new(completed)))
    }

}
