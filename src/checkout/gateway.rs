use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use super::metadata::CheckoutMetadata;
use crate::models::CurrencyCode;

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Payment gateway rejected the session: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub design_id: Uuid,
    /// Charged amount in minor units
    pub amount: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub customer_email: Option<String>,
    pub line_items: Vec<LineItem>,
    pub currency: CurrencyCode,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: CheckoutMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// The payment processor's session API
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &SessionRequest) -> Result<CheckoutSession, GatewayError>;
}

/// Local stand-in for the processor. Sessions are remembered so a
/// completion event can be produced for them.
pub struct SandboxPaymentGateway {
    base_url: String,
    sessions: Mutex<HashMap<String, SessionRequest>>,
}

impl SandboxPaymentGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn session(&self, session_id: &str) -> Option<SessionRequest> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    /// The `checkout_completed` event the processor would send once the
    /// customer pays `session_id`
    pub fn completion_event(&self, session_id: &str) -> Option<serde_json::Value> {
        let session = self.session(session_id)?;
        let amount_total: i64 = session.line_items.iter().map(|item| item.amount * i64::from(item.quantity)).sum();

        Some(serde_json::json!({
            "type": "checkout_completed",
            "sessionId": session_id,
            "amountTotal": amount_total,
            "currency": session.currency,
            "customerContact": { "email": session.customer_email },
            "metadata": session.metadata,
        }))
    }
}

#[async_trait]
impl PaymentGateway for SandboxPaymentGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<CheckoutSession, GatewayError> {
        if request.line_items.is_empty() {
            return Err(GatewayError::Rejected("session has no line items".to_string()));
        }

        let id = format!("cs_{}", Uuid::now_v7().simple());
        let url = format!("{}/pay/{}", self.base_url.trim_end_matches('/'), id);

        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), request.clone());

        tracing::debug!(session_id = %id, "Sandbox checkout session created");
        Ok(CheckoutSession { id, url })
    }
}
