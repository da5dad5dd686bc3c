use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::instrument;

use crate::errors::MarketResult;
use crate::payments::PaymentEventOutcome;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "Payment-Signature";

/// Processor callback. Any error response makes the processor redeliver,
/// except 400 which it treats as final.
#[instrument(name = "handler::payment_webhook", skip(state, req, body), fields(bytes = body.len()))]
pub async fn payment_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> MarketResult<HttpResponse> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.payments.handle(&body, signature).await?;

    let response = match &outcome {
        PaymentEventOutcome::OrderCreated { order, notifications } => json!({
            "received": true,
            "outcome": outcome.label(),
            "orderId": order.id,
            "notified": notifications.all_delivered(),
        }),
        PaymentEventOutcome::AlreadyProcessed { order_id } => json!({
            "received": true,
            "outcome": outcome.label(),
            "orderId": order_id,
        }),
        PaymentEventOutcome::Ignored { event_type } => json!({
            "received": true,
            "outcome": outcome.label(),
            "eventType": event_type,
        }),
    };

    Ok(HttpResponse::Ok().json(response))
}
