use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::pricing::round_to_minor_units;
use crate::errors::{MarketError, MarketResult};
use crate::health;
use crate::models::{CurrencyCode, Role};
use crate::notifications::NotificationError;
use crate::state::AppState;
use crate::web::identity::Identity;

// ============================================================================
// Storefront pricing
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    pub seller_price: BigDecimal,
    pub currency: Option<CurrencyCode>,
}

#[derive(Debug, Deserialize)]
pub struct RateQuery {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
}

/// Customer price for a seller price, optionally shown in another currency
pub async fn price_quote(state: web::Data<AppState>, query: web::Query<QuoteQuery>) -> MarketResult<HttpResponse> {
    if query.seller_price < BigDecimal::from(0) {
        return Err(MarketError::ValidationError("sellerPrice must not be negative".to_string()));
    }

    let quote = state.pricing.quote(&query.seller_price);
    let settlement = &state.config.settlement_currency;

    let display = match &query.currency {
        Some(currency) if currency != settlement => {
            let conversion = state.currency.convert(&quote.customer_price, settlement, currency).await;
            Some(json!({
                "currency": currency,
                "customerPrice": round_to_minor_units(&conversion.amount),
                "rate": conversion.rate,
                "rateSource": conversion.source,
            }))
        }
        _ => None,
    };

    Ok(HttpResponse::Ok().json(json!({
        "currency": settlement,
        "quote": quote,
        "display": display,
    })))
}

pub async fn exchange_rate(state: web::Data<AppState>, query: web::Query<RateQuery>) -> HttpResponse {
    let quote = state.currency.rate_with_source(&query.from, &query.to).await;
    HttpResponse::Ok().json(json!({
        "from": query.from,
        "to": query.to,
        "rate": quote.rate,
        "source": quote.source,
    }))
}

// ============================================================================
// Service status
// ============================================================================

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let report = health::check(&state).await;
    if report.overall_status.is_unhealthy() {
        HttpResponse::ServiceUnavailable().json(report)
    } else {
        HttpResponse::Ok().json(report)
    }
}

pub async fn metrics(state: web::Data<AppState>) -> MarketResult<HttpResponse> {
    if !state.config.metrics_enabled {
        return Err(MarketError::NotFound("Metrics".to_string()));
    }
    let body = state
        .metrics
        .render()
        .map_err(|e| MarketError::UpstreamUnavailable(format!("metrics encoding failed: {}", e)))?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

// ============================================================================
// Notification dead letters (admin)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DeadLetterQuery {
    pub limit: Option<usize>,
}

fn require_admin(identity: &Identity) -> MarketResult<()> {
    if identity.actor().role != Role::Admin {
        return Err(MarketError::Forbidden("admin only".to_string()));
    }
    Ok(())
}

pub async fn list_dead_letters(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<DeadLetterQuery>,
) -> MarketResult<HttpResponse> {
    require_admin(&identity)?;
    let dlq = state.dispatcher.dead_letters();
    Ok(HttpResponse::Ok().json(json!({
        "stats": dlq.stats(),
        "messages": dlq.list(query.limit.unwrap_or(100)),
    })))
}

pub async fn redeliver_dead_letter(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> MarketResult<HttpResponse> {
    require_admin(&identity)?;
    let receipt = state
        .dispatcher
        .redeliver(path.into_inner())
        .await
        .map_err(|e| match e {
            NotificationError::UnknownDeadLetter(id) => MarketError::NotFound(format!("Dead letter {}", id)),
            NotificationError::MissingContactInfo { recipient } => MarketError::MissingContactInfo(recipient.to_string()),
            other => MarketError::UpstreamUnavailable(other.to_string()),
        })?;
    Ok(HttpResponse::Ok().json(receipt))
}
