use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::order::{OrderStatus, TransitionOutcome};
use crate::errors::{MarketError, MarketResult};
use crate::models::Role;
use crate::notifications::{DeliveryReceipt, NotificationError};
use crate::state::AppState;
use crate::web::identity::Identity;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionBody {
    pub new_status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    pub customer_id: Option<Uuid>,
    pub tailor_id: Option<Uuid>,
}

pub async fn get_order(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> MarketResult<HttpResponse> {
    let order = state.orders.get_order(path.into_inner(), identity.actor()).await?;
    Ok(HttpResponse::Ok().json(order))
}

/// Customers and tailors see their own orders; admins pick a side
pub async fn list_orders(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<OrderListQuery>,
) -> MarketResult<HttpResponse> {
    let orders = match (identity.actor().role, query.customer_id, query.tailor_id) {
        (Role::Admin, Some(customer_id), _) => state.orders.list_for_customer(customer_id).await?,
        (Role::Admin, None, Some(tailor_id)) => state.orders.list_for_tailor(tailor_id).await?,
        _ => state.orders.list_for_actor(identity.actor()).await?,
    };
    Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

#[instrument(
    name = "handler::transition_order",
    skip(state, identity, body),
    fields(user_id = %identity.user_id(), order_id = %path, new_status = %body.new_status)
)]
pub async fn transition_order(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<TransitionBody>,
) -> MarketResult<HttpResponse> {
    let body = body.into_inner();
    let new_status: OrderStatus = body.new_status.parse().map_err(MarketError::ValidationError)?;

    let outcome = state
        .orders
        .transition(path.into_inner(), identity.actor(), new_status, body.reason)
        .await?;

    Ok(HttpResponse::Ok().json(transition_body(&outcome)))
}

fn transition_body(outcome: &TransitionOutcome) -> serde_json::Value {
    json!({
        "order": outcome.order,
        "notifications": {
            "customer": delivery_status(&outcome.notifications.customer),
            "tailor": outcome.notifications.tailor.as_ref().map(delivery_status),
        },
    })
}

fn delivery_status(result: &Result<DeliveryReceipt, NotificationError>) -> serde_json::Value {
    match result {
        Ok(receipt) => json!({ "delivered": true, "attempts": receipt.attempts }),
        Err(e) => json!({ "delivered": false, "error": e.to_string() }),
    }
}
