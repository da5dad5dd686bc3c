use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::bag::NewBagItem;
use crate::errors::{MarketError, MarketResult};
use crate::state::AppState;
use crate::web::identity::Identity;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BagQuery {
    pub tailor_id: Option<Uuid>,
}

/// Open bags of the caller, optionally only the one for `tailorId`
#[instrument(name = "handler::get_bag", skip(state, identity), fields(user_id = %identity.user_id()))]
pub async fn get_bag(
    state: web::Data<AppState>,
    identity: Identity,
    query: web::Query<BagQuery>,
) -> MarketResult<HttpResponse> {
    let bags = match query.tailor_id {
        Some(tailor_id) => state
            .bags
            .get_for_tailor(identity.user_id(), tailor_id)
            .await?
            .into_iter()
            .collect(),
        None => state.bags.get(identity.user_id()).await?,
    };

    if bags.is_empty() {
        return Err(MarketError::NotFound("Bag".to_string()));
    }
    Ok(HttpResponse::Ok().json(json!({ "bags": bags })))
}

#[instrument(
    name = "handler::add_bag_item",
    skip(state, identity, body),
    fields(user_id = %identity.user_id(), design_id = %body.design_id)
)]
pub async fn add_item(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<NewBagItem>,
) -> MarketResult<HttpResponse> {
    let item = state.bags.add_item(Some(identity.user_id()), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(item))
}

pub async fn remove_item(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> MarketResult<HttpResponse> {
    state.bags.remove_item(identity.user_id(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn empty_bag(state: web::Data<AppState>, identity: Identity) -> MarketResult<HttpResponse> {
    state.bags.empty(identity.user_id()).await?;
    Ok(HttpResponse::NoContent().finish())
}
