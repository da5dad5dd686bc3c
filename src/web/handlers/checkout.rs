use actix_web::{web, HttpResponse};
use tracing::instrument;

use crate::checkout::{CheckoutRequest, SinglePurchase};
use crate::errors::MarketResult;
use crate::state::AppState;
use crate::web::identity::Identity;

#[instrument(
    name = "handler::start_checkout",
    skip(state, identity, body),
    fields(user_id = %identity.user_id(), tailor_id = %body.tailor_id)
)]
pub async fn start_checkout(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<CheckoutRequest>,
) -> MarketResult<HttpResponse> {
    let redirect = state.checkout.start(Some(identity.user_id()), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(redirect))
}

#[instrument(
    name = "handler::buy_now",
    skip(state, identity, body),
    fields(user_id = %identity.user_id(), design_id = %body.design_id)
)]
pub async fn buy_now(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<SinglePurchase>,
) -> MarketResult<HttpResponse> {
    let redirect = state
        .checkout
        .start_single(Some(identity.user_id()), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(redirect))
}
