// ============================================================================
// HTTP API (actix-web)
// ============================================================================
//
// Thin adapters: extract identity and input, call one component, map the
// result. Every error becomes a JSON body through `MarketError`'s
// `ResponseError` impl.
//
// ============================================================================

pub mod error;
pub mod handlers;
pub mod identity;

use actix_web::web;

use handlers::{bag, checkout, ops, orders, payments};

pub use identity::Identity;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(ops::health_check))
        .route("/metrics", web::get().to(ops::metrics))
        .service(
            web::scope("/api/v1")
                .route("/health", web::get().to(ops::health_check))
                .route("/metrics", web::get().to(ops::metrics))
                .service(
                    web::scope("/bag")
                        .route("", web::get().to(bag::get_bag))
                        .route("", web::delete().to(bag::empty_bag))
                        .route("/items", web::post().to(bag::add_item))
                        .route("/items/{item_id}", web::delete().to(bag::remove_item)),
                )
                .service(
                    web::scope("/checkout")
                        .route("", web::post().to(checkout::start_checkout))
                        .route("/single", web::post().to(checkout::buy_now)),
                )
                .service(
                    web::scope("/orders")
                        .route("", web::get().to(orders::list_orders))
                        .route("/{order_id}", web::get().to(orders::get_order))
                        .route("/{order_id}", web::patch().to(orders::transition_order)),
                )
                .route("/webhooks/payments", web::post().to(payments::payment_webhook))
                .route("/prices/quote", web::get().to(ops::price_quote))
                .route("/rates", web::get().to(ops::exchange_rate))
                .service(
                    web::scope("/admin/dead-letters")
                        .route("", web::get().to(ops::list_dead_letters))
                        .route("/{id}/redeliver", web::post().to(ops::redeliver_dead_letter)),
                ),
        );
}
