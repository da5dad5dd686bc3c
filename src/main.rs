use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tailor_market::checkout::SandboxPaymentGateway;
use tailor_market::currency::StaticRateProvider;
use tailor_market::metrics::Metrics;
use tailor_market::notifications::LogChannel;
use tailor_market::state::{AppState, Integrations, Repositories};
use tailor_market::store::{InMemoryStore, PostgresStore};
use tailor_market::utils::{retry_with_backoff, RetryPolicy};
use tailor_market::web::configure_routes;
use tailor_market::AppConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter, e.g. RUST_LOG=debug
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tailor_market=debug")))
        .init();

    tracing::info!("Starting tailor marketplace service");

    let config = AppConfig::from_env()?;

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!(families = metrics.registry().gather().len(), "Metrics registry created");

    // === 2. Storage ===
    let repos = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to Postgres");
            let max_connections = config.database_max_connections;
            let store = retry_with_backoff("postgres_connect", &RetryPolicy::startup(), |_| {
                PostgresStore::connect(url, max_connections)
            })
            .await
            .into_result()?;
            store.migrate().await?;
            Repositories::postgres(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory storage");
            Repositories::in_memory(Arc::new(InMemoryStore::new()))
        }
    };

    // === 3. Components ===
    let integrations = Integrations {
        rate_provider: Arc::new(StaticRateProvider),
        payment_gateway: Arc::new(SandboxPaymentGateway::new(config.payment_base_url.clone())),
        notification_channel: Arc::new(LogChannel),
    };
    let refresh_interval = config.rate_refresh_interval;
    let refresh_margin = chrono::Duration::from_std(refresh_interval).unwrap_or_else(|_| chrono::Duration::minutes(5));
    let bind = config.bind_address();

    let state = AppState::new(config, repos, integrations, metrics);

    // === 4. Background rate refresh ===
    let sweep = state.currency.clone().spawn_refresh_sweep(refresh_interval, refresh_margin);

    // === 5. HTTP ===
    tracing::info!(host = %bind.0, port = bind.1, "HTTP server listening");
    let server_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(server_state.clone()))
            .configure(configure_routes)
    })
    .bind(bind)?
    .run()
    .await?;

    sweep.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}
