use std::sync::Arc;

use crate::checkout::{CheckoutInitiator, CheckoutSettings, PaymentGateway};
use crate::config::AppConfig;
use crate::currency::{CurrencyService, RateProvider};
use crate::domain::bag::BagStore;
use crate::domain::order::OrderCommandHandler;
use crate::domain::pricing::PricingCalculator;
use crate::metrics::Metrics;
use crate::notifications::{DeadLetterQueue, NotificationChannel, NotificationDispatcher};
use crate::payments::{PaymentEventHandler, SignatureVerifier};
use crate::store::{
    BagRepository, DesignCatalog, InMemoryStore, OrderRepository, PostgresStore, ProfileDirectory, RateRepository,
};

// ============================================================================
// Application State - the wired component graph
// ============================================================================

/// Storage behind every repository seam
#[derive(Clone)]
pub struct Repositories {
    pub orders: Arc<dyn OrderRepository>,
    pub bags: Arc<dyn BagRepository>,
    pub rates: Arc<dyn RateRepository>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub designs: Arc<dyn DesignCatalog>,
    /// Set when running against Postgres; probed by the health check
    pub database: Option<PostgresStore>,
}

impl Repositories {
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            orders: store.clone(),
            bags: store.clone(),
            rates: store.clone(),
            profiles: store.clone(),
            designs: store,
            database: None,
        }
    }

    pub fn postgres(store: PostgresStore) -> Self {
        let shared = Arc::new(store.clone());
        Self {
            orders: shared.clone(),
            bags: shared.clone(),
            rates: shared.clone(),
            profiles: shared.clone(),
            designs: shared,
            database: Some(store),
        }
    }
}

/// Outbound systems the marketplace talks to
#[derive(Clone)]
pub struct Integrations {
    pub rate_provider: Arc<dyn RateProvider>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
    pub notification_channel: Arc<dyn NotificationChannel>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub metrics: Arc<Metrics>,
    pub pricing: Arc<PricingCalculator>,
    pub currency: Arc<CurrencyService>,
    pub bags: Arc<BagStore>,
    pub checkout: Arc<CheckoutInitiator>,
    pub payments: Arc<PaymentEventHandler>,
    pub orders: Arc<OrderCommandHandler>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub database: Option<PostgresStore>,
}

impl AppState {
    pub fn new(config: AppConfig, repos: Repositories, integrations: Integrations, metrics: Arc<Metrics>) -> Self {
        let currency = Arc::new(CurrencyService::new(
            repos.rates.clone(),
            integrations.rate_provider,
            config.rate_freshness,
            config.provider_timeout,
            metrics.clone(),
        ));

        let dispatcher = Arc::new(NotificationDispatcher::new(
            integrations.notification_channel,
            Arc::new(DeadLetterQueue::with_capacity(config.dead_letter_capacity)),
            config.dispatcher(),
            metrics.clone(),
        ));

        let checkout = Arc::new(CheckoutInitiator::new(
            repos.bags.clone(),
            repos.profiles.clone(),
            currency.clone(),
            integrations.payment_gateway,
            CheckoutSettings {
                settlement_currency: config.settlement_currency.clone(),
                gateway_timeout: config.gateway_timeout,
                success_url: config.checkout_success_url.clone(),
                cancel_url: config.checkout_cancel_url.clone(),
            },
        ));

        let payments = Arc::new(PaymentEventHandler::new(
            SignatureVerifier::new(config.webhook_secret.clone(), config.signature_tolerance),
            repos.orders.clone(),
            repos.profiles.clone(),
            dispatcher.clone(),
            metrics.clone(),
            config.settlement_currency.clone(),
        ));

        let orders = Arc::new(OrderCommandHandler::new(
            repos.orders.clone(),
            repos.designs.clone(),
            repos.profiles.clone(),
            dispatcher.clone(),
            metrics.clone(),
            config.schedule(),
        ));

        Self {
            pricing: Arc::new(PricingCalculator::new(config.pricing.clone())),
            bags: Arc::new(BagStore::new(repos.bags, currency.clone(), config.settlement_currency.clone())),
            config: Arc::new(config),
            metrics,
            currency,
            checkout,
            payments,
            orders,
            dispatcher,
            database: repos.database,
        }
    }
}
