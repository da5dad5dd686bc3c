use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::cache::RateCache;
use super::provider::{static_rate, RateProvider};
use super::ExchangeRate;
use crate::metrics::Metrics;
use crate::models::CurrencyCode;
use crate::store::RateRepository;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, KeyedLocks};

/// Layer that answered a rate lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Identity,
    FreshCache,
    Store,
    Provider,
    StaleCache,
    StaleStore,
    Static,
    Default,
}

impl RateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateSource::Identity => "identity",
            RateSource::FreshCache => "fresh_cache",
            RateSource::Store => "store",
            RateSource::Provider => "provider",
            RateSource::StaleCache => "stale_cache",
            RateSource::StaleStore => "stale_store",
            RateSource::Static => "static",
            RateSource::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub rate: BigDecimal,
    pub source: RateSource,
}

/// An amount expressed in the target currency, with the rate that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversion {
    pub amount: BigDecimal,
    pub rate: BigDecimal,
    pub source: RateSource,
}

pub struct CurrencyService {
    cache: RateCache,
    store: Arc<dyn RateRepository>,
    provider: Arc<dyn RateProvider>,
    breaker: CircuitBreaker,
    provider_timeout: Duration,
    in_flight: KeyedLocks<(CurrencyCode, CurrencyCode)>,
    metrics: Arc<Metrics>,
}

impl CurrencyService {
    pub fn new(
        store: Arc<dyn RateRepository>,
        provider: Arc<dyn RateProvider>,
        freshness: chrono::Duration,
        provider_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            cache: RateCache::new(freshness),
            store,
            provider,
            breaker: CircuitBreaker::new("rate_provider", CircuitBreakerConfig::default()),
            provider_timeout,
            in_flight: KeyedLocks::new(),
            metrics,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    /// Units of `to` per unit of `from`; never fails
    pub async fn rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> BigDecimal {
        self.rate_with_source(from, to).await.rate
    }

    pub async fn convert(&self, amount: &BigDecimal, from: &CurrencyCode, to: &CurrencyCode) -> Conversion {
        let quote = self.rate_with_source(from, to).await;
        Conversion {
            amount: amount * &quote.rate,
            rate: quote.rate,
            source: quote.source,
        }
    }

    pub async fn rate_with_source(&self, from: &CurrencyCode, to: &CurrencyCode) -> RateQuote {
        let quote = self.resolve(from, to).await;

        tracing::debug!(
            from = %from,
            to = %to,
            rate = %quote.rate,
            source = quote.source.as_str(),
            "Exchange rate resolved"
        );
        self.metrics.record_rate_source(quote.source.as_str());

        quote
    }

    async fn resolve(&self, from: &CurrencyCode, to: &CurrencyCode) -> RateQuote {
        if from == to {
            return RateQuote {
                rate: BigDecimal::from(1),
                source: RateSource::Identity,
            };
        }

        if let Some(rate) = self.cache.get_fresh(from, to, Utc::now()) {
            return RateQuote { rate, source: RateSource::FreshCache };
        }

        let pair = (from.clone(), to.clone());
        let stored = {
            let _guard = self.in_flight.acquire(&pair).await;

            // Another task may have filled the cache while we waited
            if let Some(rate) = self.cache.get_fresh(from, to, Utc::now()) {
                return RateQuote { rate, source: RateSource::FreshCache };
            }

            let stored = match self.store.latest(from, to).await {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::warn!(from = %from, to = %to, error = %e, "Failed to read stored exchange rate");
                    None
                }
            };

            if let Some(observation) = &stored {
                if observation.age(Utc::now()) < self.cache.freshness() {
                    self.cache.insert(
                        from.clone(),
                        to.clone(),
                        observation.rate.clone(),
                        observation.observed_at,
                    );
                    return RateQuote {
                        rate: observation.rate.clone(),
                        source: RateSource::Store,
                    };
                }
            }

            if let Some(rate) = self.fetch_from_provider(from, to).await {
                return RateQuote { rate, source: RateSource::Provider };
            }

            stored
        };

        if let Some(rate) = self.cache.get_any(from, to) {
            return RateQuote { rate, source: RateSource::StaleCache };
        }

        if let Some(observation) = stored {
            return RateQuote {
                rate: observation.rate,
                source: RateSource::StaleStore,
            };
        }

        if let Some(rate) = static_rate(from, to) {
            return RateQuote { rate, source: RateSource::Static };
        }

        tracing::warn!(from = %from, to = %to, "No exchange rate available, using 1");
        RateQuote {
            rate: BigDecimal::from(1),
            source: RateSource::Default,
        }
    }

    /// Fetch, record and cache a live rate. Callers hold the pair's guard.
    async fn fetch_from_provider(&self, from: &CurrencyCode, to: &CurrencyCode) -> Option<BigDecimal> {
        let result = self
            .breaker
            .call(self.provider_timeout, self.provider.fetch_rate(from, to))
            .await;
        self.metrics
            .update_circuit_breaker_state(self.breaker.name(), self.breaker.get_state().await);

        let rate = match result {
            Ok(rate) if rate > BigDecimal::from(0) => rate,
            Ok(rate) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    from = %from,
                    to = %to,
                    rate = %rate,
                    "Provider returned a non-positive rate"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    from = %from,
                    to = %to,
                    error = %e,
                    "Exchange rate provider failed"
                );
                return None;
            }
        };

        let observed_at = Utc::now();
        let observation = ExchangeRate::new(from.clone(), to.clone(), rate.clone(), observed_at);
        if let Err(e) = self.store.append(&observation).await {
            tracing::warn!(from = %from, to = %to, error = %e, "Failed to persist exchange rate");
        }
        self.cache.insert(from.clone(), to.clone(), rate.clone(), observed_at);

        Some(rate)
    }

    /// Re-fetch cached pairs that expire within `margin`; returns how many were refreshed
    pub async fn refresh_near_expiry(&self, margin: chrono::Duration) -> usize {
        let due = self.cache.near_expiry(Utc::now(), margin);
        let mut refreshed = 0;

        for pair in due {
            let _guard = self.in_flight.acquire(&pair).await;
            let (from, to) = &pair;
            if self.fetch_from_provider(from, to).await.is_some() {
                refreshed += 1;
            }
        }

        if refreshed > 0 {
            tracing::debug!(refreshed = refreshed, "Refreshed exchange rates near expiry");
        }
        refreshed
    }

    pub fn spawn_refresh_sweep(self: Arc<Self>, interval: Duration, margin: chrono::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Starting exchange rate refresh sweep");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                self.refresh_near_expiry(margin).await;
            }
        })
    }
}
