// ============================================================================
// Currency Conversion
// ============================================================================
//
// Layered rate resolution, first hit wins:
//   fresh cache -> fresh store observation -> provider ->
//   stale cache -> stale store observation -> static table -> 1
//
// ============================================================================

pub mod cache;
pub mod provider;
pub mod service;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::CurrencyCode;

pub use cache::RateCache;
pub use provider::{ProviderError, RateProvider, StaticRateProvider, STATIC_USD_RATES};
pub use service::{Conversion, CurrencyService, RateQuote, RateSource};

/// One observation of `1 from = rate to`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub rate: BigDecimal,
    pub observed_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(from: CurrencyCode, to: CurrencyCode, rate: BigDecimal, observed_at: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            rate,
            observed_at,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.observed_at
    }
}
