use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::str::FromStr;

use crate::models::CurrencyCode;

/// Units of each currency per US dollar, used when nothing fresher exists
pub const STATIC_USD_RATES: &[(&str, &str)] = &[
    ("USD", "1"),
    ("EUR", "0.92"),
    ("GBP", "0.79"),
    ("NGN", "1550"),
    ("GHS", "15.5"),
    ("KES", "129"),
    ("INR", "83.5"),
    ("CAD", "1.37"),
];

/// Decimal places kept on derived cross rates
const CROSS_RATE_SCALE: i64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider has no rate for {from}->{to}")]
    UnsupportedPair { from: CurrencyCode, to: CurrencyCode },

    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Provider returned an invalid rate: {0}")]
    InvalidRate(String),
}

/// External source of exchange rates
#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<BigDecimal, ProviderError>;
}

fn usd_rate(code: &CurrencyCode) -> Option<BigDecimal> {
    STATIC_USD_RATES
        .iter()
        .find(|(c, _)| *c == code.as_str())
        .and_then(|(_, rate)| BigDecimal::from_str(rate).ok())
}

/// `from -> to` derived from the static table, crossing through USD
pub fn static_rate(from: &CurrencyCode, to: &CurrencyCode) -> Option<BigDecimal> {
    let from_per_usd = usd_rate(from)?;
    let to_per_usd = usd_rate(to)?;
    if from_per_usd == BigDecimal::from(0) {
        return None;
    }
    Some((to_per_usd / from_per_usd).round(CROSS_RATE_SCALE))
}

/// Provider answering from the static table; the default when no live
/// feed is configured
#[derive(Debug, Clone, Default)]
pub struct StaticRateProvider;

#[async_trait]
impl RateProvider for StaticRateProvider {
    fn name(&self) -> &'static str {
        "static_table"
    }

    async fn fetch_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<BigDecimal, ProviderError> {
        static_rate(from, to).ok_or_else(|| ProviderError::UnsupportedPair {
            from: from.clone(),
            to: to.clone(),
        })
    }
}
