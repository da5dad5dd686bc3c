use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::models::CurrencyCode;

type Pair = (CurrencyCode, CurrencyCode);

#[derive(Debug, Clone)]
struct CachedRate {
    rate: BigDecimal,
    fetched_at: DateTime<Utc>,
}

/// Read-mostly rate cache owned by one `CurrencyService`
pub struct RateCache {
    entries: RwLock<HashMap<Pair, CachedRate>>,
    freshness: Duration,
}

impl RateCache {
    pub fn new(freshness: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            freshness,
        }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Rate younger than the freshness window
    pub fn get_fresh(&self, from: &CurrencyCode, to: &CurrencyCode, now: DateTime<Utc>) -> Option<BigDecimal> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&(from.clone(), to.clone()))
            .filter(|entry| now - entry.fetched_at < self.freshness)
            .map(|entry| entry.rate.clone())
    }

    /// Rate of any age
    pub fn get_any(&self, from: &CurrencyCode, to: &CurrencyCode) -> Option<BigDecimal> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&(from.clone(), to.clone()))
            .map(|entry| entry.rate.clone())
    }

    pub fn insert(&self, from: CurrencyCode, to: CurrencyCode, rate: BigDecimal, fetched_at: DateTime<Utc>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert((from, to), CachedRate { rate, fetched_at });
    }

    /// Pairs that expire within `margin` of `now`, including already stale ones
    pub fn near_expiry(&self, now: DateTime<Utc>, margin: Duration) -> Vec<Pair> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|(_, entry)| entry.fetched_at + self.freshness - margin <= now)
            .map(|(pair, _)| pair.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
