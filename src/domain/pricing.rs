use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use serde::Serialize;
use std::str::FromStr;

// ============================================================================
// Pricing - platform markup on top of the tailor's price
// ============================================================================
//
// The tailor always receives their set price; the platform commission is
// added on top. Amounts are exact decimals and are never rounded here.
//
// ============================================================================

/// Default markup, in percent of the seller price
pub const DEFAULT_MARKUP_PERCENT: i64 = 30;

/// Default floor for the platform commission, in monetary units
pub const DEFAULT_MIN_COMMISSION: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct PricingPolicy {
    pub markup_rate: BigDecimal,
    pub min_commission: BigDecimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            markup_rate: BigDecimal::from(DEFAULT_MARKUP_PERCENT) / BigDecimal::from(100),
            min_commission: BigDecimal::from(DEFAULT_MIN_COMMISSION),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid markup rate '{value}': {reason}")]
    MarkupRate { value: String, reason: String },

    #[error("invalid minimum commission '{value}': {reason}")]
    MinCommission { value: String, reason: String },
}

impl PricingPolicy {
    /// Build a policy from decimal strings such as `"0.30"` and `"10.00"`
    pub fn parse(markup_rate: &str, min_commission: &str) -> Result<Self, PolicyError> {
        let markup = non_negative(markup_rate).map_err(|reason| PolicyError::MarkupRate {
            value: markup_rate.to_string(),
            reason,
        })?;
        let floor = non_negative(min_commission).map_err(|reason| PolicyError::MinCommission {
            value: min_commission.to_string(),
            reason,
        })?;

        Ok(Self {
            markup_rate: markup,
            min_commission: floor,
        })
    }
}

fn non_negative(raw: &str) -> Result<BigDecimal, String> {
    let value = BigDecimal::from_str(raw.trim()).map_err(|e| e.to_string())?;
    if value < BigDecimal::from(0) {
        return Err("must not be negative".to_string());
    }
    Ok(value)
}

/// Breakdown of a customer-facing price
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub seller_price: BigDecimal,
    pub commission: BigDecimal,
    pub customer_price: BigDecimal,
    pub seller_payout: BigDecimal,
}

#[derive(Debug, Clone, Default)]
pub struct PricingCalculator {
    policy: PricingPolicy,
}

impl PricingCalculator {
    pub fn new(policy: PricingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// max(seller_price × markup, floor); the floor applies to free or invalid input too
    pub fn platform_commission(&self, seller_price: &BigDecimal) -> BigDecimal {
        let markup = seller_price * &self.policy.markup_rate;
        std::cmp::max(markup, self.policy.min_commission.clone())
    }

    pub fn customer_price(&self, seller_price: &BigDecimal) -> BigDecimal {
        if *seller_price <= BigDecimal::from(0) {
            return self.policy.min_commission.clone();
        }
        seller_price + self.platform_commission(seller_price)
    }

    pub fn seller_payout(&self, seller_price: &BigDecimal) -> BigDecimal {
        seller_price.clone()
    }

    pub fn quote(&self, seller_price: &BigDecimal) -> PriceQuote {
        PriceQuote {
            seller_price: seller_price.clone(),
            commission: self.platform_commission(seller_price),
            customer_price: self.customer_price(seller_price),
            seller_payout: self.seller_payout(seller_price),
        }
    }
}

/// Round half-up to two decimal places for charging or display
pub fn round_to_minor_units(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

/// Amount in cents, as payment processors expect it
pub fn to_minor_units(amount: &BigDecimal) -> Option<i64> {
    (round_to_minor_units(amount) * BigDecimal::from(100)).to_i64()
}

pub fn from_minor_units(minor: i64) -> BigDecimal {
    BigDecimal::from(minor) / BigDecimal::from(100)
}
