use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::OrderItem;
use crate::models::CurrencyCode;

// ============================================================================
// Bag Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BagStatus {
    Open,
    CheckedOut,
}

impl BagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BagStatus::Open => "open",
            BagStatus::CheckedOut => "checked_out",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(BagStatus::Open),
            "checked_out" => Some(BagStatus::CheckedOut),
            _ => None,
        }
    }
}

/// Staging cart of one customer for one tailor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bag {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub tailor_id: Uuid,
    pub status: BagStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bag {
    pub fn open(customer_id: Uuid, tailor_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            customer_id,
            tailor_id,
            status: BagStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BagItem {
    pub id: Uuid,
    pub bag_id: Uuid,
    pub design_id: Uuid,
    /// Settlement-currency price, fixed when the item was added
    pub price: BigDecimal,
    pub fabric_index: Option<u32>,
    pub color_index: Option<u32>,
    pub notes: Option<String>,
    pub measurement_ref: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl BagItem {
    /// Immutable copy carried into the order
    pub fn snapshot(&self) -> OrderItem {
        OrderItem {
            id: Uuid::now_v7(),
            design_id: self.design_id,
            fabric_index: self.fabric_index,
            color_index: self.color_index,
            price: self.price.clone(),
            notes: self.notes.clone(),
            measurement_ref: self.measurement_ref.clone(),
            source_bag_item_id: Some(self.id),
        }
    }
}

/// Input for adding a design to a bag
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBagItem {
    pub tailor_id: Uuid,
    pub design_id: Uuid,
    pub price: BigDecimal,
    /// Currency `price` is quoted in; settlement currency when absent
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub measurement_ref: Option<String>,
    #[serde(default)]
    pub fabric_index: Option<u32>,
    #[serde(default)]
    pub color_index: Option<u32>,
}

/// A bag together with its items
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BagView {
    pub bag: Bag,
    pub items: Vec<BagItem>,
}

impl BagView {
    pub fn subtotal(&self) -> BigDecimal {
        self.items
            .iter()
            .fold(BigDecimal::from(0), |acc, item| acc + &item.price)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
