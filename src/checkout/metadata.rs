use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::order::OrderItem;
use crate::errors::{MarketError, MarketResult};
use crate::models::{CurrencyCode, ShippingAddress};

// ============================================================================
// Checkout Metadata
// ============================================================================
//
// Travels with the payment session and comes back in the completion event.
// It must carry everything needed to create the order without reading the
// bag again, because the bag may change between checkout and payment.
//
// ============================================================================

/// Purchased item as it was when checkout started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub design_id: Uuid,
    #[serde(default)]
    pub bag_item_id: Option<Uuid>,
    /// Item price in the settlement currency
    pub price: BigDecimal,
    #[serde(default)]
    pub fabric_index: Option<u32>,
    #[serde(default)]
    pub color_index: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub measurement_ref: Option<String>,
}

impl ItemSnapshot {
    pub fn to_order_item(&self) -> OrderItem {
        OrderItem {
            id: Uuid::now_v7(),
            design_id: self.design_id,
            fabric_index: self.fabric_index,
            color_index: self.color_index,
            price: self.price.clone(),
            notes: self.notes.clone(),
            measurement_ref: self.measurement_ref.clone(),
            source_bag_item_id: self.bag_item_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutMetadata {
    pub customer_id: Uuid,
    pub tailor_id: Uuid,
    pub shipping_address: ShippingAddress,
    /// First purchased design
    pub design_id: Uuid,
    pub design_ids: Vec<Uuid>,
    #[serde(default)]
    pub fabric_selection: Option<u32>,
    #[serde(default)]
    pub color_selection: Option<u32>,
    #[serde(default)]
    pub bag_item_ids: Vec<Uuid>,
    pub items: Vec<ItemSnapshot>,
    /// Settlement total in minor units
    pub expected_total: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<CurrencyCode>,
}

impl CheckoutMetadata {
    /// Cross-field checks serde cannot express
    pub fn validate(&self) -> MarketResult<()> {
        let malformed = |reason: &str| Err(MarketError::MalformedMetadata(reason.to_string()));

        if self.items.is_empty() {
            return malformed("no items");
        }
        if self.design_ids.first() != Some(&self.design_id) {
            return malformed("designId does not match the first entry of designIds");
        }

        let item_designs: Vec<Uuid> = self.items.iter().map(|item| item.design_id).collect();
        if item_designs != self.design_ids {
            return malformed("designIds do not match the item snapshots");
        }

        if self.items.iter().any(|item| item.price < BigDecimal::from(0)) {
            return malformed("negative item price");
        }
        if self.expected_total < 0 {
            return malformed("negative expected total");
        }

        let snapshot_bag_items: HashSet<Uuid> =
            self.items.iter().filter_map(|item| item.bag_item_id).collect();
        if self.bag_item_ids.iter().any(|id| !snapshot_bag_items.contains(id)) {
            return malformed("bagItemIds reference items missing from the snapshot");
        }

        let missing = self.shipping_address.missing_fields();
        if !missing.is_empty() {
            return Err(MarketError::MalformedMetadata(format!(
                "shipping address is missing {}",
                missing.join(", ")
            )));
        }

        Ok(())
    }

    pub fn order_items(&self) -> Vec<OrderItem> {
        self.items.iter().map(ItemSnapshot::to_order_item).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_address;

    pub(crate) fn sample_metadata() -> CheckoutMetadata {
        let design = Uuid::new_v4();
        let bag_item = Uuid::new_v4();
        CheckoutMetadata {
            customer_id: Uuid::new_v4(),
            tailor_id: Uuid::new_v4(),
            shipping_address: sample_address(),
            design_id: design,
            design_ids: vec![design],
            fabric_selection: Some(2),
            color_selection: None,
            bag_item_ids: vec![bag_item],
            items: vec![ItemSnapshot {
                design_id: design,
                bag_item_id: Some(bag_item),
                price: BigDecimal::from(130),
                fabric_index: Some(2),
                color_index: None,
                notes: None,
                measurement_ref: Some("m-1".to_string()),
            }],
            expected_total: 13000,
            currency: Some(CurrencyCode::usd()),
        }
    }

    #[test]
    fn test_valid_metadata_passes() {
        assert!(sample_metadata().validate().is_ok());
    }

    #[test]
    fn test_design_mismatch_is_malformed() {
        let mut metadata = sample_metadata();
        metadata.design_ids = vec![Uuid::new_v4()];
        assert!(matches!(metadata.validate(), Err(MarketError::MalformedMetadata(_))));
    }

    #[test]
    fn test_unknown_bag_item_is_malformed() {
        let mut metadata = sample_metadata();
        metadata.bag_item_ids.push(Uuid::new_v4());
        assert!(metadata.validate().is_err());
    }

    #[test]
    fn test_incomplete_address_is_malformed() {
        let mut metadata = sample_metadata();
        metadata.shipping_address.line1 = String::new();
        let err = metadata.validate().unwrap_err();
        assert!(err.to_string().contains("line1"));
    }

    #[test]
    fn test_missing_field_fails_deserialization() {
        let mut json = serde_json::to_value(sample_metadata()).unwrap();
        json.as_object_mut().unwrap().remove("tailorId");
        assert!(serde_json::from_value::<CheckoutMetadata>(json).is_err());
    }
}
