use bigdecimal::BigDecimal;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::value_objects::{Bag, BagItem, BagStatus, BagView, NewBagItem};
use crate::currency::CurrencyService;
use crate::domain::pricing::round_to_minor_units;
use crate::errors::{MarketError, MarketResult};
use crate::models::CurrencyCode;
use crate::store::BagRepository;
use crate::utils::KeyedLocks;

// ============================================================================
// Bag Store - per-(customer, tailor) staging carts
// ============================================================================
//
// Mutations of one bag are serialized so find-or-create never produces two
// open bags for the same pair. Item prices are converted to the settlement
// currency on add, so later rate moves never change a bag's total.
//
// ============================================================================

pub struct BagStore {
    bags: Arc<dyn BagRepository>,
    currency: Arc<CurrencyService>,
    settlement_currency: CurrencyCode,
    locks: KeyedLocks<(Uuid, Uuid)>,
}

impl BagStore {
    pub fn new(bags: Arc<dyn BagRepository>, currency: Arc<CurrencyService>, settlement_currency: CurrencyCode) -> Self {
        Self {
            bags,
            currency,
            settlement_currency,
            locks: KeyedLocks::new(),
        }
    }

    /// Every open bag of the customer, with items
    pub async fn get(&self, customer_id: Uuid) -> MarketResult<Vec<BagView>> {
        self.bags.open_bags(customer_id).await
    }

    pub async fn get_for_tailor(&self, customer_id: Uuid, tailor_id: Uuid) -> MarketResult<Option<BagView>> {
        self.bags.open_bag(customer_id, tailor_id).await
    }

    /// Add a design to the open bag for its tailor, opening one if needed.
    /// The price is settled now and never recomputed.
    pub async fn add_item(&self, customer_id: Option<Uuid>, new_item: NewBagItem) -> MarketResult<BagItem> {
        let customer_id = customer_id.ok_or(MarketError::Unauthenticated)?;
        if new_item.price < BigDecimal::from(0) {
            return Err(MarketError::ValidationError("price must not be negative".to_string()));
        }
        let price = self.settle(&new_item.price, new_item.currency.as_ref()).await;

        let _guard = self.locks.acquire(&(customer_id, new_item.tailor_id)).await;
        let now = Utc::now();

        let bag = match self.bags.open_bag(customer_id, new_item.tailor_id).await? {
            Some(view) => view.bag,
            None => {
                let bag = self
                    .bags
                    .insert_bag(&Bag::open(customer_id, new_item.tailor_id, now))
                    .await?;
                tracing::debug!(
                    bag_id = %bag.id,
                    customer_id = %customer_id,
                    tailor_id = %new_item.tailor_id,
                    "Opened new bag"
                );
                bag
            }
        };

        let item = BagItem {
            id: Uuid::now_v7(),
            bag_id: bag.id,
            design_id: new_item.design_id,
            price,
            fabric_index: new_item.fabric_index,
            color_index: new_item.color_index,
            notes: new_item.notes.filter(|n| !n.trim().is_empty()),
            measurement_ref: new_item.measurement_ref,
            added_at: now,
        };
        self.bags.insert_item(&item).await?;

        tracing::info!(
            bag_id = %bag.id,
            item_id = %item.id,
            design_id = %item.design_id,
            price = %item.price,
            "Item added to bag"
        );

        Ok(item)
    }

    async fn settle(&self, price: &BigDecimal, quoted_in: Option<&CurrencyCode>) -> BigDecimal {
        match quoted_in {
            Some(currency) if *currency != self.settlement_currency => {
                let conversion = self.currency.convert(price, currency, &self.settlement_currency).await;
                tracing::debug!(
                    from = %currency,
                    to = %self.settlement_currency,
                    rate = %conversion.rate,
                    source = conversion.source.as_str(),
                    "Bag item price settled"
                );
                round_to_minor_units(&conversion.amount)
            }
            _ => price.clone(),
        }
    }

    pub async fn remove_item(&self, customer_id: Uuid, item_id: Uuid) -> MarketResult<()> {
        let not_found = || MarketError::NotFound(format!("Bag item {}", item_id));

        let (bag, _) = self.bags.find_item(item_id).await?.ok_or_else(not_found)?;
        if bag.customer_id != customer_id {
            return Err(not_found());
        }

        let _guard = self.locks.acquire(&(bag.customer_id, bag.tailor_id)).await;

        // Re-read under the lock; checkout may have consumed it meanwhile
        let (bag, _) = self.bags.find_item(item_id).await?.ok_or_else(not_found)?;
        if bag.status != BagStatus::Open {
            return Err(not_found());
        }

        self.bags.delete_item(item_id).await?;
        tracing::info!(bag_id = %bag.id, item_id = %item_id, "Item removed from bag");
        Ok(())
    }

    /// Delete every open bag of the customer together with its items
    pub async fn empty(&self, customer_id: Uuid) -> MarketResult<usize> {
        let views = self.bags.open_bags(customer_id).await?;
        let mut guards = Vec::with_capacity(views.len());
        for view in &views {
            guards.push(self.locks.acquire(&(customer_id, view.bag.tailor_id)).await);
        }

        let removed = self.bags.delete_open_bags(customer_id).await?;
        tracing::info!(customer_id = %customer_id, bags = removed, "Bags emptied");
        Ok(removed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::currency::StaticRateProvider;
    use crate::metrics::Metrics;
    use crate::store::InMemoryStore;
    use std::str::FromStr;

    pub(crate) fn rates(store: Arc<InMemoryStore>) -> Arc<CurrencyService> {
        Arc::new(CurrencyService::new(
            store,
            Arc::new(StaticRateProvider),
            chrono::Duration::minutes(15),
            std::time::Duration::from_millis(200),
            Arc::new(Metrics::new().unwrap()),
        ))
    }

    /// Bag store settling in USD at the static rates
    pub(crate) fn bag_store(store: Arc<InMemoryStore>) -> BagStore {
        BagStore::new(store.clone(), rates(store), CurrencyCode::usd())
    }

    fn new_item(tailor_id: Uuid, price: &str) -> NewBagItem {
        NewBagItem {
            tailor_id,
            design_id: Uuid::new_v4(),
            price: BigDecimal::from_str(price).unwrap(),
            currency: None,
            notes: None,
            measurement_ref: None,
            fabric_index: None,
            color_index: None,
        }
    }

    fn store() -> BagStore {
        bag_store(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_add_item_requires_identity() {
        let result = store().add_item(None, new_item(Uuid::new_v4(), "10")).await;
        assert!(matches!(result, Err(MarketError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_negative_price_is_rejected() {
        let result = store().add_item(Some(Uuid::new_v4()), new_item(Uuid::new_v4(), "-1")).await;
        assert!(matches!(result, Err(MarketError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_one_open_bag_per_tailor() {
        let store = store();
        let customer = Uuid::new_v4();
        let (tailor_a, tailor_b) = (Uuid::new_v4(), Uuid::new_v4());

        let first = store.add_item(Some(customer), new_item(tailor_a, "10")).await.unwrap();
        let second = store.add_item(Some(customer), new_item(tailor_a, "20")).await.unwrap();
        store.add_item(Some(customer), new_item(tailor_b, "30")).await.unwrap();

        assert_eq!(first.bag_id, second.bag_id);
        let bags = store.get(customer).await.unwrap();
        assert_eq!(bags.len(), 2);

        let bag_a = store.get_for_tailor(customer, tailor_a).await.unwrap().unwrap();
        assert_eq!(bag_a.subtotal(), BigDecimal::from(30));
    }

    #[tokio::test]
    async fn test_concurrent_adds_share_one_bag() {
        let store = Arc::new(store());
        let customer = Uuid::new_v4();
        let tailor = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.add_item(Some(customer), new_item(tailor, "5")).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let bags = store.get(customer).await.unwrap();
        assert_eq!(bags.len(), 1);
        assert_eq!(bags[0].items.len(), 8);
    }

    #[tokio::test]
    async fn test_remove_item_checks_ownership() {
        let store = store();
        let customer = Uuid::new_v4();
        let item = store.add_item(Some(customer), new_item(Uuid::new_v4(), "10")).await.unwrap();

        let stranger = store.remove_item(Uuid::new_v4(), item.id).await;
        assert!(matches!(stranger, Err(MarketError::NotFound(_))));

        store.remove_item(customer, item.id).await.unwrap();
        let again = store.remove_item(customer, item.id).await;
        assert!(matches!(again, Err(MarketError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_removes_all_open_bags() {
        let store = store();
        let customer = Uuid::new_v4();
        let other_customer = Uuid::new_v4();
        let tailor = Uuid::new_v4();
        store.add_item(Some(customer), new_item(tailor, "10")).await.unwrap();
        store.add_item(Some(customer), new_item(Uuid::new_v4(), "10")).await.unwrap();
        store.add_item(Some(other_customer), new_item(tailor, "10")).await.unwrap();

        assert_eq!(store.empty(customer).await.unwrap(), 2);
        assert!(store.get(customer).await.unwrap().is_empty());
        assert_eq!(store.get(other_customer).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_price_is_settled_on_add() {
        let store = store();
        let customer = Uuid::new_v4();
        let mut item = new_item(Uuid::new_v4(), "15500");
        item.currency = Some(CurrencyCode::new("NGN").unwrap());

        // 1550 NGN per USD
        let added = store.add_item(Some(customer), item).await.unwrap();
        assert_eq!(added.price, BigDecimal::from(10));
    }

    #[tokio::test]
    async fn test_settled_price_ignores_later_rate_moves() {
        let memory = Arc::new(InMemoryStore::new());
        let currency = rates(memory.clone());
        let store = BagStore::new(memory, currency.clone(), CurrencyCode::usd());
        let customer = Uuid::new_v4();
        let tailor = Uuid::new_v4();
        let ngn = CurrencyCode::new("NGN").unwrap();

        let mut item = new_item(tailor, "15500");
        item.currency = Some(ngn.clone());
        store.add_item(Some(customer), item).await.unwrap();

        currency
            .cache()
            .insert(ngn, CurrencyCode::usd(), BigDecimal::from_str("0.001").unwrap(), chrono::Utc::now());

        let bag = store.get_for_tailor(customer, tailor).await.unwrap().unwrap();
        assert_eq!(bag.subtotal(), BigDecimal::from(10));
    }
}
