use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    BagRepository, CreateOrderOutcome, DesignCatalog, OrderRepository, ProfileDirectory,
    RateRepository,
};
use crate::currency::ExchangeRate;
use crate::domain::bag::{Bag, BagItem, BagStatus, BagView};
use crate::domain::order::{Order, OrderStatus};
use crate::errors::{MarketError, MarketResult};
use crate::models::{CurrencyCode, Profile};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// One lock guards every table so order creation and bag consumption commit
// together, the same way the Postgres backend uses a transaction.
//
// ============================================================================

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    orders_by_reference: HashMap<String, Uuid>,
    bags: HashMap<Uuid, Bag>,
    bag_items: HashMap<Uuid, BagItem>,
    rates: Vec<ExchangeRate>,
    profiles: HashMap<Uuid, Profile>,
    completion_weeks: HashMap<Uuid, u32>,
}

impl Tables {
    fn bag_view(&self, bag: &Bag) -> BagView {
        let mut items: Vec<BagItem> = self
            .bag_items
            .values()
            .filter(|item| item.bag_id == bag.id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.added_at);

        BagView {
            bag: bag.clone(),
            items,
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_profile(&self, profile: Profile) {
        self.tables.write().await.profiles.insert(profile.user_id, profile);
    }

    pub async fn put_design(&self, design_id: Uuid, completion_weeks: u32) {
        self.tables
            .write()
            .await
            .completion_weeks
            .insert(design_id, completion_weeks);
    }

    /// Make every following write fail with a persistence error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    fn check_writable(&self) -> MarketResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MarketError::persistence("in-memory store is refusing writes"));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create_order(&self, order: &Order, bag_item_ids: &[Uuid]) -> MarketResult<CreateOrderOutcome> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;

        if let Some(existing_id) = tables.orders_by_reference.get(&order.payment_reference) {
            if let Some(existing) = tables.orders.get(existing_id) {
                return Ok(CreateOrderOutcome::Duplicate(existing.clone()));
            }
        }

        let mut touched_bags = Vec::new();
        for item_id in bag_item_ids {
            if let Some(item) = tables.bag_items.remove(item_id) {
                touched_bags.push(item.bag_id);
            }
        }

        for bag_id in touched_bags {
            let still_has_items = tables.bag_items.values().any(|item| item.bag_id == bag_id);
            if !still_has_items {
                if let Some(bag) = tables.bags.get_mut(&bag_id) {
                    bag.status = BagStatus::CheckedOut;
                    bag.updated_at = order.created_at;
                }
            }
        }

        tables
            .orders_by_reference
            .insert(order.payment_reference.clone(), order.id);
        tables.orders.insert(order.id, order.clone());

        Ok(CreateOrderOutcome::Created)
    }

    async fn find_by_payment_reference(&self, reference: &str) -> MarketResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders_by_reference
            .get(reference)
            .and_then(|id| tables.orders.get(id))
            .cloned())
    }

    async fn get_order(&self, order_id: Uuid) -> MarketResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&order_id).cloned())
    }

    async fn update_status(&self, order: &Order, expected: OrderStatus) -> MarketResult<bool> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;

        match tables.orders.get_mut(&order.id) {
            Some(stored) if stored.status == expected => {
                *stored = order.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(MarketError::NotFound(format!("Order {}", order.id))),
        }
    }

    async fn list_for_customer(&self, customer_id: Uuid) -> MarketResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|order| order.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_for_tailor(&self, tailor_id: Uuid) -> MarketResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|order| order.tailor_id == tailor_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl BagRepository for InMemoryStore {
    async fn open_bags(&self, customer_id: Uuid) -> MarketResult<Vec<BagView>> {
        let tables = self.tables.read().await;
        let mut bags: Vec<BagView> = tables
            .bags
            .values()
            .filter(|bag| bag.customer_id == customer_id && bag.status == BagStatus::Open)
            .map(|bag| tables.bag_view(bag))
            .collect();
        bags.sort_by_key(|view| view.bag.created_at);
        Ok(bags)
    }

    async fn open_bag(&self, customer_id: Uuid, tailor_id: Uuid) -> MarketResult<Option<BagView>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bags
            .values()
            .find(|bag| {
                bag.customer_id == customer_id
                    && bag.tailor_id == tailor_id
                    && bag.status == BagStatus::Open
            })
            .map(|bag| tables.bag_view(bag)))
    }

    async fn insert_bag(&self, bag: &Bag) -> MarketResult<Bag> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;

        let existing = tables.bags.values().find(|b| {
            b.customer_id == bag.customer_id && b.tailor_id == bag.tailor_id && b.status == BagStatus::Open
        });
        if let Some(existing) = existing {
            return Ok(existing.clone());
        }

        tables.bags.insert(bag.id, bag.clone());
        Ok(bag.clone())
    }

    async fn insert_item(&self, item: &BagItem) -> MarketResult<()> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;

        let bag = tables
            .bags
            .get_mut(&item.bag_id)
            .ok_or_else(|| MarketError::NotFound(format!("Bag {}", item.bag_id)))?;
        bag.updated_at = item.added_at;
        tables.bag_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn find_item(&self, item_id: Uuid) -> MarketResult<Option<(Bag, BagItem)>> {
        let tables = self.tables.read().await;
        Ok(tables.bag_items.get(&item_id).and_then(|item| {
            tables
                .bags
                .get(&item.bag_id)
                .map(|bag| (bag.clone(), item.clone()))
        }))
    }

    async fn delete_item(&self, item_id: Uuid) -> MarketResult<()> {
        self.check_writable()?;
        self.tables.write().await.bag_items.remove(&item_id);
        Ok(())
    }

    async fn delete_open_bags(&self, customer_id: Uuid) -> MarketResult<usize> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;

        let doomed: Vec<Uuid> = tables
            .bags
            .values()
            .filter(|bag| bag.customer_id == customer_id && bag.status == BagStatus::Open)
            .map(|bag| bag.id)
            .collect();

        tables.bag_items.retain(|_, item| !doomed.contains(&item.bag_id));
        for bag_id in &doomed {
            tables.bags.remove(bag_id);
        }

        Ok(doomed.len())
    }
}

#[async_trait]
impl RateRepository for InMemoryStore {
    async fn append(&self, observation: &ExchangeRate) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("in-memory store is refusing writes");
        }
        self.tables.write().await.rates.push(observation.clone());
        Ok(())
    }

    async fn latest(&self, from: &CurrencyCode, to: &CurrencyCode) -> anyhow::Result<Option<ExchangeRate>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rates
            .iter()
            .filter(|rate| &rate.from == from && &rate.to == to)
            .max_by_key(|rate| rate.observed_at)
            .cloned())
    }
}

#[async_trait]
impl ProfileDirectory for InMemoryStore {
    async fn profile(&self, user_id: Uuid) -> MarketResult<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }
}

#[async_trait]
impl DesignCatalog for InMemoryStore {
    async fn completion_weeks(&self, design_id: Uuid) -> MarketResult<Option<u32>> {
        Ok(self.tables.read().await.completion_weeks.get(&design_id).copied())
    }
}
