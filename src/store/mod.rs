// ============================================================================
// Persistence Seams
// ============================================================================
//
// Components talk to storage only through these traits. `memory` backs tests
// and the demo binary; `postgres` is selected when DATABASE_URL is set.
//
// ============================================================================

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::currency::ExchangeRate;
use crate::domain::bag::{Bag, BagItem, BagView};
use crate::domain::order::{Order, OrderStatus};
use crate::errors::MarketResult;
use crate::models::{CurrencyCode, Profile};

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Result of persisting a newly paid order
#[derive(Debug, Clone)]
pub enum CreateOrderOutcome {
    Created,
    /// Another order already holds the payment reference
    Duplicate(Order),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert `order` with its items and consume `bag_item_ids` in one
    /// transaction. A bag left without items is marked checked out.
    async fn create_order(&self, order: &Order, bag_item_ids: &[Uuid]) -> MarketResult<CreateOrderOutcome>;

    async fn find_by_payment_reference(&self, reference: &str) -> MarketResult<Option<Order>>;

    async fn get_order(&self, order_id: Uuid) -> MarketResult<Option<Order>>;

    /// Persist the new state of `order` only if its stored status is still
    /// `expected`. Returns false when another writer got there first.
    async fn update_status(&self, order: &Order, expected: OrderStatus) -> MarketResult<bool>;

    async fn list_for_customer(&self, customer_id: Uuid) -> MarketResult<Vec<Order>>;

    async fn list_for_tailor(&self, tailor_id: Uuid) -> MarketResult<Vec<Order>>;
}

#[async_trait]
pub trait BagRepository: Send + Sync {
    async fn open_bags(&self, customer_id: Uuid) -> MarketResult<Vec<BagView>>;

    async fn open_bag(&self, customer_id: Uuid, tailor_id: Uuid) -> MarketResult<Option<BagView>>;

    /// Insert a new open bag; when another writer opened one for the same
    /// pair first, that bag is returned instead
    async fn insert_bag(&self, bag: &Bag) -> MarketResult<Bag>;

    async fn insert_item(&self, item: &BagItem) -> MarketResult<()>;

    /// The item and the bag holding it
    async fn find_item(&self, item_id: Uuid) -> MarketResult<Option<(Bag, BagItem)>>;

    async fn delete_item(&self, item_id: Uuid) -> MarketResult<()>;

    /// Delete every open bag of the customer and all of their items
    async fn delete_open_bags(&self, customer_id: Uuid) -> MarketResult<usize>;
}

/// Append-only exchange rate observations
#[async_trait]
pub trait RateRepository: Send + Sync {
    async fn append(&self, observation: &ExchangeRate) -> anyhow::Result<()>;

    async fn latest(&self, from: &CurrencyCode, to: &CurrencyCode) -> anyhow::Result<Option<ExchangeRate>>;
}

#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn profile(&self, user_id: Uuid) -> MarketResult<Option<Profile>>;
}

#[async_trait]
pub trait DesignCatalog: Send + Sync {
    /// Production time the tailor quoted for a design
    async fn completion_weeks(&self, design_id: Uuid) -> MarketResult<Option<u32>>;
}

/// Profile for notifying `user_id` after a commit. Lookup failures must not
/// undo committed work, so they degrade to a profile without contact info.
pub async fn profile_or_unknown(directory: &dyn ProfileDirectory, user_id: Uuid) -> Profile {
    match directory.profile(user_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => Profile::unknown(user_id),
        Err(e) => {
            tracing::error!(
                user_id = %user_id,
                error = %e,
                escalation = "operator",
                "Profile lookup failed after commit"
            );
            Profile::unknown(user_id)
        }
    }
}
