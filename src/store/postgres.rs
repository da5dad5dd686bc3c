use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::str::FromStr;
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
// Postgres Store
// ============================================================================

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const ORDER_COLUMNS: &str = "id, customer_id, tailor_id, status, total_amount, currency, \
     payment_reference, shipping_address, items, rejection_reason, estimated_completion, \
     created_at, updated_at";

const BAG_ITEM_COLUMNS: &str =
    "id, bag_id, design_id, price, fabric_index, color_index, notes, measurement_ref, added_at";

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn bag_view(&self, bag: Bag) -> MarketResult<BagView> {
        let sql = format!(
            "SELECT {} FROM bag_items WHERE bag_id = $1 ORDER BY added_at",
            BAG_ITEM_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(bag.id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        let items = rows.iter().map(bag_item_from_row).collect::<MarketResult<Vec<_>>>()?;
        Ok(BagView { bag, items })
    }

    async fn orders_where(&self, column: &str, id: Uuid) -> MarketResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE {} = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS, column
        );
        let rows = sqlx::query(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.iter().map(order_from_row).collect()
    }
}

fn db_error(err: sqlx::Error) -> MarketError {
    MarketError::persistence(err)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn to_db_index(index: Option<u32>) -> Option<i32> {
    index.and_then(|i| i32::try_from(i).ok())
}

fn from_db_index(index: Option<i32>) -> Option<u32> {
    index.and_then(|i| u32::try_from(i).ok())
}

fn order_from_row(row: &PgRow) -> MarketResult<Order> {
    let status: String = row.try_get("status").map_err(db_error)?;
    let shipping_address: String = row.try_get("shipping_address").map_err(db_error)?;
    let items: String = row.try_get("items").map_err(db_error)?;

    Ok(Order {
        id: row.try_get("id").map_err(db_error)?,
        customer_id: row.try_get("customer_id").map_err(db_error)?,
        tailor_id: row.try_get("tailor_id").map_err(db_error)?,
        status: OrderStatus::from_str(&status).map_err(MarketError::PersistenceFailure)?,
        total_amount: row.try_get("total_amount").map_err(db_error)?,
        currency: row.try_get("currency").map_err(db_error)?,
        payment_reference: row.try_get("payment_reference").map_err(db_error)?,
        shipping_address: serde_json::from_str(&shipping_address).map_err(MarketError::persistence)?,
        items: serde_json::from_str(&items).map_err(MarketError::persistence)?,
        rejection_reason: row.try_get("rejection_reason").map_err(db_error)?,
        estimated_completion: row.try_get("estimated_completion").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn bag_from_row(row: &PgRow) -> MarketResult<Bag> {
    let status: String = row.try_get("status").map_err(db_error)?;

    Ok(Bag {
        id: row.try_get("id").map_err(db_error)?,
        customer_id: row.try_get("customer_id").map_err(db_error)?,
        tailor_id: row.try_get("tailor_id").map_err(db_error)?,
        status: BagStatus::parse(&status)
            .ok_or_else(|| MarketError::PersistenceFailure(format!("unknown bag status '{}'", status)))?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn bag_item_from_row(row: &PgRow) -> MarketResult<BagItem> {
    Ok(BagItem {
        id: row.try_get("id").map_err(db_error)?,
        bag_id: row.try_get("bag_id").map_err(db_error)?,
        design_id: row.try_get("design_id").map_err(db_error)?,
        price: row.try_get("price").map_err(db_error)?,
        fabric_index: from_db_index(row.try_get("fabric_index").map_err(db_error)?),
        color_index: from_db_index(row.try_get("color_index").map_err(db_error)?),
        notes: row.try_get("notes").map_err(db_error)?,
        measurement_ref: row.try_get("measurement_ref").map_err(db_error)?,
        added_at: row.try_get("added_at").map_err(db_error)?,
    })
}

// ============================================================================
// Orders
// ============================================================================

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn create_order(&self, order: &Order, bag_item_ids: &[Uuid]) -> MarketResult<CreateOrderOutcome> {
        let shipping_address = serde_json::to_string(&order.shipping_address).map_err(MarketError::persistence)?;
        let items = serde_json::to_string(&order.items).map_err(MarketError::persistence)?;

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let sql = format!(
            "INSERT INTO orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (payment_reference) DO NOTHING",
            ORDER_COLUMNS
        );
        let inserted = sqlx::query(&sql)
            .bind(order.id)
            .bind(order.customer_id)
            .bind(order.tailor_id)
            .bind(order.status.as_str())
            .bind(&order.total_amount)
            .bind(&order.currency)
            .bind(&order.payment_reference)
            .bind(&shipping_address)
            .bind(&items)
            .bind(&order.rejection_reason)
            .bind(order.estimated_completion)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await;

        let inserted = match inserted {
            Ok(result) => result.rows_affected(),
            Err(err) if is_unique_violation(&err) => 0,
            Err(err) => return Err(db_error(err)),
        };

        if inserted == 0 {
            tx.rollback().await.map_err(db_error)?;
            return match self.find_by_payment_reference(&order.payment_reference).await? {
                Some(existing) => Ok(CreateOrderOutcome::Duplicate(existing)),
                None => Err(MarketError::PersistenceFailure(format!(
                    "order for {} conflicted but could not be read back",
                    order.payment_reference
                ))),
            };
        }

        if !bag_item_ids.is_empty() {
            let touched: Vec<Uuid> = sqlx::query("DELETE FROM bag_items WHERE id = ANY($1) RETURNING bag_id")
                .bind(bag_item_ids)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_error)?
                .iter()
                .map(|row| row.try_get("bag_id"))
                .collect::<Result<_, _>>()
                .map_err(db_error)?;

            sqlx::query(
                "UPDATE bags SET status = 'checked_out', updated_at = $2 \
                 WHERE id = ANY($1) AND NOT EXISTS (SELECT 1 FROM bag_items WHERE bag_id = bags.id)",
            )
            .bind(&touched)
            .bind(order.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(CreateOrderOutcome::Created)
    }

    async fn find_by_payment_reference(&self, reference: &str) -> MarketResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE payment_reference = $1", ORDER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn get_order(&self, order_id: Uuid) -> MarketResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn update_status(&self, order: &Order, expected: OrderStatus) -> MarketResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = $1, rejection_reason = $2, estimated_completion = $3, updated_at = $4 \
             WHERE id = $5 AND status = $6",
        )
        .bind(order.status.as_str())
        .bind(&order.rejection_reason)
        .bind(order.estimated_completion)
        .bind(order.updated_at)
        .bind(order.id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        match self.get_order(order.id).await? {
            Some(_) => Ok(false),
            None => Err(MarketError::NotFound(format!("Order {}", order.id))),
        }
    }

    async fn list_for_customer(&self, customer_id: Uuid) -> MarketResult<Vec<Order>> {
        self.orders_where("customer_id", customer_id).await
    }

    async fn list_for_tailor(&self, tailor_id: Uuid) -> MarketResult<Vec<Order>> {
        self.orders_where("tailor_id", tailor_id).await
    }
}

// ============================================================================
// Bags
// ============================================================================

#[async_trait]
impl BagRepository for PostgresStore {
    async fn open_bags(&self, customer_id: Uuid) -> MarketResult<Vec<BagView>> {
        let rows = sqlx::query(
            "SELECT id, customer_id, tailor_id, status, created_at, updated_at FROM bags \
             WHERE customer_id = $1 AND status = 'open' ORDER BY created_at",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            views.push(self.bag_view(bag_from_row(row)?).await?);
        }
        Ok(views)
    }

    async fn open_bag(&self, customer_id: Uuid, tailor_id: Uuid) -> MarketResult<Option<BagView>> {
        let row = sqlx::query(
            "SELECT id, customer_id, tailor_id, status, created_at, updated_at FROM bags \
             WHERE customer_id = $1 AND tailor_id = $2 AND status = 'open'",
        )
        .bind(customer_id)
        .bind(tailor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => Ok(Some(self.bag_view(bag_from_row(&row)?).await?)),
            None => Ok(None),
        }
    }

    async fn insert_bag(&self, bag: &Bag) -> MarketResult<Bag> {
        let inserted = sqlx::query(
            "INSERT INTO bags (id, customer_id, tailor_id, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(bag.id)
        .bind(bag.customer_id)
        .bind(bag.tailor_id)
        .bind(bag.status.as_str())
        .bind(bag.created_at)
        .bind(bag.updated_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(bag.clone()),
            // Another process opened a bag for the pair first
            Err(err) if is_unique_violation(&err) => match self.open_bag(bag.customer_id, bag.tailor_id).await? {
                Some(view) => Ok(view.bag),
                None => Err(MarketError::PersistenceFailure(format!(
                    "open bag for {}/{} conflicted but could not be read back",
                    bag.customer_id, bag.tailor_id
                ))),
            },
            Err(err) => Err(db_error(err)),
        }
    }

    async fn insert_item(&self, item: &BagItem) -> MarketResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let sql = format!(
            "INSERT INTO bag_items ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            BAG_ITEM_COLUMNS
        );
        sqlx::query(&sql)
            .bind(item.id)
            .bind(item.bag_id)
            .bind(item.design_id)
            .bind(&item.price)
            .bind(to_db_index(item.fabric_index))
            .bind(to_db_index(item.color_index))
            .bind(&item.notes)
            .bind(&item.measurement_ref)
            .bind(item.added_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        sqlx::query("UPDATE bags SET updated_at = $2 WHERE id = $1")
            .bind(item.bag_id)
            .bind(item.added_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn find_item(&self, item_id: Uuid) -> MarketResult<Option<(Bag, BagItem)>> {
        let sql = format!("SELECT {} FROM bag_items WHERE id = $1", BAG_ITEM_COLUMNS);
        let Some(row) = sqlx::query(&sql)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };
        let item = bag_item_from_row(&row)?;

        let bag_row = sqlx::query(
            "SELECT id, customer_id, tailor_id, status, created_at, updated_at FROM bags WHERE id = $1",
        )
        .bind(item.bag_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match bag_row {
            Some(bag_row) => Ok(Some((bag_from_row(&bag_row)?, item))),
            None => Ok(None),
        }
    }

    async fn delete_item(&self, item_id: Uuid) -> MarketResult<()> {
        sqlx::query("DELETE FROM bag_items WHERE id = $1")
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn delete_open_bags(&self, customer_id: Uuid) -> MarketResult<usize> {
        // bag_items go with their bag through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM bags WHERE customer_id = $1 AND status = 'open'")
            .bind(customer_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() as usize)
    }
}

// ============================================================================
// Rates, profiles, designs
// ============================================================================

#[async_trait]
impl RateRepository for PostgresStore {
    async fn append(&self, observation: &ExchangeRate) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO exchange_rates (from_currency, to_currency, rate, observed_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(observation.from.as_str())
        .bind(observation.to.as_str())
        .bind(&observation.rate)
        .bind(observation.observed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest(&self, from: &CurrencyCode, to: &CurrencyCode) -> anyhow::Result<Option<ExchangeRate>> {
        let row = sqlx::query(
            "SELECT rate, observed_at FROM exchange_rates \
             WHERE from_currency = $1 AND to_currency = $2 \
             ORDER BY observed_at DESC LIMIT 1",
        )
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let rate: BigDecimal = row.try_get("rate")?;
        let observed_at: DateTime<Utc> = row.try_get("observed_at")?;

        Ok(Some(ExchangeRate::new(from.clone(), to.clone(), rate, observed_at)))
    }
}

#[async_trait]
impl ProfileDirectory for PostgresStore {
    async fn profile(&self, user_id: Uuid) -> MarketResult<Option<Profile>> {
        let row = sqlx::query("SELECT user_id, display_name, email FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(|row| {
            Ok(Profile {
                user_id: row.try_get("user_id").map_err(db_error)?,
                display_name: row.try_get("display_name").map_err(db_error)?,
                email: row.try_get("email").map_err(db_error)?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl DesignCatalog for PostgresStore {
    async fn completion_weeks(&self, design_id: Uuid) -> MarketResult<Option<u32>> {
        let weeks: Option<i32> = sqlx::query_scalar("SELECT completion_weeks FROM designs WHERE id = $1")
            .bind(design_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(weeks.and_then(|w| u32::try_from(w).ok()))
    }
}
