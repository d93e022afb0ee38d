//! `SqliteDatabase` is a concrete implementation of a delivery sync engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the [`DeliveryStore`] trait.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, deliveries, history, new_pool, orders};
use crate::{
    db_types::{Delivery, HistoryEntry, NewDelivery, NewOrder, Order, OrderNumber, OrderStatusType},
    traits::{DeliveryStore, DeliveryStoreError, DeliveryUpdate},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl DeliveryStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, DeliveryStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order(id, &mut conn).await?)
    }

    async fn fetch_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>, DeliveryStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_number(order_number, &mut conn).await?)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, DeliveryStoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn update_order_status(&self, order_id: i64, status: OrderStatusType) -> Result<Order, DeliveryStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(order_id, status, Utc::now(), &mut conn).await
    }

    async fn fetch_delivery_for_order(&self, order_id: i64) -> Result<Option<Delivery>, DeliveryStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(deliveries::fetch_delivery_for_order(order_id, &mut conn).await?)
    }

    async fn fetch_delivery_by_external_id(&self, external_id: &str) -> Result<Option<Delivery>, DeliveryStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(deliveries::fetch_delivery_by_external_id(external_id, &mut conn).await?)
    }

    async fn fetch_history(&self, delivery_id: i64) -> Result<Vec<HistoryEntry>, DeliveryStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(history::fetch_history(delivery_id, &mut conn).await?)
    }

    async fn insert_delivery(&self, delivery: NewDelivery, entry: HistoryEntry) -> Result<Delivery, DeliveryStoreError> {
        let mut tx = self.pool.begin().await?;
        if orders::fetch_order(delivery.order_id, &mut tx).await?.is_none() {
            return Err(DeliveryStoreError::OrderIdNotFound(delivery.order_id));
        }
        let delivery = deliveries::insert_delivery(delivery, entry.timestamp, &mut tx).await?;
        history::append_entry(delivery.id, &entry, &mut tx).await?;
        tx.commit().await?;
        Ok(delivery)
    }

    async fn apply_delivery_update(&self, update: DeliveryUpdate) -> Result<Delivery, DeliveryStoreError> {
        let DeliveryUpdate { delivery_id, order_id, expected_version, patch, history: entry, order_status, updated_at } =
            update;
        let mut tx = self.pool.begin().await?;
        // The update goes first so that SQLite takes the write lock before anything else is read in this transaction
        let updated = deliveries::compare_and_update(delivery_id, expected_version, patch, updated_at, &mut tx).await?;
        let Some(delivery) = updated else {
            let exists = deliveries::fetch_delivery(delivery_id, &mut tx).await?.is_some();
            tx.rollback().await?;
            return if exists {
                warn!("🗃️ Stale write on delivery {delivery_id}. Expected version {expected_version}");
                Err(DeliveryStoreError::StaleWrite { delivery_id, expected_version })
            } else {
                Err(DeliveryStoreError::DeliveryNotFound(delivery_id))
            };
        };
        if let Some(entry) = entry {
            history::append_entry(delivery_id, &entry, &mut tx).await?;
        }
        if let Some(status) = order_status {
            orders::update_order_status(order_id, status, updated_at, &mut tx).await?;
            debug!("🗃️ Order id {order_id} moved to {status} along with delivery {delivery_id}");
        }
        tx.commit().await?;
        Ok(delivery)
    }

    async fn fetch_sweep_candidates(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Order>, DeliveryStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_open_orders_since(since, limit, &mut conn).await?)
    }

    async fn close(&mut self) -> Result<(), DeliveryStoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `DSYNC_DATABASE_URL` (or the default).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date with the embedded migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
