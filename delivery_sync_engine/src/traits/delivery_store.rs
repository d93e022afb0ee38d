use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{Delivery, HistoryEntry, NewDelivery, NewOrder, Order, OrderNumber, OrderStatusType},
    traits::data_objects::DeliveryUpdate,
};

#[derive(Debug, Clone, Error)]
pub enum DeliveryStoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderIdNotFound(i64),
    #[error("The requested delivery (internal id {0}) does not exist")]
    DeliveryNotFound(i64),
    #[error("Order {0} already has a delivery")]
    DeliveryAlreadyExists(i64),
    #[error("Cannot insert order, since it already exists: {0}")]
    OrderAlreadyExists(OrderNumber),
    #[error("Delivery {delivery_id} was modified concurrently. Expected version {expected_version}")]
    StaleWrite { delivery_id: i64, expected_version: i64 },
}

impl From<sqlx::Error> for DeliveryStoreError {
    fn from(e: sqlx::Error) -> Self {
        DeliveryStoreError::DatabaseError(e.to_string())
    }
}

/// The persisted record of orders and their deliveries.
///
/// Orders are owned by the order-creation flow; this store only ever moves their status forward at delivery
/// milestones. Deliveries are one-to-one with orders and are never deleted.
#[allow(async_fn_in_trait)]
pub trait DeliveryStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, DeliveryStoreError>;

    async fn fetch_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>, DeliveryStoreError>;

    /// Stores a new order. Fails with [`DeliveryStoreError::OrderAlreadyExists`] if the order number is taken.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, DeliveryStoreError>;

    /// Unconditionally sets the order status. Callers are responsible for checking that the change is a valid
    /// milestone.
    async fn update_order_status(&self, order_id: i64, status: OrderStatusType) -> Result<Order, DeliveryStoreError>;

    async fn fetch_delivery_for_order(&self, order_id: i64) -> Result<Option<Delivery>, DeliveryStoreError>;

    async fn fetch_delivery_by_external_id(&self, external_id: &str) -> Result<Option<Delivery>, DeliveryStoreError>;

    /// The delivery's status history, oldest entry first.
    async fn fetch_history(&self, delivery_id: i64) -> Result<Vec<HistoryEntry>, DeliveryStoreError>;

    /// Creates the delivery record for an order, in `created` status, along with its first history entry. Fails with
    /// [`DeliveryStoreError::DeliveryAlreadyExists`] if the order already has one.
    async fn insert_delivery(&self, delivery: NewDelivery, entry: HistoryEntry) -> Result<Delivery, DeliveryStoreError>;

    /// In a single atomic transaction:
    /// * applies the patch to the delivery, provided its version still equals `expected_version`, and bumps the
    ///   version,
    /// * appends the history entry, if any,
    /// * sets the order status, if requested.
    ///
    /// If the version has moved on, nothing is written and [`DeliveryStoreError::StaleWrite`] is returned.
    async fn apply_delivery_update(&self, update: DeliveryUpdate) -> Result<Delivery, DeliveryStoreError>;

    /// Orders created at or after `since` whose status is not closed (delivered, completed, cancelled or rejected),
    /// oldest first, at most `limit` of them.
    async fn fetch_sweep_candidates(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Order>, DeliveryStoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), DeliveryStoreError>;
}
