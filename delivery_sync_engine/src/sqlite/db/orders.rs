use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderNumber, OrderStatusType},
    traits::DeliveryStoreError,
};

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, DeliveryStoreError> {
    if fetch_order_by_number(&order.order_number, conn).await?.is_some() {
        return Err(DeliveryStoreError::OrderAlreadyExists(order.order_number));
    }
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (order_number, vendor_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order.order_number)
    .bind(order.vendor_id)
    .bind(order.status)
    .bind(order.created_at)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order {} inserted with id {}", order.order_number, order.id);
    Ok(order)
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_number(
    order_number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(order_number.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn update_order_status(
    id: i64,
    status: OrderStatusType,
    updated_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, DeliveryStoreError> {
    let order: Option<Order> = sqlx::query_as("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(status)
        .bind(updated_at)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    let order = order.ok_or(DeliveryStoreError::OrderIdNotFound(id))?;
    trace!("🗃️ Order {} status set to {status}", order.order_number);
    Ok(order)
}

/// Fetches the orders that the poll sweeper should look at: created at or after `since`, and not in one of the
/// closed statuses. Oldest first.
pub async fn fetch_open_orders_since(
    since: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders WHERE status NOT IN (");
    let mut statuses = builder.separated(", ");
    for status in OrderStatusType::closed_statuses() {
        statuses.push_bind(status.as_str());
    }
    builder.push(") AND created_at >= ");
    builder.push_bind(since);
    builder.push(" ORDER BY created_at ASC LIMIT ");
    builder.push_bind(limit);
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    Ok(orders)
}
