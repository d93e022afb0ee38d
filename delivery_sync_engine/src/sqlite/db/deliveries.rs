use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Delivery, DeliveryPatch, DeliveryStatus, NewDelivery},
    traits::DeliveryStoreError,
};

/// Inserts a new delivery, in `created` status, for the given order. Fails if the order already has a delivery.
pub async fn insert_delivery(
    delivery: NewDelivery,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Delivery, DeliveryStoreError> {
    if let Some(existing) = fetch_delivery_for_order(delivery.order_id, conn).await? {
        debug!("🗃️ Order {} already has delivery {}", delivery.order_id, existing.id);
        return Err(DeliveryStoreError::DeliveryAlreadyExists(delivery.order_id));
    }
    let delivery: Delivery = sqlx::query_as(
        r#"
            INSERT INTO deliveries (order_id, status, request_payload, version, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(delivery.order_id)
    .bind(DeliveryStatus::Created.as_str())
    .bind(delivery.request_payload)
    .bind(created_at)
    .bind(created_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Delivery {} created for order id {}", delivery.id, delivery.order_id);
    Ok(delivery)
}

pub async fn fetch_delivery(id: i64, conn: &mut SqliteConnection) -> Result<Option<Delivery>, sqlx::Error> {
    let delivery = sqlx::query_as("SELECT * FROM deliveries WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(delivery)
}

pub async fn fetch_delivery_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    let delivery =
        sqlx::query_as("SELECT * FROM deliveries WHERE order_id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(delivery)
}

pub async fn fetch_delivery_by_external_id(
    external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    let delivery = sqlx::query_as("SELECT * FROM deliveries WHERE external_id = $1")
        .bind(external_id)
        .fetch_optional(conn)
        .await?;
    Ok(delivery)
}

/// Applies the patch to the delivery if, and only if, its version is still `expected_version`. Fields that are
/// `None` in the patch keep their stored value. The version is incremented on success.
///
/// Returns `Ok(None)` if the version check failed (or the delivery does not exist).
pub async fn compare_and_update(
    id: i64,
    expected_version: i64,
    patch: DeliveryPatch,
    updated_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    let delivery: Option<Delivery> = sqlx::query_as(
        r#"
            UPDATE deliveries SET
                status              = COALESCE($1, status),
                external_id         = COALESCE($2, external_id),
                rider_name          = COALESCE($3, rider_name),
                rider_phone         = COALESCE($4, rider_phone),
                rider_latitude      = COALESCE($5, rider_latitude),
                rider_longitude     = COALESCE($6, rider_longitude),
                pickup_otp          = COALESCE($7, pickup_otp),
                delivery_otp        = COALESCE($8, delivery_otp),
                cancellation_reason = COALESCE($9, cancellation_reason),
                cancelled_by        = COALESCE($10, cancelled_by),
                request_payload     = COALESCE($11, request_payload),
                response_payload    = COALESCE($12, response_payload),
                version             = version + 1,
                updated_at          = $13
            WHERE id = $14 AND version = $15
            RETURNING *;
        "#,
    )
    .bind(patch.status.map(String::from))
    .bind(patch.external_id)
    .bind(patch.rider_name)
    .bind(patch.rider_phone)
    .bind(patch.rider_latitude)
    .bind(patch.rider_longitude)
    .bind(patch.pickup_otp)
    .bind(patch.delivery_otp)
    .bind(patch.cancellation_reason)
    .bind(patch.cancelled_by)
    .bind(patch.request_payload)
    .bind(patch.response_payload)
    .bind(updated_at)
    .bind(id)
    .bind(expected_version)
    .fetch_optional(conn)
    .await?;
    match &delivery {
        Some(d) => trace!("🗃️ Delivery {id} updated to version {}", d.version),
        None => trace!("🗃️ Delivery {id} was not at version {expected_version}. No update made"),
    }
    Ok(delivery)
}
