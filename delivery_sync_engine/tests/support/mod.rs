#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use delivery_sync_engine::{
    db_types::{Delivery, DeliveryPatch, DeliveryStatus, HistoryEntry, NewDelivery, NewOrder, Order, OrderNumber, OrderStatusType},
    traits::{
        CourierGateway,
        CourierGatewayError,
        CourierReceipt,
        DeliveryStoreError,
        DeliveryUpdate,
        DispatchDetails,
        TrackingReport,
    },
    DeliveryStore,
    SqliteDatabase,
};
use log::*;
use mockall::mock;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/dsync_it_{}.db", dir.display(), rand::random::<u64>())
}

/// A fresh, migrated database in the temp directory.
pub async fn new_database() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_path();
    Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Failed to remove database {url}: {e}");
    }
}

pub async fn seed_order(db: &SqliteDatabase, number: &str, status: OrderStatusType) -> Order {
    let order = NewOrder::new(OrderNumber::from(number), "kitchen-42").with_status(status);
    db.insert_order(order).await.expect("Error inserting order")
}

/// Creates a delivery for the order and moves it straight to `status`, with the given courier id.
pub async fn seed_delivery(
    db: &SqliteDatabase,
    order: &Order,
    status: DeliveryStatus,
    external_id: Option<&str>,
) -> Delivery {
    let entry = HistoryEntry::new(DeliveryStatus::Created, Utc::now(), "dispatch: requested");
    let new_delivery = NewDelivery { order_id: order.id, request_payload: None };
    let delivery = db.insert_delivery(new_delivery, entry).await.expect("Error inserting delivery");
    if status == DeliveryStatus::Created && external_id.is_none() {
        return delivery;
    }
    let mut patch = DeliveryPatch::default().with_status(status.clone());
    if let Some(id) = external_id {
        patch = patch.with_external_id(id);
    }
    let update = DeliveryUpdate::new(delivery.id, order.id, delivery.version, patch.without_unchanged(&delivery))
        .with_history(HistoryEntry::new(status, Utc::now(), "seeded"));
    db.apply_delivery_update(update).await.expect("Error seeding delivery status")
}

pub async fn delivery_for(db: &SqliteDatabase, number: &str) -> (Order, Delivery, Vec<HistoryEntry>) {
    let order = db
        .fetch_order_by_number(&OrderNumber::from(number))
        .await
        .expect("Error fetching order")
        .expect("Order does not exist");
    let delivery =
        db.fetch_delivery_for_order(order.id).await.expect("Error fetching delivery").expect("Delivery does not exist");
    let history = db.fetch_history(delivery.id).await.expect("Error fetching history");
    (order, delivery, history)
}

/// Counts hook invocations.
#[derive(Debug, Default, Clone)]
pub struct HookCalled {
    called: Arc<AtomicUsize>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.called.load(Ordering::SeqCst)
    }
}

mock! {
    pub Store {}
    impl Clone for Store {
        fn clone(&self) -> Self;
    }
    impl DeliveryStore for Store {
        fn url(&self) -> &str;
        async fn fetch_order(&self, id: i64) -> Result<Option<Order>, DeliveryStoreError>;
        async fn fetch_order_by_number(&self, order_number: &OrderNumber) -> Result<Option<Order>, DeliveryStoreError>;
        async fn insert_order(&self, order: NewOrder) -> Result<Order, DeliveryStoreError>;
        async fn update_order_status(&self, order_id: i64, status: OrderStatusType) -> Result<Order, DeliveryStoreError>;
        async fn fetch_delivery_for_order(&self, order_id: i64) -> Result<Option<Delivery>, DeliveryStoreError>;
        async fn fetch_delivery_by_external_id(&self, external_id: &str) -> Result<Option<Delivery>, DeliveryStoreError>;
        async fn fetch_history(&self, delivery_id: i64) -> Result<Vec<HistoryEntry>, DeliveryStoreError>;
        async fn insert_delivery(&self, delivery: NewDelivery, entry: HistoryEntry) -> Result<Delivery, DeliveryStoreError>;
        async fn apply_delivery_update(&self, update: DeliveryUpdate) -> Result<Delivery, DeliveryStoreError>;
        async fn fetch_sweep_candidates(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Order>, DeliveryStoreError>;
        async fn close(&mut self) -> Result<(), DeliveryStoreError>;
    }
}

mock! {
    pub Courier {}
    impl CourierGateway for Courier {
        async fn create_delivery_request(&self, order: &Order, dispatch: &DispatchDetails) -> Result<CourierReceipt, CourierGatewayError>;
        async fn track_delivery(&self, reference: &str) -> Result<Option<TrackingReport>, CourierGatewayError>;
        async fn cancel_delivery_request(&self, external_id: &str, reason: &str) -> Result<bool, CourierGatewayError>;
    }
}

pub fn report(status: &str) -> TrackingReport {
    TrackingReport { raw_status: status.to_string(), reported_at: Some(Utc::now()), ..Default::default() }
}
