use chrono::{DateTime, Duration, Utc};
use delivery_sync_engine::{
    db_types::{Delivery, DeliveryStatus, HistoryEntry, NewDelivery, NewOrder, Order, OrderNumber, OrderStatusType},
    traits::{
        CourierGateway,
        CourierGatewayError,
        CourierReceipt,
        DeliveryStore,
        DeliveryStoreError,
        DeliveryUpdate,
        DispatchDetails,
        TrackingReport,
    },
};
use mockall::mock;

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

pub fn order(id: i64, number: &str) -> Order {
    let created_at = Utc::now() - Duration::minutes(30);
    Order {
        id,
        order_number: OrderNumber::from(number),
        vendor_id: "kitchen-42".into(),
        status: OrderStatusType::Placed,
        created_at,
        updated_at: created_at,
    }
}

pub fn delivery(order_id: i64, status: DeliveryStatus, external_id: Option<&str>) -> Delivery {
    let created_at = Utc::now() - Duration::minutes(20);
    Delivery {
        id: order_id * 10,
        order_id,
        external_id: external_id.map(String::from),
        status,
        rider_name: Some("Ravi".into()),
        rider_phone: Some("9876543210".into()),
        rider_latitude: None,
        rider_longitude: None,
        pickup_otp: None,
        delivery_otp: None,
        cancellation_reason: None,
        cancelled_by: None,
        request_payload: None,
        response_payload: None,
        version: 2,
        created_at,
        updated_at: Utc::now() - Duration::minutes(5),
    }
}

pub fn history() -> Vec<HistoryEntry> {
    let now = Utc::now();
    vec![
        HistoryEntry::new(DeliveryStatus::Created, now - Duration::minutes(20), "dispatch: requested"),
        HistoryEntry::new(DeliveryStatus::Allotted, now - Duration::minutes(5), "webhook: ALLOTTED"),
    ]
}
