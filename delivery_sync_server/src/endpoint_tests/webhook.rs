use std::time::Duration;

use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use delivery_sync_engine::{
    db_types::{DeliveryPatch, DeliveryStatus, HistoryEntry, NewDelivery, NewOrder, Order, OrderNumber, OrderStatusType},
    events::EventProducers,
    reconcile_objects::ReconcileOutcome,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{DeliveryStore, DeliveryUpdate},
    ReconcilerApi,
    SqliteDatabase,
};
use serde_json::json;

use super::{helpers::post_request, mocks::MockStore};
use crate::{config::ServerOptions, courier_routes::CourierWebhookRoute, data_objects::WebhookAck};

#[actix_web::test]
async fn malformed_payload() {
    let _ = env_logger::try_init().ok();
    let api = ReconcilerApi::new(MockStore::new(), EventProducers::default());
    let (status, body) =
        post_request("/delivery-events", "{ not json", webhook_config(api, ACK)).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("\"error\""), "Unexpected body: {body}");
    let api = ReconcilerApi::new(MockStore::new(), EventProducers::default());
    let (status, _) = post_request("/delivery-events", "[\"ALLOTTED\"]", webhook_config(api, ACK)).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unmatched_payload_is_acknowledged() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_number().returning(|_| Ok(None));
    store.expect_fetch_delivery_by_external_id().returning(|_| Ok(None));
    let api = ReconcilerApi::new(store, EventProducers::default());
    let payload = json!({ "sfx_order_id": "SFX-404", "client_order_id": "NOPE", "order_status": "ALLOTTED" });
    let (status, body) =
        post_request("/delivery-events", &payload.to_string(), webhook_config(api, ACK)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let ack: WebhookAck = serde_json::from_str(&body).expect("Body is not a webhook ack");
    assert!(ack.success);
    assert_eq!(ack.outcome, Some(ReconcileOutcome::NotFound));
    assert!(ack.order_number.is_none());
}

#[actix_web::test]
async fn webhook_moves_delivery_forward() {
    let api = new_reconciler().await;
    let order = seed(api.db(), "GZ001", "SFX-1").await;
    let payload = json!({
        "sfx_order_id": "SFX-1",
        "client_order_id": "GZ001",
        "order_status": "ALLOTTED",
        "rider_details": { "name": "Ravi", "contact_number": "9876543210", "latitude": 12.97, "longitude": 77.59 }
    })
    .to_string();
    let (status, body) =
        post_request("/delivery-events", &payload, webhook_config(api.clone(), ACK)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let ack: WebhookAck = serde_json::from_str(&body).expect("Body is not a webhook ack");
    assert_eq!(
        ack.outcome,
        Some(ReconcileOutcome::Transitioned { from: DeliveryStatus::SearchingRider, to: DeliveryStatus::Allotted })
    );
    assert_eq!(ack.order_number, Some(order.order_number.clone()));

    // The courier retries the same webhook
    let (status, body) =
        post_request("/delivery-events", &payload, webhook_config(api.clone(), ACK)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let ack: WebhookAck = serde_json::from_str(&body).expect("Body is not a webhook ack");
    assert_eq!(ack.outcome, Some(ReconcileOutcome::Unchanged));

    let record = api.fetch_record(&order.order_number).await.expect("Error fetching record").expect("No record");
    assert_eq!(record.delivery.status, DeliveryStatus::Allotted);
    assert_eq!(record.delivery.rider_name.as_deref(), Some("Ravi"));
    assert_eq!(record.delivery.rider_phone.as_deref(), Some("9876543210"));
    let statuses = record.history.iter().map(|e| e.status.clone()).collect::<Vec<_>>();
    assert_eq!(statuses, vec![DeliveryStatus::Created, DeliveryStatus::SearchingRider, DeliveryStatus::Allotted]);
}

#[actix_web::test]
async fn loosely_typed_webhook_still_moves_the_delivery() {
    let api = new_reconciler().await;
    let order = seed(api.db(), "GZ003", "SFX-3").await;
    let payload = json!({
        "coid": "GZ003",
        "status": "ALLOTTED",
        "timestamp": 1714557300,
        "cancel_reason": 0,
        "rider_details": { "name": "Ravi", "contact_number": 9876543210.0 }
    })
    .to_string();
    let (status, body) =
        post_request("/delivery-events", &payload, webhook_config(api.clone(), ACK)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let ack: WebhookAck = serde_json::from_str(&body).expect("Body is not a webhook ack");
    assert_eq!(
        ack.outcome,
        Some(ReconcileOutcome::Transitioned { from: DeliveryStatus::SearchingRider, to: DeliveryStatus::Allotted })
    );
    let record = api.fetch_record(&order.order_number).await.expect("Error fetching record").expect("No record");
    assert_eq!(record.delivery.rider_phone.as_deref(), Some("9876543210"));
}

#[actix_web::test]
async fn stale_webhook_is_ignored() {
    let api = new_reconciler().await;
    let order = seed(api.db(), "GZ002", "SFX-2").await;
    let collected = json!({ "order_id": "SFX-2", "status": "COLLECTED" }).to_string();
    let (status, _) =
        post_request("/delivery-events", &collected, webhook_config(api.clone(), ACK)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    // Only the courier's id identifies this one
    let late = json!({ "order_id": "SFX-2", "status": "ALLOTTED" }).to_string();
    let (status, body) =
        post_request("/delivery-events", &late, webhook_config(api.clone(), ACK)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let ack: WebhookAck = serde_json::from_str(&body).expect("Body is not a webhook ack");
    assert_eq!(ack.outcome, Some(ReconcileOutcome::IgnoredStale));
    let record = api.fetch_record(&order.order_number).await.expect("Error fetching record").expect("No record");
    assert_eq!(record.delivery.status, DeliveryStatus::PickedUp);
}

#[actix_web::test]
async fn slow_reconciliation_is_acknowledged_and_finishes_in_the_background() {
    let api = new_reconciler().await;
    let order = seed(api.db(), "GZ003", "SFX-3").await;
    // Hold the order's lock so that the webhook's reconciliation has to wait
    let guard = api.locks().acquire(order.id).await;
    let payload = json!({ "client_order_id": "GZ003", "order_status": "ALLOTTED" }).to_string();
    let (status, body) = post_request("/delivery-events", &payload, webhook_config(api.clone(), Duration::from_millis(50)))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let ack: WebhookAck = serde_json::from_str(&body).expect("Body is not a webhook ack");
    assert!(ack.success);
    assert!(ack.accepted);
    assert!(ack.outcome.is_none());
    let record = api.fetch_record(&order.order_number).await.expect("Error fetching record").expect("No record");
    assert_eq!(record.delivery.status, DeliveryStatus::SearchingRider);

    drop(guard);
    let mut status = DeliveryStatus::SearchingRider;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let record = api.fetch_record(&order.order_number).await.expect("Error fetching record").expect("No record");
        status = record.delivery.status;
        if status == DeliveryStatus::Allotted {
            break;
        }
    }
    assert_eq!(status, DeliveryStatus::Allotted);
}

const ACK: Duration = Duration::from_secs(5);

fn webhook_config<B: DeliveryStore + 'static>(api: ReconcilerApi<B>, ack: Duration) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let options = ServerOptions { webhook_ack_timeout: ack, ..Default::default() };
        cfg.app_data(web::Data::new(api))
            .app_data(web::Data::new(options))
            .service(web::scope("/delivery-events").service(CourierWebhookRoute::<B>::new()));
    }
}

async fn new_reconciler() -> ReconcilerApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    ReconcilerApi::new(db, EventProducers::default())
}

/// A placed order whose delivery the courier has acknowledged and is finding a rider for.
async fn seed(db: &SqliteDatabase, number: &str, external_id: &str) -> Order {
    let order = NewOrder::new(OrderNumber::from(number), "kitchen-42").with_status(OrderStatusType::Placed);
    let order = db.insert_order(order).await.expect("Error inserting order");
    let requested = HistoryEntry::new(DeliveryStatus::Created, Utc::now(), "dispatch: requested");
    let delivery = db
        .insert_delivery(NewDelivery { order_id: order.id, request_payload: None }, requested)
        .await
        .expect("Error inserting delivery");
    let patch = DeliveryPatch::default().with_status(DeliveryStatus::SearchingRider).with_external_id(external_id);
    let update = DeliveryUpdate::new(delivery.id, order.id, delivery.version, patch)
        .with_history(HistoryEntry::new(DeliveryStatus::SearchingRider, Utc::now(), "dispatch: accepted"));
    db.apply_delivery_update(update).await.expect("Error seeding delivery");
    order
}
