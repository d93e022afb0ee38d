use actix_web::{http::StatusCode, web, web::ServiceConfig};
use delivery_sync_engine::{
    db_types::{DeliveryRecord, DeliveryStatus},
    events::EventProducers,
    sweep_objects::SweepConfig,
    traits::CourierGatewayError,
    DispatchApi,
    ReconcilerApi,
    TrackingApi,
};

use super::{
    helpers::{get_request, post_request},
    mocks::{delivery, history, order, MockCourier, MockStore},
};
use crate::routes::{health, AssignOtpsRoute, DeliveryRecordRoute, DispatchDeliveryRoute, TrackDeliveryRoute};

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/health", |cfg: &mut ServiceConfig| {
        cfg.service(health);
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn fetch_delivery_record() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request("/delivery/GZ001", dispatch_config(existing_delivery(), MockCourier::new())).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let record: DeliveryRecord = serde_json::from_str(&body).expect("Body is not a delivery record");
    assert_eq!(record.order_number.as_str(), "GZ001");
    assert_eq!(record.delivery.status, DeliveryStatus::Allotted);
    assert_eq!(record.delivery.external_id.as_deref(), Some("SFX-1"));
    let statuses = record.history.iter().map(|e| e.status.clone()).collect::<Vec<_>>();
    assert_eq!(statuses, vec![DeliveryStatus::Created, DeliveryStatus::Allotted]);
}

#[actix_web::test]
async fn fetch_unknown_delivery_record() {
    let _ = env_logger::try_init().ok();
    let mut store = MockStore::new();
    store.expect_fetch_order_by_number().returning(|_| Ok(None));
    let (status, body) =
        get_request("/delivery/NOPE", dispatch_config(store, MockCourier::new())).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("\"error\""), "Unexpected body: {body}");
    assert!(body.contains("NOPE"), "Unexpected body: {body}");
}

#[actix_web::test]
async fn otp_update_needs_at_least_one_otp() {
    let _ = env_logger::try_init().ok();
    // The store has no expectations, so any database access fails the test
    let (status, body) = post_request("/delivery/GZ001/otps", "{}", dispatch_config(MockStore::new(), MockCourier::new()))
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("pickup_otp"), "Unexpected body: {body}");
}

#[actix_web::test]
async fn dispatch_needs_a_valid_body() {
    let _ = env_logger::try_init().ok();
    let (status, _) =
        post_request("/delivery/GZ001/dispatch", "[1, 2, 3]", dispatch_config(MockStore::new(), MockCourier::new()))
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn track_when_courier_is_down() {
    let _ = env_logger::try_init().ok();
    let mut courier = MockCourier::new();
    courier
        .expect_track_delivery()
        .times(1)
        .returning(|_| Err(CourierGatewayError::Unavailable("Connection refused".into())));
    let (status, body) =
        post_request("/delivery/GZ001/track", "", tracking_config(existing_delivery(), courier)).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("Connection refused"), "Unexpected body: {body}");
}

#[actix_web::test]
async fn track_when_courier_is_slow() {
    let _ = env_logger::try_init().ok();
    let mut courier = MockCourier::new();
    courier.expect_track_delivery().times(1).returning(|_| Err(CourierGatewayError::Timeout));
    let (status, _) =
        post_request("/delivery/GZ001/track", "", tracking_config(existing_delivery(), courier)).await.expect("Request failed");
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
}

/// Order GZ001 with an allotted delivery, known to the courier as SFX-1.
fn existing_delivery() -> MockStore {
    let mut store = MockStore::new();
    store
        .expect_fetch_order_by_number()
        .returning(|number| Ok((number.as_str() == "GZ001").then(|| order(1, "GZ001"))));
    store
        .expect_fetch_delivery_for_order()
        .returning(|id| Ok(Some(delivery(id, DeliveryStatus::Allotted, Some("SFX-1")))));
    store.expect_fetch_history().returning(|_| Ok(history()));
    store
}

fn dispatch_config(store: MockStore, courier: MockCourier) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = DispatchApi::new(ReconcilerApi::new(store, EventProducers::default()), courier);
        cfg.app_data(web::Data::new(api))
            .service(DeliveryRecordRoute::<MockStore, MockCourier>::new())
            .service(DispatchDeliveryRoute::<MockStore, MockCourier>::new())
            .service(AssignOtpsRoute::<MockStore, MockCourier>::new());
    }
}

fn tracking_config(store: MockStore, courier: MockCourier) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = TrackingApi::new(ReconcilerApi::new(store, EventProducers::default()), courier, SweepConfig::default());
        cfg.app_data(web::Data::new(api)).service(TrackDeliveryRoute::<MockStore, MockCourier>::new());
    }
}
