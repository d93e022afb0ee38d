use std::{str::FromStr, time::Duration};

use cucumber::{given, then, when};
use delivery_sync_engine::{
    db_types::{DeliveryStatus, ObservationSource, OrderNumber, OrderStatusType},
    DeliveryStore,
    StatusObservation,
};

use crate::{
    cucumber::DeliveryWorld,
    support::{delivery_for, seed_delivery, seed_order},
};

#[given(expr = "order {word} has a delivery that is {word}")]
async fn order_with_delivery(world: &mut DeliveryWorld, number: String, status: String) {
    let db = world.system().await.reconciler.db().clone();
    let order = seed_order(&db, &number, OrderStatusType::Pending).await;
    let external_id = format!("SFX-{number}");
    seed_delivery(&db, &order, DeliveryStatus::from(status), Some(&external_id)).await;
}

#[given(expr = "order {word} has no delivery")]
async fn order_without_delivery(world: &mut DeliveryWorld, number: String) {
    let db = world.system().await.reconciler.db().clone();
    seed_order(&db, &number, OrderStatusType::Pending).await;
}

async fn reconcile(world: &mut DeliveryWorld, observation: StatusObservation) {
    let result = world.api().reconcile(observation).await.expect("Error reconciling observation");
    world.last_result = Some(result);
}

fn observation(source: &str, status: &str) -> StatusObservation {
    let source = match source {
        "webhook" => ObservationSource::Webhook,
        "poll" => ObservationSource::Poll,
        s => panic!("Unknown observation source: {s}"),
    };
    StatusObservation::new(source, status)
}

#[when(expr = "a {word} reports {word} for order {word}")]
async fn report_for_order(world: &mut DeliveryWorld, source: String, status: String, number: String) {
    let obs = observation(&source, &status).for_order(OrderNumber::from(number));
    reconcile(world, obs).await;
}

#[when(expr = "a {word} reports {word} for order {word} with rider {string} on {string}")]
async fn report_with_rider(
    world: &mut DeliveryWorld,
    source: String,
    status: String,
    number: String,
    name: String,
    phone: String,
) {
    let obs = observation(&source, &status).for_order(OrderNumber::from(number)).with_rider(name, phone);
    reconcile(world, obs).await;
}

#[when(expr = "a {word} reports {word} for courier id {word}")]
async fn report_for_courier_id(world: &mut DeliveryWorld, source: String, status: String, courier_id: String) {
    let obs = observation(&source, &status).for_courier_id(courier_id);
    reconcile(world, obs).await;
}

#[then(expr = "the outcome is {word}")]
async fn check_outcome(world: &mut DeliveryWorld, expected: String) {
    let result = world.last_result.as_ref().expect("Nothing has been reconciled yet");
    let outcome = serde_json::to_value(&result.outcome).expect("Outcome is not serializable");
    assert_eq!(outcome["outcome"].as_str(), Some(expected.as_str()), "Outcome was {}", result.outcome);
}

#[then(expr = "the delivery for order {word} is {word}")]
async fn check_delivery_status(world: &mut DeliveryWorld, number: String, expected: String) {
    let (_, delivery, _) = delivery_for(world.api().db(), &number).await;
    assert_eq!(delivery.status, DeliveryStatus::from(expected));
}

#[then(expr = "order {word} is {word}")]
async fn check_order_status(world: &mut DeliveryWorld, number: String, expected: String) {
    let expected = OrderStatusType::from_str(&expected).expect("Not a valid order status");
    let (order, _, _) = delivery_for(world.api().db(), &number).await;
    assert_eq!(order.status, expected);
}

#[then(expr = "the delivery for order {word} has {int} history entries")]
async fn check_history_length(world: &mut DeliveryWorld, number: String, count: usize) {
    let (_, _, history) = delivery_for(world.api().db(), &number).await;
    assert_eq!(history.len(), count, "History: {history:?}");
}

#[then(expr = "the rider for order {word} is {string} on {string}")]
async fn check_rider(world: &mut DeliveryWorld, number: String, name: String, phone: String) {
    let (_, delivery, _) = delivery_for(world.api().db(), &number).await;
    assert_eq!(delivery.rider_name, Some(name));
    assert_eq!(delivery.rider_phone, Some(phone));
}

#[then(expr = "the vendor has been notified {int} time(s)")]
async fn check_notifications(world: &mut DeliveryWorld, count: usize) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    let system = world.system.as_ref().expect("System not initialised");
    assert_eq!(system.vendor_notifications.count(), count);
}

#[then(expr = "order {word} does not exist")]
async fn check_order_missing(world: &mut DeliveryWorld, number: String) {
    let order = world.api().db().fetch_order_by_number(&OrderNumber::from(number)).await.expect("Database error");
    assert!(order.is_none());
}
