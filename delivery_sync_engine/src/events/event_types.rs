use serde::{Deserialize, Serialize};

use crate::db_types::{Delivery, DeliveryStatus, Order};

/// A rider was allotted to a delivery that was still waiting for one. The vendor is told to get the order ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderAssignedEvent {
    pub order: Order,
    pub delivery: Delivery,
}

impl RiderAssignedEvent {
    pub fn new(order: Order, delivery: Delivery) -> Self {
        Self { order, delivery }
    }
}

/// The courier un-assigned a rider before pickup. The stale courier request should be cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderDroppedEvent {
    pub order: Order,
    pub delivery: Delivery,
    pub previous_status: DeliveryStatus,
}

impl RiderDroppedEvent {
    pub fn new(order: Order, delivery: Delivery, previous_status: DeliveryStatus) -> Self {
        Self { order, delivery, previous_status }
    }

    /// The courier id of the request that should be cancelled, if the courier ever acknowledged it.
    pub fn external_id(&self) -> Option<&str> {
        self.delivery.external_id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryCompletedEvent {
    pub order: Order,
    pub delivery: Delivery,
}

impl DeliveryCompletedEvent {
    pub fn new(order: Order, delivery: Delivery) -> Self {
        Self { order, delivery }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    RiderAssigned(RiderAssignedEvent),
    RiderDropped(RiderDroppedEvent),
    DeliveryCompleted(DeliveryCompletedEvent),
}
