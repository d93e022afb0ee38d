use thiserror::Error;

use crate::{
    db_types::OrderNumber,
    traits::{CourierGatewayError, DeliveryStoreError},
};

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DeliveryStoreError),
    #[error("Delivery {delivery_id} kept changing underneath the reconciler. The observation was dropped.")]
    StaleWrite { delivery_id: i64 },
}

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DeliveryStoreError),
    #[error("Courier error: {0}")]
    CourierError(#[from] CourierGatewayError),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("Order {0} has no delivery")]
    DeliveryNotFound(OrderNumber),
    #[error("Order {0} cannot be dispatched in its current state. {1}")]
    NotDispatchable(OrderNumber, String),
    #[error("Delivery for order {0} kept changing while it was being updated")]
    StaleWrite(OrderNumber),
    #[error("Could not serialize the dispatch request. {0}")]
    SerializationError(String),
    #[error("{0}")]
    ReconcileError(#[from] ReconcileError),
}

#[derive(Debug, Clone, Error)]
pub enum TrackingError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DeliveryStoreError),
    #[error("Courier error: {0}")]
    CourierError(#[from] CourierGatewayError),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("Order {0} has no delivery")]
    DeliveryNotFound(OrderNumber),
    #[error("Order {0} cannot be tracked. {1}")]
    NotTrackable(OrderNumber, String),
    #[error("{0}")]
    ReconcileError(#[from] ReconcileError),
}
