//! # Backend interface contracts
//!
//! The engine never talks to a database or to the courier directly. Instead it is generic over two traits:
//!
//! * [`DeliveryStore`] is the persisted record of orders, their deliveries and each delivery's status history. Every
//!   mutation of a delivery goes through [`DeliveryStore::apply_delivery_update`], which is version-checked and atomic.
//! * [`CourierGateway`] is the narrow slice of the courier platform that the engine consumes: create a delivery
//!   request, fetch its current status, and cancel it.
mod courier_gateway;
mod data_objects;
mod delivery_store;

pub use courier_gateway::{CourierGateway, CourierGatewayError};
pub use data_objects::{ContactDetails, CourierReceipt, DeliveryUpdate, DispatchDetails, TrackingReport};
pub use delivery_store::{DeliveryStore, DeliveryStoreError};
