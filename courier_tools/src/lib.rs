mod api;
mod config;
mod error;
mod helpers;
mod webhook;

mod data_objects;

pub use api::CourierApi;
pub use config::CourierConfig;
pub use data_objects::{
    CancelDeliveryRequest,
    ContactPoint,
    CreateDeliveryRequest,
    CreateDeliveryResponse,
    DeliveryOrderDetails,
};
pub use error::CourierApiError;
pub use helpers::{FlexibleNumber, IdValue};
pub use webhook::{CourierRider, CourierStatusPayload, CourierStatusUpdate};
