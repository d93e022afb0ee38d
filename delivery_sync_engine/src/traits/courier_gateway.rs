use thiserror::Error;

use crate::{
    db_types::Order,
    traits::data_objects::{CourierReceipt, DispatchDetails, TrackingReport},
};

#[derive(Debug, Clone, Error)]
pub enum CourierGatewayError {
    #[error("The courier did not respond in time")]
    Timeout,
    #[error("The courier could not be reached. {0}")]
    Unavailable(String),
    #[error("The courier rejected the request. {0}")]
    Rejected(String),
    #[error("The courier response could not be understood. {0}")]
    InvalidResponse(String),
}

impl CourierGatewayError {
    /// Transient errors are retried implicitly on the next sweep.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable(_))
    }
}

/// The slice of the courier platform that the engine consumes.
#[allow(async_fn_in_trait)]
pub trait CourierGateway {
    /// Asks the courier to find a rider for the order.
    async fn create_delivery_request(
        &self,
        order: &Order,
        dispatch: &DispatchDetails,
    ) -> Result<CourierReceipt, CourierGatewayError>;

    /// Fetches the courier's current view of a delivery. `reference` is whatever the courier account tracks
    /// deliveries by (our order number or the courier's id). `Ok(None)` means the courier knows nothing about it.
    async fn track_delivery(&self, reference: &str) -> Result<Option<TrackingReport>, CourierGatewayError>;

    /// Cancels a delivery request. Returns whether the courier confirmed the cancellation.
    async fn cancel_delivery_request(&self, external_id: &str, reason: &str) -> Result<bool, CourierGatewayError>;
}
