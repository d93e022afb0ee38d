use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{
    CancellationInfo,
    Coordinates,
    DeliveryOtps,
    DeliveryPatch,
    HistoryEntry,
    OrderStatusType,
    RiderInfo,
};

/// A version-checked change to one delivery, applied atomically by [`crate::traits::DeliveryStore`].
#[derive(Debug, Clone)]
pub struct DeliveryUpdate {
    pub delivery_id: i64,
    pub order_id: i64,
    pub expected_version: i64,
    pub patch: DeliveryPatch,
    pub history: Option<HistoryEntry>,
    pub order_status: Option<OrderStatusType>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryUpdate {
    pub fn new(delivery_id: i64, order_id: i64, expected_version: i64, patch: DeliveryPatch) -> Self {
        Self {
            delivery_id,
            order_id,
            expected_version,
            patch,
            history: None,
            order_status: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_history(mut self, entry: HistoryEntry) -> Self {
        self.updated_at = entry.timestamp;
        self.history = Some(entry);
        self
    }

    pub fn with_order_status(mut self, status: Option<OrderStatusType>) -> Self {
        self.order_status = status;
        self
    }
}

/// A pickup or drop-off point for a dispatch request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Everything the courier needs, beyond the order itself, to send a rider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchDetails {
    pub pickup: ContactDetails,
    pub drop: ContactDetails,
    pub order_value: f64,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The courier's acknowledgement of a delivery request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierReceipt {
    pub external_id: String,
    /// The status the courier reported when it accepted the request, if any.
    pub status: Option<String>,
    /// The raw response body, kept for auditing.
    pub raw_response: String,
}

/// The courier's current view of one delivery, as returned by its tracking endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingReport {
    pub courier_delivery_id: Option<String>,
    pub client_order_number: Option<String>,
    /// The raw courier status code. Empty if the courier did not report one.
    pub raw_status: String,
    pub rider: RiderInfo,
    pub coordinates: Option<Coordinates>,
    pub otps: DeliveryOtps,
    pub cancellation: CancellationInfo,
    pub reported_at: Option<DateTime<Utc>>,
}
