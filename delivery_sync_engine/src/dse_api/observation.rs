use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{CancellationInfo, Coordinates, DeliveryOtps, ObservationSource, OrderNumber, RiderInfo},
    traits::TrackingReport,
};

/// One reported status update from the courier, from either the push (webhook) or pull (poll) channel.
///
/// Observations are consumed exactly once, by [`crate::ReconcilerApi::reconcile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusObservation {
    pub source: ObservationSource,
    /// The courier's status code, exactly as received. Empty if the courier sent none.
    pub raw_status: String,
    pub courier_delivery_id: Option<String>,
    pub client_order_number: Option<OrderNumber>,
    pub rider: RiderInfo,
    pub coordinates: Option<Coordinates>,
    pub otps: DeliveryOtps,
    pub cancellation: CancellationInfo,
    pub timestamp: DateTime<Utc>,
}

impl StatusObservation {
    pub fn new<S: Into<String>>(source: ObservationSource, raw_status: S) -> Self {
        Self {
            source,
            raw_status: raw_status.into(),
            courier_delivery_id: None,
            client_order_number: None,
            rider: RiderInfo::default(),
            coordinates: None,
            otps: DeliveryOtps::default(),
            cancellation: CancellationInfo::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn from_report(source: ObservationSource, report: TrackingReport) -> Self {
        Self {
            source,
            raw_status: report.raw_status,
            courier_delivery_id: report.courier_delivery_id,
            client_order_number: report.client_order_number.map(OrderNumber::from),
            rider: report.rider,
            coordinates: report.coordinates,
            otps: report.otps,
            cancellation: report.cancellation,
            timestamp: report.reported_at.unwrap_or_else(Utc::now),
        }
    }

    pub fn for_order(mut self, order_number: OrderNumber) -> Self {
        self.client_order_number = Some(order_number);
        self
    }

    pub fn for_courier_id<S: Into<String>>(mut self, id: S) -> Self {
        self.courier_delivery_id = Some(id.into());
        self
    }

    pub fn with_rider<S: Into<String>>(mut self, name: S, phone: S) -> Self {
        self.rider = RiderInfo { name: Some(name.into()), phone: Some(phone.into()) };
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates { latitude, longitude });
        self
    }

    pub fn with_otps(mut self, otps: DeliveryOtps) -> Self {
        self.otps = otps;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationInfo) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn is_identifiable(&self) -> bool {
        self.courier_delivery_id.is_some() || self.client_order_number.is_some()
    }
}
