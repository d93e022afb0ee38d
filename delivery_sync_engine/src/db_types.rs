use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------     OrderNumber      ---------------------------------------------------------
/// The human-facing order number, e.g. `GZ001`. The courier echoes it back to us as the client order id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderNumber {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The coarse commercial lifecycle of an order. Only a handful of these are ever set by delivery reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    Pending,
    Placed,
    Confirmed,
    Preparing,
    OnWay,
    Delivered,
    Completed,
    Cancelled,
    Rejected,
}

impl OrderStatusType {
    /// Position of the status in the forward order lifecycle. `Cancelled` and `Rejected` are off the main line.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Placed => Some(1),
            Self::Confirmed => Some(2),
            Self::Preparing => Some(3),
            Self::OnWay => Some(4),
            Self::Delivered => Some(5),
            Self::Completed => Some(6),
            Self::Cancelled | Self::Rejected => None,
        }
    }

    /// Orders in these states are no longer tracked by the poll sweeper.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Delivered | Self::Completed | Self::Cancelled | Self::Rejected)
    }

    /// Whether a delivery milestone may move the order from `self` to `target`. Milestones never move an order
    /// backwards, and never resurrect a completed, cancelled or rejected order.
    pub fn accepts_milestone(&self, target: OrderStatusType) -> bool {
        matches!((self.rank(), target.rank()), (Some(current), Some(next)) if next > current)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Placed => "placed",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::OnWay => "on_way",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        }
    }

    pub fn closed_statuses() -> [OrderStatusType; 4] {
        [Self::Delivered, Self::Completed, Self::Cancelled, Self::Rejected]
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "placed" => Ok(Self::Placed),
            "confirmed" => Ok(Self::Confirmed),
            "preparing" => Ok(Self::Preparing),
            "on_way" => Ok(Self::OnWay),
            "delivered" => Ok(Self::Delivered),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "rejected" => Ok(Self::Rejected),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        Order        -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub vendor_id: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub vendor_id: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(order_number: OrderNumber, vendor_id: S) -> Self {
        Self { order_number, vendor_id: vendor_id.into(), status: OrderStatusType::Pending, created_at: Utc::now() }
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status = status;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

//--------------------------------------    DeliveryStatus     ---------------------------------------------------------
/// The internal delivery-state vocabulary.
///
/// Courier codes that don't map onto a known state are kept verbatim (lower-cased) in [`DeliveryStatus::Other`], so
/// that new courier states are recorded rather than lost.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum DeliveryStatus {
    Created,
    SearchingRider,
    Allotted,
    ReachedLocation,
    PickedUp,
    ArrivedAtDrop,
    Delivered,
    Cancelled,
    Other(String),
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::SearchingRider => "searching_rider",
            Self::Allotted => "allotted",
            Self::ReachedLocation => "reached_location",
            Self::PickedUp => "picked_up",
            Self::ArrivedAtDrop => "arrived_at_drop",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Ordinal position in the physical delivery sequence. `Cancelled` and unknown statuses have no stage.
    pub fn stage(&self) -> Option<u8> {
        match self {
            Self::Created => Some(0),
            Self::SearchingRider => Some(1),
            Self::Allotted => Some(2),
            Self::ReachedLocation => Some(3),
            Self::PickedUp => Some(4),
            Self::ArrivedAtDrop => Some(5),
            Self::Delivered => Some(6),
            Self::Cancelled | Self::Other(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// No rider is attached to the delivery.
    pub fn is_unassigned(&self) -> bool {
        match self {
            Self::Created | Self::SearchingRider => true,
            Self::Other(s) => s == "unassigned",
            _ => false,
        }
    }

    /// A rider has been allotted but has not collected the order yet.
    pub fn has_rider_before_pickup(&self) -> bool {
        matches!(self, Self::Allotted | Self::ReachedLocation)
    }

    /// An empty status carries no information.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Other(s) if s.is_empty())
    }
}

impl From<String> for DeliveryStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "created" => Self::Created,
            "searching_rider" => Self::SearchingRider,
            "allotted" => Self::Allotted,
            "reached_location" => Self::ReachedLocation,
            "picked_up" => Self::PickedUp,
            "arrived_at_drop" => Self::ArrivedAtDrop,
            "delivered" => Self::Delivered,
            "cancelled" => Self::Cancelled,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for DeliveryStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<DeliveryStatus> for String {
    fn from(value: DeliveryStatus) -> Self {
        match value {
            DeliveryStatus::Other(s) => s,
            s => s.as_str().to_string(),
        }
    }
}

impl Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//--------------------------------------   ObservationSource   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationSource {
    Webhook,
    Poll,
    Dispatch,
    Operator,
}

impl Display for ObservationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Webhook => write!(f, "webhook"),
            Self::Poll => write!(f, "poll"),
            Self::Dispatch => write!(f, "dispatch"),
            Self::Operator => write!(f, "operator"),
        }
    }
}

//--------------------------------------  Rider & OTP details  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiderInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl RiderInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOtps {
    pub pickup: Option<String>,
    pub delivery: Option<String>,
}

impl DeliveryOtps {
    pub fn is_empty(&self) -> bool {
        self.pickup.is_none() && self.delivery.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationInfo {
    pub reason: Option<String>,
    pub cancelled_by: Option<String>,
}

impl CancellationInfo {
    pub fn is_empty(&self) -> bool {
        self.reason.is_none() && self.cancelled_by.is_none()
    }
}

//--------------------------------------       Delivery        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Delivery {
    pub id: i64,
    pub order_id: i64,
    /// The courier's identifier for this delivery. `None` until the courier has acknowledged the request.
    pub external_id: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: DeliveryStatus,
    pub rider_name: Option<String>,
    pub rider_phone: Option<String>,
    pub rider_latitude: Option<f64>,
    pub rider_longitude: Option<f64>,
    pub pickup_otp: Option<String>,
    pub delivery_otp: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,
    pub request_payload: Option<String>,
    pub response_payload: Option<String>,
    /// Incremented on every write. Used for compare-and-swap updates.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    pub fn rider(&self) -> RiderInfo {
        RiderInfo { name: self.rider_name.clone(), phone: self.rider_phone.clone() }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.rider_latitude, self.rider_longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        }
    }

    pub fn otps(&self) -> DeliveryOtps {
        DeliveryOtps { pickup: self.pickup_otp.clone(), delivery: self.delivery_otp.clone() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDelivery {
    pub order_id: i64,
    pub request_payload: Option<String>,
}

/// A sparse set of changes to a delivery. `None` fields are left untouched, so a patch can never null out a value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryPatch {
    pub status: Option<DeliveryStatus>,
    pub external_id: Option<String>,
    pub rider_name: Option<String>,
    pub rider_phone: Option<String>,
    pub rider_latitude: Option<f64>,
    pub rider_longitude: Option<f64>,
    pub pickup_otp: Option<String>,
    pub delivery_otp: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,
    pub request_payload: Option<String>,
    pub response_payload: Option<String>,
}

impl DeliveryPatch {
    pub fn with_status(mut self, status: DeliveryStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_rider(mut self, rider: &RiderInfo) -> Self {
        self.rider_name = rider.name.clone();
        self.rider_phone = rider.phone.clone();
        self
    }

    pub fn with_coordinates(mut self, coordinates: Option<Coordinates>) -> Self {
        self.rider_latitude = coordinates.map(|c| c.latitude);
        self.rider_longitude = coordinates.map(|c| c.longitude);
        self
    }

    pub fn with_otps(mut self, otps: &DeliveryOtps) -> Self {
        self.pickup_otp = otps.pickup.clone();
        self.delivery_otp = otps.delivery.clone();
        self
    }

    pub fn with_cancellation(mut self, info: &CancellationInfo) -> Self {
        self.cancellation_reason = info.reason.clone();
        self.cancelled_by = info.cancelled_by.clone();
        self
    }

    pub fn with_external_id<S: Into<String>>(mut self, external_id: S) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_response_payload<S: Into<String>>(mut self, payload: S) -> Self {
        self.response_payload = Some(payload.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Drops every field whose value is already stored on `delivery`, so that an empty result means "nothing to do".
    pub fn without_unchanged(mut self, delivery: &Delivery) -> Self {
        fn keep<T: PartialEq>(new: &mut Option<T>, old: &Option<T>) {
            if new.is_some() && new == old {
                *new = None;
            }
        }
        if self.status.as_ref() == Some(&delivery.status) {
            self.status = None;
        }
        keep(&mut self.external_id, &delivery.external_id);
        keep(&mut self.rider_name, &delivery.rider_name);
        keep(&mut self.rider_phone, &delivery.rider_phone);
        keep(&mut self.rider_latitude, &delivery.rider_latitude);
        keep(&mut self.rider_longitude, &delivery.rider_longitude);
        keep(&mut self.pickup_otp, &delivery.pickup_otp);
        keep(&mut self.delivery_otp, &delivery.delivery_otp);
        keep(&mut self.cancellation_reason, &delivery.cancellation_reason);
        keep(&mut self.cancelled_by, &delivery.cancelled_by);
        keep(&mut self.request_payload, &delivery.request_payload);
        keep(&mut self.response_payload, &delivery.response_payload);
        self
    }
}

//--------------------------------------     HistoryEntry      ---------------------------------------------------------
/// One immutable record in a delivery's status history.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[sqlx(try_from = "String")]
    pub status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
    pub note: String,
}

impl HistoryEntry {
    pub fn new<S: Into<String>>(status: DeliveryStatus, timestamp: DateTime<Utc>, note: S) -> Self {
        Self { status, timestamp, note: note.into() }
    }
}

/// A delivery together with its full status history, oldest entry first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub order_number: OrderNumber,
    pub delivery: Delivery,
    pub history: Vec<HistoryEntry>,
}

impl DeliveryRecord {
    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }
}
