//! Courier status payloads.
//!
//! The courier has changed its payload layout several times and older integrations still receive the legacy shapes.
//! Both webhooks and tracking responses carry the same fields, so a single variant parser handles them:
//!
//! * **Nested**: rider details live in a `rider_details` object (`name`, `contact_number`, `latitude`, `longitude`).
//! * **Flat**: rider details are top-level `rider_*` fields.
//!
//! Independently of the rider layout, the delivery may be identified by the courier's id (`order_id` or
//! `sfx_order_id`) and/or by our order number (`coid` or `client_order_id`).
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    helpers::{FlexibleNumber, IdValue},
    CourierApiError,
};

#[derive(Debug, Clone, Default, Deserialize)]
struct CommonFields {
    order_id: Option<IdValue>,
    sfx_order_id: Option<IdValue>,
    coid: Option<IdValue>,
    client_order_id: Option<IdValue>,
    status: Option<String>,
    order_status: Option<String>,
    current_status: Option<String>,
    pickup_otp: Option<IdValue>,
    delivery_otp: Option<IdValue>,
    drop_otp: Option<IdValue>,
    cancel_reason: Option<IdValue>,
    cancellation_reason: Option<IdValue>,
    cancelled_by: Option<IdValue>,
    timestamp: Option<IdValue>,
    event_time: Option<IdValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NestedRider {
    name: Option<IdValue>,
    rider_name: Option<IdValue>,
    contact_number: Option<IdValue>,
    phone: Option<IdValue>,
    latitude: Option<FlexibleNumber>,
    longitude: Option<FlexibleNumber>,
    lat: Option<FlexibleNumber>,
    lng: Option<FlexibleNumber>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FlatRider {
    rider_name: Option<IdValue>,
    rider_contact_number: Option<IdValue>,
    rider_contact: Option<IdValue>,
    rider_phone: Option<IdValue>,
    rider_latitude: Option<FlexibleNumber>,
    rider_longitude: Option<FlexibleNumber>,
    latitude: Option<FlexibleNumber>,
    longitude: Option<FlexibleNumber>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NestedPayload {
    #[serde(flatten)]
    common: CommonFields,
    rider_details: NestedRider,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlatPayload {
    #[serde(flatten)]
    common: CommonFields,
    #[serde(flatten)]
    rider: FlatRider,
}

#[derive(Debug, Clone)]
pub enum CourierStatusPayload {
    Nested(NestedPayload),
    Flat(FlatPayload),
}

/// Rider details as reported by the courier. Every field is optional; absent fields must never overwrite stored
/// values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourierRider {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CourierRider {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.latitude.is_none() && self.longitude.is_none()
    }
}

/// The canonical form of any courier status payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourierStatusUpdate {
    pub courier_order_id: Option<String>,
    pub client_order_id: Option<String>,
    /// The raw courier status code, untouched. `None` if the payload carried no status at all.
    pub status: Option<String>,
    pub rider: CourierRider,
    pub pickup_otp: Option<String>,
    pub delivery_otp: Option<String>,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<String>,
    pub event_time: Option<DateTime<Utc>>,
}

impl CourierStatusUpdate {
    /// A payload that names neither our order number nor the courier's id cannot be matched to anything.
    pub fn is_identifiable(&self) -> bool {
        self.courier_order_id.is_some() || self.client_order_id.is_some()
    }
}

impl CourierStatusPayload {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CourierApiError> {
        let value = serde_json::from_slice::<Value>(bytes).map_err(|e| CourierApiError::JsonError(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, CourierApiError> {
        // Tracking responses wrap the payload in a `data` envelope
        let value = match value {
            Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
                map.remove("data").unwrap_or_default()
            },
            v => v,
        };
        if !value.is_object() {
            return Err(CourierApiError::JsonError("Courier payload must be a JSON object".into()));
        }
        let nested = value.get("rider_details").is_some_and(Value::is_object);
        let result = if nested {
            serde_json::from_value::<NestedPayload>(value).map(Self::Nested)
        } else {
            serde_json::from_value::<FlatPayload>(value).map(Self::Flat)
        };
        result.map_err(|e| CourierApiError::JsonError(e.to_string()))
    }

    pub fn into_update(self) -> CourierStatusUpdate {
        let (common, rider) = match self {
            CourierStatusPayload::Nested(p) => {
                let r = p.rider_details;
                let rider = CourierRider {
                    name: id_text(r.name).or_else(|| id_text(r.rider_name)),
                    phone: id_text(r.contact_number).or_else(|| id_text(r.phone)),
                    latitude: coordinate(r.latitude).or_else(|| coordinate(r.lat)),
                    longitude: coordinate(r.longitude).or_else(|| coordinate(r.lng)),
                };
                (p.common, rider)
            },
            CourierStatusPayload::Flat(p) => {
                let r = p.rider;
                let rider = CourierRider {
                    name: id_text(r.rider_name),
                    phone: id_text(r.rider_contact_number)
                        .or_else(|| id_text(r.rider_contact))
                        .or_else(|| id_text(r.rider_phone)),
                    latitude: coordinate(r.rider_latitude).or_else(|| coordinate(r.latitude)),
                    longitude: coordinate(r.rider_longitude).or_else(|| coordinate(r.longitude)),
                };
                (p.common, rider)
            },
        };
        CourierStatusUpdate {
            courier_order_id: id_text(common.sfx_order_id).or_else(|| id_text(common.order_id)),
            client_order_id: id_text(common.coid).or_else(|| id_text(common.client_order_id)),
            // A blank status is kept as an empty string so that it can be told apart from "no status field"
            status: common
                .status
                .or(common.order_status)
                .or(common.current_status)
                .map(|s| s.trim().to_string()),
            rider,
            pickup_otp: id_text(common.pickup_otp),
            delivery_otp: id_text(common.delivery_otp).or_else(|| id_text(common.drop_otp)),
            cancel_reason: id_text(common.cancel_reason).or_else(|| id_text(common.cancellation_reason)),
            cancelled_by: id_text(common.cancelled_by),
            event_time: event_time(common.timestamp).or_else(|| event_time(common.event_time)),
        }
    }
}

fn id_text(v: Option<IdValue>) -> Option<String> {
    v.and_then(IdValue::into_non_empty)
}

fn coordinate(v: Option<FlexibleNumber>) -> Option<f64> {
    v.as_ref().and_then(FlexibleNumber::as_f64)
}

/// Event times are text, or a Unix epoch in seconds or milliseconds. Anything unreadable is dropped, and the
/// observation falls back to the time it was received.
fn event_time(v: Option<IdValue>) -> Option<DateTime<Utc>> {
    match v? {
        IdValue::Text(s) => parse_courier_time(&s),
        IdValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).and_then(from_epoch),
        IdValue::Other(_) => None,
    }
}

/// Accepts RFC 3339 timestamps, the courier's older `YYYY-MM-DD HH:MM:SS` (UTC) format, and quoted epochs.
pub fn parse_courier_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok().map(|t| t.and_utc()))
        .or_else(|| s.parse::<i64>().ok().and_then(from_epoch))
}

// Anything past the year 5138 in seconds is taken to be milliseconds
const MAX_EPOCH_SECONDS: i64 = 100_000_000_000;

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value <= 0 {
        return None;
    }
    if value < MAX_EPOCH_SECONDS {
        DateTime::from_timestamp(value, 0)
    } else {
        DateTime::from_timestamp_millis(value)
    }
}
