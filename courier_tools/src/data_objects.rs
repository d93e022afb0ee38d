use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{helpers::non_empty, CourierApiError, IdValue};

/// A pickup or drop-off point as the courier expects it.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ContactPoint {
    pub name: String,
    pub contact_number: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct DeliveryOrderDetails {
    /// Our order number. The courier echoes it back as `coid` in webhooks.
    pub client_order_id: String,
    pub order_value: f64,
    pub paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CreateDeliveryRequest {
    pub pickup_details: ContactPoint,
    pub drop_details: ContactPoint,
    pub order_details: DeliveryOrderDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelDeliveryRequest {
    pub sfx_order_id: String,
    pub cancel_reason: String,
}

/// The acknowledgement returned when a delivery request is created. `raw` is the full response body, kept for
/// auditing.
#[derive(Debug, Clone)]
pub struct CreateDeliveryResponse {
    pub external_id: String,
    pub status: Option<String>,
    pub raw: Value,
}

impl CreateDeliveryResponse {
    pub fn from_value(raw: Value) -> Result<Self, CourierApiError> {
        #[derive(Deserialize)]
        struct Ack {
            sfx_order_id: Option<IdValue>,
            order_id: Option<IdValue>,
            status: Option<String>,
        }
        let body = match raw.get("data") {
            Some(data) if data.is_object() => data.clone(),
            _ => raw.clone(),
        };
        let ack = serde_json::from_value::<Ack>(body).map_err(|e| CourierApiError::JsonError(e.to_string()))?;
        let external_id = ack
            .sfx_order_id
            .and_then(IdValue::into_non_empty)
            .or_else(|| ack.order_id.and_then(IdValue::into_non_empty))
            .ok_or(CourierApiError::MissingField("a delivery id"))?;
        Ok(Self { external_id, status: non_empty(ack.status), raw })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn create_response_with_numeric_id() {
        let raw = json!({"sfx_order_id": 8812734, "status": "CREATED", "message": "ok"});
        let ack = CreateDeliveryResponse::from_value(raw.clone()).unwrap();
        assert_eq!(ack.external_id, "8812734");
        assert_eq!(ack.status.as_deref(), Some("CREATED"));
        assert_eq!(ack.raw, raw);
    }

    #[test]
    fn create_response_wrapped_in_data() {
        let raw = json!({"data": {"order_id": "SFX-1"}});
        let ack = CreateDeliveryResponse::from_value(raw).unwrap();
        assert_eq!(ack.external_id, "SFX-1");
        assert!(ack.status.is_none());
    }

    #[test]
    fn create_response_without_id() {
        let err = CreateDeliveryResponse::from_value(json!({"status": "CREATED"})).unwrap_err();
        assert!(matches!(err, CourierApiError::MissingField(_)));
    }
}
