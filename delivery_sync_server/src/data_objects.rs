use delivery_sync_engine::{
    db_types::{DeliveryOtps, OrderNumber},
    reconcile_objects::{ReconcileOutcome, ReconcileResult},
    traits::DispatchDetails,
};
use serde::{Deserialize, Serialize};

/// The body of a dispatch request. `redispatch` asks for a fresh courier request when the current one has lost its
/// rider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    #[serde(flatten)]
    pub details: DispatchDetails,
    #[serde(default)]
    pub redispatch: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OtpUpdate {
    pub pickup_otp: Option<String>,
    pub delivery_otp: Option<String>,
}

impl From<OtpUpdate> for DeliveryOtps {
    fn from(value: OtpUpdate) -> Self {
        DeliveryOtps { pickup: value.pickup_otp, delivery: value.delivery_otp }
    }
}

/// What the courier webhook answers with.
///
/// `outcome` is absent when the reconciliation did not finish within the acknowledgement window. It is still running
/// in the background in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub success: bool,
    pub accepted: bool,
    pub outcome: Option<ReconcileOutcome>,
    pub order_number: Option<OrderNumber>,
}

impl WebhookAck {
    pub fn completed(result: ReconcileResult) -> Self {
        Self { success: true, accepted: true, outcome: Some(result.outcome), order_number: result.order_number }
    }

    pub fn pending() -> Self {
        Self { success: true, accepted: true, outcome: None, order_number: None }
    }

    pub fn failed() -> Self {
        Self { success: false, accepted: true, outcome: None, order_number: None }
    }
}
