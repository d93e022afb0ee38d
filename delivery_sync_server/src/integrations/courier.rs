use chrono::Utc;
use courier_tools::{
    ContactPoint,
    CourierApi,
    CourierApiError,
    CourierConfig,
    CourierStatusUpdate,
    CreateDeliveryRequest,
    DeliveryOrderDetails,
};
use delivery_sync_engine::{
    db_types::{CancellationInfo, Coordinates, DeliveryOtps, Order, RiderInfo},
    events::{EventHandlers, EventHooks, RiderDroppedEvent},
    traits::{ContactDetails, CourierGateway, CourierGatewayError, CourierReceipt, DispatchDetails, TrackingReport},
};
use futures::future::BoxFuture;
use log::*;

pub const COURIER_EVENT_BUFFER_SIZE: usize = 25;

/// The courier platform, as seen by the engine.
#[derive(Clone)]
pub struct CourierClient {
    api: CourierApi,
}

impl CourierClient {
    pub fn new(config: CourierConfig) -> Result<Self, CourierApiError> {
        let api = CourierApi::new(config)?;
        Ok(Self { api })
    }

    pub fn api(&self) -> &CourierApi {
        &self.api
    }
}

impl CourierGateway for CourierClient {
    async fn create_delivery_request(
        &self,
        order: &Order,
        dispatch: &DispatchDetails,
    ) -> Result<CourierReceipt, CourierGatewayError> {
        let request = new_delivery_request(order, dispatch);
        let response = self.api.create_delivery(&request).await.map_err(gateway_error)?;
        Ok(CourierReceipt {
            external_id: response.external_id,
            status: response.status,
            raw_response: response.raw.to_string(),
        })
    }

    async fn track_delivery(&self, reference: &str) -> Result<Option<TrackingReport>, CourierGatewayError> {
        let update = self.api.track_delivery(reference).await.map_err(gateway_error)?;
        Ok(update.map(tracking_report_from_update))
    }

    async fn cancel_delivery_request(&self, external_id: &str, reason: &str) -> Result<bool, CourierGatewayError> {
        self.api.cancel_delivery(external_id, reason).await.map_err(gateway_error)
    }
}

pub fn gateway_error(e: CourierApiError) -> CourierGatewayError {
    match e {
        CourierApiError::Timeout => CourierGatewayError::Timeout,
        CourierApiError::RestRequestError(s) | CourierApiError::RestResponseError(s) => {
            CourierGatewayError::Unavailable(s)
        },
        CourierApiError::QueryError { status, message } if status >= 500 => {
            CourierGatewayError::Unavailable(format!("Error {status}. {message}"))
        },
        CourierApiError::QueryError { status, message } => {
            CourierGatewayError::Rejected(format!("Error {status}. {message}"))
        },
        CourierApiError::JsonError(s) => CourierGatewayError::InvalidResponse(s),
        e @ CourierApiError::MissingField(_) => CourierGatewayError::InvalidResponse(e.to_string()),
        e @ CourierApiError::Initialization(_) => CourierGatewayError::Unavailable(e.to_string()),
    }
}

/// Converts a parsed courier payload (webhook or tracking response) into the engine's view of it.
pub fn tracking_report_from_update(update: CourierStatusUpdate) -> TrackingReport {
    let coordinates = match (update.rider.latitude, update.rider.longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
        _ => None,
    };
    TrackingReport {
        courier_delivery_id: update.courier_order_id,
        client_order_number: update.client_order_id,
        raw_status: update.status.unwrap_or_default(),
        rider: RiderInfo { name: update.rider.name, phone: update.rider.phone },
        coordinates,
        otps: DeliveryOtps { pickup: update.pickup_otp, delivery: update.delivery_otp },
        cancellation: CancellationInfo { reason: update.cancel_reason, cancelled_by: update.cancelled_by },
        reported_at: update.event_time,
    }
}

pub fn new_delivery_request(order: &Order, dispatch: &DispatchDetails) -> CreateDeliveryRequest {
    CreateDeliveryRequest {
        pickup_details: contact_point(&dispatch.pickup),
        drop_details: contact_point(&dispatch.drop),
        order_details: DeliveryOrderDetails {
            client_order_id: order.order_number.as_str().to_string(),
            order_value: dispatch.order_value,
            paid: dispatch.paid,
            notes: dispatch.notes.clone(),
        },
    }
}

fn contact_point(contact: &ContactDetails) -> ContactPoint {
    ContactPoint {
        name: contact.name.clone(),
        contact_number: contact.phone.clone(),
        address: contact.address.clone(),
        latitude: contact.latitude,
        longitude: contact.longitude,
    }
}

/// Assigns event handlers that act on the courier platform.
///
/// 1. RiderDroppedEvent - When the courier un-assigns a rider before pickup, the stale courier request is cancelled so
///    that it cannot be picked up again by a different rider while a fresh dispatch is being arranged. This is best
///    effort. A failure is logged and the local state is left as it is.
pub fn create_courier_event_handlers(client: CourierClient) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_rider_dropped(move |ev| {
        let RiderDroppedEvent { order, previous_status, .. } = &ev;
        let Some(external_id) = ev.external_id().map(|s| s.to_string()) else {
            warn!(
                "🛵️ A rider was dropped from order {}, but it has no courier id. Nothing to cancel.",
                order.order_number
            );
            return no_op();
        };
        let order_number = order.order_number.clone();
        let reason = format!("Rider dropped after {previous_status} at {}", Utc::now().to_rfc3339());
        let client = client.clone();
        info!("🛵️ Rider dropped from order {order_number}. Cancelling courier request {external_id}.");
        Box::pin(async move {
            match client.cancel_delivery_request(&external_id, &reason).await {
                Ok(true) => info!("🛵️ Courier request {external_id} for order {order_number} has been cancelled"),
                Ok(false) => warn!("🛵️ The courier did not confirm the cancellation of {external_id} ({order_number})"),
                Err(e) => error!("🛵️ Could not cancel courier request {external_id} for order {order_number}. {e}"),
            }
        })
    });
    EventHandlers::new(COURIER_EVENT_BUFFER_SIZE, hooks)
}

pub(crate) fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
