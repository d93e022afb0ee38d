//----------------------------------------------   Courier webhook  ----------------------------------------------------
use actix_web::{web, HttpRequest, HttpResponse};
use courier_tools::CourierStatusPayload;
use delivery_sync_engine::{
    db_types::ObservationSource,
    traits::DeliveryStore,
    ReconcilerApi,
    StatusObservation,
};
use log::*;

use crate::{
    config::ServerOptions,
    data_objects::WebhookAck,
    errors::ServerError,
    integrations::courier::tracking_report_from_update,
    route,
};

/// Parses a courier webhook body, in any of the payload shapes the courier has used, into an observation.
pub fn observation_from_webhook(body: &[u8]) -> Result<StatusObservation, ServerError> {
    let payload = CourierStatusPayload::from_slice(body).map_err(|e| {
        warn!("📬️ Could not parse courier webhook payload. {e}");
        ServerError::CouldNotDeserializePayload(e.to_string())
    })?;
    let report = tracking_report_from_update(payload.into_update());
    Ok(StatusObservation::from_report(ObservationSource::Webhook, report))
}

// The scope this is mounted in supplies the `/delivery-events` prefix
route!(courier_webhook => Post "" impl DeliveryStore);
/// Receives courier status updates.
///
/// Any payload that can be parsed is acknowledged with a 200, even when it matches no delivery, since the courier
/// would otherwise keep retrying it. Only unparsable payloads get a 400.
///
/// The reconciliation runs on its own task. If it has not finished within the acknowledgement window, the courier
/// gets an `accepted` response and the task carries on in the background.
pub async fn courier_webhook<B: DeliveryStore + 'static>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<ReconcilerApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    trace!("📬️ Received courier webhook: {}", req.uri());
    let observation = observation_from_webhook(&body)?;
    debug!(
        "📬️ Courier webhook for order {:?} (courier id {:?}): '{}'",
        observation.client_order_number.as_ref().map(|n| n.as_str()),
        observation.courier_delivery_id,
        observation.raw_status
    );
    let api = api.into_inner();
    let task = actix_web::rt::spawn(async move {
        let result = api.reconcile(observation).await;
        match &result {
            Ok(r) => debug!("📬️ Webhook reconciliation complete: {}", r.outcome),
            Err(e) => error!("📬️ Webhook reconciliation failed. {e}"),
        }
        result
    });
    let ack = match tokio::time::timeout(options.webhook_ack_timeout, task).await {
        Ok(Ok(Ok(result))) => WebhookAck::completed(result),
        Ok(Ok(Err(_))) => WebhookAck::failed(),
        Ok(Err(e)) => {
            error!("📬️ Webhook reconciliation task did not complete. {e}");
            WebhookAck::failed()
        },
        Err(_) => {
            info!(
                "📬️ Reconciliation is taking longer than {}ms. Acknowledging the webhook and carrying on in the \
                 background.",
                options.webhook_ack_timeout.as_millis()
            );
            WebhookAck::pending()
        },
    };
    Ok(HttpResponse::Ok().json(ack))
}
