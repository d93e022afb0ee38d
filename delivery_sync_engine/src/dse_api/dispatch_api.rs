use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Delivery, DeliveryOtps, DeliveryPatch, DeliveryRecord, DeliveryStatus, HistoryEntry, NewDelivery, Order, OrderNumber},
    dse_api::{errors::DispatchError, reconciler_api::ReconcilerApi},
    helpers::history_ledger,
    traits::{CourierGateway, DeliveryStore, DeliveryStoreError, DeliveryUpdate, DispatchDetails},
};

/// `DispatchApi` owns the start of a delivery's life: asking the courier for a rider, and recording the details the
/// vendor hands over afterwards (OTPs).
///
/// Every write takes the same per-order lock as the reconciler, so a webhook that races a dispatch request waits for
/// the dispatch to be recorded before it is applied.
pub struct DispatchApi<B, C> {
    reconciler: ReconcilerApi<B>,
    courier: C,
}

impl<B, C> Debug for DispatchApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DispatchApi")
    }
}

impl<B, C> DispatchApi<B, C> {
    pub fn new(reconciler: ReconcilerApi<B>, courier: C) -> Self {
        Self { reconciler, courier }
    }
}

impl<B, C> DispatchApi<B, C>
where
    B: DeliveryStore,
    C: CourierGateway,
{
    /// Requests a rider for the order.
    ///
    /// The delivery record is created first, in `created` status and with the request saved for auditing, so that a
    /// failed courier call leaves a trace and can simply be retried. Once the courier accepts, its delivery id and
    /// response are stored and the delivery moves to `searching_rider`.
    ///
    /// Each order gets one courier request. Calling this again for an order the courier has already acknowledged
    /// returns the existing record, unless `redispatch` is set and the delivery has no rider (e.g. after the rider was
    /// dropped), in which case a fresh request replaces the old one. Once the new request is recorded, the old one is
    /// cancelled with the courier on a best-effort basis.
    pub async fn request_dispatch(
        &self,
        order_number: &OrderNumber,
        details: DispatchDetails,
        redispatch: bool,
    ) -> Result<DeliveryRecord, DispatchError> {
        let db = self.reconciler.db();
        let order = db
            .fetch_order_by_number(order_number)
            .await?
            .ok_or_else(|| DispatchError::OrderNotFound(order_number.clone()))?;
        if order.status.is_closed() {
            return Err(DispatchError::NotDispatchable(order_number.clone(), format!("The order is {}", order.status)));
        }
        let request_payload =
            serde_json::to_string(&details).map_err(|e| DispatchError::SerializationError(e.to_string()))?;
        let _guard = self.reconciler.locks().acquire(order.id).await;
        let delivery = match db.fetch_delivery_for_order(order.id).await? {
            None => {
                let entry = HistoryEntry::new(DeliveryStatus::Created, Utc::now(), "dispatch: requested");
                let new_delivery = NewDelivery { order_id: order.id, request_payload: Some(request_payload.clone()) };
                debug!("🛵️ Creating delivery record for order {order_number}");
                db.insert_delivery(new_delivery, entry).await?
            },
            Some(d) if d.external_id.is_none() && !d.status.is_terminal() => {
                info!("🛵️ The courier never acknowledged the delivery for order {order_number}. Requesting again.");
                d
            },
            Some(d) if redispatch && d.status.is_unassigned() => {
                info!("🛵️ Re-dispatching order {order_number}, which is {} with no rider", d.status);
                d
            },
            Some(d) => {
                info!("🛵️ Order {order_number} has already been dispatched ({}). Not dispatching again.", d.status);
                return self.record_for(&order).await;
            },
        };
        let receipt = self.courier.create_delivery_request(&order, &details).await.map_err(|e| {
            warn!("🛵️ The courier did not accept the delivery request for order {order_number}. {e}");
            e
        })?;
        info!("🛵️ The courier accepted the delivery request for order {order_number} as {}", receipt.external_id);
        let history = db.fetch_history(delivery.id).await?;
        let note = match &delivery.external_id {
            Some(old) => format!("dispatch: redispatched as {} (was {old})", receipt.external_id),
            None => format!("dispatch: accepted as {}", receipt.external_id),
        };
        let entry = history_ledger::stamp(&history, HistoryEntry::new(DeliveryStatus::SearchingRider, Utc::now(), note));
        let superseded = delivery.external_id.clone().filter(|old| *old != receipt.external_id);
        let mut patch = DeliveryPatch::default()
            .with_status(DeliveryStatus::SearchingRider)
            .with_external_id(receipt.external_id)
            .with_response_payload(receipt.raw_response);
        patch.request_payload = Some(request_payload);
        let update = DeliveryUpdate::new(delivery.id, order.id, delivery.version, patch.without_unchanged(&delivery))
            .with_history(entry);
        match db.apply_delivery_update(update).await {
            Ok(_) => {
                if let Some(old) = superseded {
                    self.cancel_superseded(order_number, &old).await;
                }
                self.record_for(&order).await
            },
            Err(DeliveryStoreError::StaleWrite { .. }) => {
                error!(
                    "🛵️ The delivery for order {order_number} changed while it was being dispatched. The courier request \
                     was sent but could not be recorded."
                );
                Err(DispatchError::StaleWrite(order_number.clone()))
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Merges the pickup and delivery OTPs into the order's delivery. Missing OTPs leave the stored ones in place.
    pub async fn assign_otps(&self, order_number: &OrderNumber, otps: DeliveryOtps) -> Result<DeliveryRecord, DispatchError> {
        let db = self.reconciler.db();
        let order = db
            .fetch_order_by_number(order_number)
            .await?
            .ok_or_else(|| DispatchError::OrderNotFound(order_number.clone()))?;
        let _guard = self.reconciler.locks().acquire(order.id).await;
        let delivery = self.delivery_for(&order).await?;
        let patch = DeliveryPatch::default().with_otps(&otps).without_unchanged(&delivery);
        if patch.is_empty() {
            debug!("🛵️ OTPs for order {order_number} are unchanged");
            return self.record_for(&order).await;
        }
        let update = DeliveryUpdate::new(delivery.id, order.id, delivery.version, patch);
        match db.apply_delivery_update(update).await {
            Ok(_) => {
                info!("🛵️ OTPs assigned to the delivery for order {order_number}");
                self.record_for(&order).await
            },
            Err(DeliveryStoreError::StaleWrite { .. }) => Err(DispatchError::StaleWrite(order_number.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// The order's delivery with its full status history, oldest entry first.
    pub async fn fetch_delivery_record(&self, order_number: &OrderNumber) -> Result<DeliveryRecord, DispatchError> {
        let order = self
            .reconciler
            .db()
            .fetch_order_by_number(order_number)
            .await?
            .ok_or_else(|| DispatchError::OrderNotFound(order_number.clone()))?;
        self.record_for(&order).await
    }

    /// Asks the courier to drop a request that a redispatch replaced. Failure is logged and otherwise ignored: the
    /// reconciler already discards updates for the old request.
    async fn cancel_superseded(&self, order_number: &OrderNumber, external_id: &str) {
        let reason = format!("Order {} was redispatched", order_number.as_str());
        match self.courier.cancel_delivery_request(external_id, &reason).await {
            Ok(true) => info!("🛵️ Cancelled the replaced courier request {external_id} for order {order_number}"),
            Ok(false) => {
                warn!("🛵️ The courier declined to cancel the replaced request {external_id} for order {order_number}")
            },
            Err(e) => warn!("🛵️ Could not cancel the replaced courier request {external_id} for order {order_number}. {e}"),
        }
    }

    async fn delivery_for(&self, order: &Order) -> Result<Delivery, DispatchError> {
        self.reconciler
            .db()
            .fetch_delivery_for_order(order.id)
            .await?
            .ok_or_else(|| DispatchError::DeliveryNotFound(order.order_number.clone()))
    }

    async fn record_for(&self, order: &Order) -> Result<DeliveryRecord, DispatchError> {
        let delivery = self.delivery_for(order).await?;
        let history = self.reconciler.db().fetch_history(delivery.id).await?;
        Ok(DeliveryRecord { order_number: order.order_number.clone(), delivery, history })
    }
}
