use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Delivery, DeliveryRecord, HistoryEntry, Order, OrderNumber},
    dse_api::{
        errors::ReconcileError,
        observation::StatusObservation,
        order_locks::OrderLocks,
        reconcile_objects::{is_superseded, plan_transition, ReconcileResult, TransitionPlan},
    },
    events::{DeliveryCompletedEvent, EventProducers, EventType, RiderAssignedEvent, RiderDroppedEvent},
    helpers::history_ledger,
    traits::{DeliveryStore, DeliveryStoreError, DeliveryUpdate},
};

/// A compare-and-swap conflict is retried this many times before the observation is dropped.
const STALE_WRITE_RETRIES: usize = 1;

/// `ReconcilerApi` merges courier status observations into the stored delivery state.
///
/// Webhook deliveries and poll results for the same order may arrive in any order, any number of times. Every
/// observation goes through [`Self::reconcile`], which serialises work per order and applies the monotone transition
/// rules, so that duplicates are no-ops and late, out-of-order reports can never move a delivery backwards.
pub struct ReconcilerApi<B> {
    db: B,
    producers: EventProducers,
    locks: OrderLocks,
}

impl<B: Clone> Clone for ReconcilerApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone(), locks: self.locks.clone() }
    }
}

impl<B> Debug for ReconcilerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconcilerApi")
    }
}

impl<B> ReconcilerApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, locks: OrderLocks::new() }
    }

    /// Shares the per-order locks with other APIs that write to deliveries.
    pub fn with_locks(mut self, locks: OrderLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &OrderLocks {
        &self.locks
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> ReconcilerApi<B>
where B: DeliveryStore
{
    /// Reconciles one observation against the stored delivery.
    ///
    /// The delivery is found by the client order number if the observation carries one, falling back to the courier's
    /// delivery id. Observations that match nothing are logged and dropped with a `NotFound` outcome; they never create
    /// records. The same goes for observations about a courier request that a redispatch has replaced.
    ///
    /// Notification events are published only after the change has been committed.
    pub async fn reconcile(&self, observation: StatusObservation) -> Result<ReconcileResult, ReconcileError> {
        let Some(order_id) = self.resolve(&observation).await? else {
            warn!(
                "🔄️ No delivery matches the {} observation (order: {:?}, courier id: {:?}, status: '{}'). Dropping it.",
                observation.source,
                observation.client_order_number.as_ref().map(|n| n.as_str()),
                observation.courier_delivery_id,
                observation.raw_status
            );
            return Ok(ReconcileResult::not_found());
        };
        let _guard = self.locks.acquire(order_id).await;
        self.reconcile_locked(order_id, &observation).await
    }

    /// Reconciles an observation for an order whose lock the caller already holds.
    pub(crate) async fn reconcile_locked(
        &self,
        order_id: i64,
        observation: &StatusObservation,
    ) -> Result<ReconcileResult, ReconcileError> {
        let mut retries = 0;
        loop {
            let Some((order, delivery, history)) = self.load(order_id).await? else {
                warn!("🔄️ Order #{order_id} or its delivery disappeared during reconciliation");
                return Ok(ReconcileResult::not_found());
            };
            if is_superseded(&delivery, observation) {
                warn!(
                    "🔄️ Dropping {} observation '{}' for order {}. Courier request {:?} was replaced by {:?}.",
                    observation.source,
                    observation.raw_status,
                    order.order_number,
                    observation.courier_delivery_id,
                    delivery.external_id
                );
                return Ok(ReconcileResult::not_found());
            }
            let plan = plan_transition(&order, &delivery, &history, observation, Utc::now());
            if !plan.has_writes() {
                debug!(
                    "🔄️ {} observation '{}' for order {}: {}. Nothing to write.",
                    observation.source, observation.raw_status, order.order_number, plan.outcome
                );
                let record = DeliveryRecord { order_number: order.order_number, delivery, history };
                return Ok(ReconcileResult::new(plan.outcome, record));
            }
            let mut update = DeliveryUpdate::new(delivery.id, order.id, delivery.version, plan.patch.clone())
                .with_order_status(plan.order_status);
            if let Some(entry) = plan.entry.clone() {
                update = update.with_history(entry);
            }
            match self.db.apply_delivery_update(update).await {
                Ok(updated) => {
                    info!(
                        "🔄️ {} observation '{}' for order {}: {}",
                        observation.source, observation.raw_status, order.order_number, plan.outcome
                    );
                    return Ok(self.commit_complete(order, delivery, updated, history, plan).await);
                },
                Err(DeliveryStoreError::StaleWrite { delivery_id, expected_version }) => {
                    if retries >= STALE_WRITE_RETRIES {
                        error!(
                            "🔄️ Delivery {delivery_id} changed underneath us again (expected version \
                             {expected_version}). Giving up on this {} observation.",
                            observation.source
                        );
                        return Err(ReconcileError::StaleWrite { delivery_id });
                    }
                    retries += 1;
                    warn!("🔄️ Delivery {delivery_id} was modified concurrently. Re-reading and trying again.");
                },
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// The delivery record for an order, or `None` if the order does not exist or has no delivery.
    pub async fn fetch_record(&self, order_number: &OrderNumber) -> Result<Option<DeliveryRecord>, ReconcileError> {
        let Some(order) = self.db.fetch_order_by_number(order_number).await? else {
            return Ok(None);
        };
        Ok(self.load(order.id).await?.map(|(order, delivery, history)| DeliveryRecord {
            order_number: order.order_number,
            delivery,
            history,
        }))
    }

    async fn resolve(&self, observation: &StatusObservation) -> Result<Option<i64>, DeliveryStoreError> {
        if let Some(number) = &observation.client_order_number {
            if let Some(order) = self.db.fetch_order_by_number(number).await? {
                if self.db.fetch_delivery_for_order(order.id).await?.is_some() {
                    return Ok(Some(order.id));
                }
                trace!("🔄️ Order {number} exists but has no delivery yet");
            }
        }
        if let Some(external_id) = &observation.courier_delivery_id {
            if let Some(delivery) = self.db.fetch_delivery_by_external_id(external_id).await? {
                return Ok(Some(delivery.order_id));
            }
        }
        Ok(None)
    }

    async fn load(&self, order_id: i64) -> Result<Option<(Order, Delivery, Vec<HistoryEntry>)>, DeliveryStoreError> {
        let Some(order) = self.db.fetch_order(order_id).await? else {
            return Ok(None);
        };
        let Some(delivery) = self.db.fetch_delivery_for_order(order_id).await? else {
            return Ok(None);
        };
        let history = self.db.fetch_history(delivery.id).await?;
        Ok(Some((order, delivery, history)))
    }

    async fn commit_complete(
        &self,
        mut order: Order,
        previous: Delivery,
        updated: Delivery,
        history: Vec<HistoryEntry>,
        plan: TransitionPlan,
    ) -> ReconcileResult {
        if let Some(status) = plan.order_status {
            order.status = status;
            order.updated_at = updated.updated_at;
        }
        if plan.rider_assigned {
            debug!("🔄️ Rider assigned to order {}. Notifying subscribers", order.order_number);
            let event = RiderAssignedEvent::new(order.clone(), updated.clone());
            self.producers.publish(EventType::RiderAssigned(event)).await;
        }
        if plan.rider_dropped {
            info!("🔄️ The rider for order {} was dropped ({} -> {})", order.order_number, previous.status, updated.status);
            let event = RiderDroppedEvent::new(order.clone(), updated.clone(), previous.status.clone());
            self.producers.publish(EventType::RiderDropped(event)).await;
        }
        if plan.delivery_completed {
            let event = DeliveryCompletedEvent::new(order.clone(), updated.clone());
            self.producers.publish(EventType::DeliveryCompleted(event)).await;
        }
        let record = DeliveryRecord { order_number: order.order_number, delivery: updated, history };
        let record = match plan.entry {
            Some(entry) => history_ledger::append(record, entry),
            None => record,
        };
        ReconcileResult::new(plan.outcome, record)
    }
}
