use std::fmt::Debug;

use chrono::Utc;
use log::*;
use tokio_util::sync::CancellationToken;

use crate::{
    db_types::{Delivery, ObservationSource, Order, OrderNumber},
    dse_api::{
        errors::TrackingError,
        observation::StatusObservation,
        reconcile_objects::{ReconcileOutcome, ReconcileResult},
        reconciler_api::ReconcilerApi,
        sweep_objects::{SweepConfig, SweepSummary, TrackBy},
    },
    traits::{CourierGateway, CourierGatewayError, DeliveryStore, TrackingReport},
};

/// `TrackingApi` pulls delivery status from the courier and feeds it to the reconciler.
///
/// It backs both the scheduled sweep over recent open orders ([`Self::sweep`]) and on-demand tracking of a single
/// order ([`Self::track_now`]). Every courier call is bounded by the configured timeout; a slow or failing call only
/// ever costs the order it was made for.
pub struct TrackingApi<B, C> {
    reconciler: ReconcilerApi<B>,
    courier: C,
    config: SweepConfig,
}

impl<B, C> Debug for TrackingApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TrackingApi ({:?})", self.config)
    }
}

impl<B, C> TrackingApi<B, C> {
    pub fn new(reconciler: ReconcilerApi<B>, courier: C, config: SweepConfig) -> Self {
        Self { reconciler, courier, config }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &ReconcilerApi<B> {
        &self.reconciler
    }
}

impl<B, C> TrackingApi<B, C>
where
    B: DeliveryStore,
    C: CourierGateway,
{
    /// Runs one sweep over the open orders created within the recency window.
    ///
    /// Orders are processed one at a time, oldest first, with the configured delay between courier calls. Failures are
    /// counted and logged, and never stop the batch. If `shutdown` is cancelled, the sweep stops between orders; an
    /// order that is already being reconciled is finished first.
    pub async fn sweep(&self, shutdown: &CancellationToken) -> Result<SweepSummary, TrackingError> {
        let since = Utc::now() - self.config.window;
        let candidates = self.reconciler.db().fetch_sweep_candidates(since, self.config.max_orders).await?;
        let mut summary = SweepSummary { selected: candidates.len(), ..Default::default() };
        debug!("🧹️ {} open orders created since {since} selected for tracking", candidates.len());
        for order in candidates {
            if shutdown.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let delivery = match self.reconciler.db().fetch_delivery_for_order(order.id).await {
                Ok(Some(d)) => d,
                Ok(None) => {
                    trace!("🧹️ Order {} has not been dispatched yet", order.order_number);
                    summary.skipped += 1;
                    continue;
                },
                Err(e) => {
                    error!("🧹️ Could not fetch the delivery for order {}. {e}", order.order_number);
                    summary.errored += 1;
                    continue;
                },
            };
            let Some(reference) = self.tracking_reference(&order, &delivery) else {
                summary.skipped += 1;
                continue;
            };
            if summary.tracked > 0 {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        summary.cancelled = true;
                        break;
                    },
                    _ = tokio::time::sleep(self.config.call_delay) => {},
                }
            }
            summary.tracked += 1;
            match self.track_and_reconcile(&order, &delivery, &reference).await {
                Ok(Some(result)) => summary.record_outcome(&result.outcome),
                Ok(None) => summary.no_update += 1,
                Err(e) => {
                    warn!("🧹️ Tracking order {} failed. {e}", order.order_number);
                    summary.errored += 1;
                },
            }
        }
        Ok(summary)
    }

    /// Tracks a single order immediately, regardless of its age, and reconciles whatever the courier reports.
    ///
    /// If the courier has nothing to say about the delivery, the current record is returned as `unchanged`.
    pub async fn track_now(&self, order_number: &OrderNumber) -> Result<ReconcileResult, TrackingError> {
        let db = self.reconciler.db();
        let order = db
            .fetch_order_by_number(order_number)
            .await?
            .ok_or_else(|| TrackingError::OrderNotFound(order_number.clone()))?;
        let delivery = db
            .fetch_delivery_for_order(order.id)
            .await?
            .ok_or_else(|| TrackingError::DeliveryNotFound(order_number.clone()))?;
        let reference = self.tracking_reference(&order, &delivery).ok_or_else(|| {
            TrackingError::NotTrackable(order_number.clone(), "The courier has not acknowledged the delivery".into())
        })?;
        match self.track_and_reconcile(&order, &delivery, &reference).await? {
            Some(result) => Ok(result),
            None => {
                let record = self
                    .reconciler
                    .fetch_record(order_number)
                    .await?
                    .ok_or_else(|| TrackingError::DeliveryNotFound(order_number.clone()))?;
                Ok(ReconcileResult::new(ReconcileOutcome::Unchanged, record))
            },
        }
    }

    /// The reference to query the courier with. Deliveries in a terminal state, or that the courier never
    /// acknowledged, are not tracked.
    fn tracking_reference(&self, order: &Order, delivery: &Delivery) -> Option<String> {
        if delivery.status.is_terminal() {
            trace!("🧹️ Delivery for order {} is already {}", order.order_number, delivery.status);
            return None;
        }
        let external_id = delivery.external_id.as_ref()?;
        match self.config.track_by {
            TrackBy::OrderNumber => Some(order.order_number.as_str().to_string()),
            TrackBy::ExternalId => Some(external_id.clone()),
        }
    }

    async fn track_and_reconcile(
        &self,
        order: &Order,
        delivery: &Delivery,
        reference: &str,
    ) -> Result<Option<ReconcileResult>, TrackingError> {
        let Some(report) = self.track(reference).await? else {
            debug!("🧹️ The courier has no update for order {} ({reference})", order.order_number);
            return Ok(None);
        };
        let mut observation =
            StatusObservation::from_report(ObservationSource::Poll, report).for_order(order.order_number.clone());
        if observation.courier_delivery_id.is_none() {
            observation.courier_delivery_id = delivery.external_id.clone();
        }
        let result = self.reconciler.reconcile(observation).await?;
        trace!("🧹️ Order {}: {}", order.order_number, result.outcome);
        Ok(Some(result))
    }

    async fn track(&self, reference: &str) -> Result<Option<TrackingReport>, CourierGatewayError> {
        match tokio::time::timeout(self.config.call_timeout, self.courier.track_delivery(reference)).await {
            Ok(result) => result,
            Err(_) => Err(CourierGatewayError::Timeout),
        }
    }
}
