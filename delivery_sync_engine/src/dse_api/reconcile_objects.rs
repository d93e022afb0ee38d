use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Delivery, DeliveryPatch, DeliveryRecord, DeliveryStatus, HistoryEntry, Order, OrderNumber, OrderStatusType},
    dse_api::observation::StatusObservation,
    helpers::{history_ledger, map_courier_status},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ReconcileOutcome {
    /// The stored status moved from `from` to `to`.
    Transitioned { from: DeliveryStatus, to: DeliveryStatus },
    /// The observation carried the stored status, or no status at all.
    Unchanged,
    /// The delivery had already reached a terminal state.
    IgnoredTerminal,
    /// The observation is behind the stored status, e.g. `allotted` arriving after `picked_up`.
    IgnoredStale,
    /// No delivery matches the observation.
    NotFound,
}

impl ReconcileOutcome {
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transitioned { .. })
    }
}

impl Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transitioned { from, to } => write!(f, "transitioned ({from} -> {to})"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::IgnoredTerminal => write!(f, "ignored_terminal"),
            Self::IgnoredStale => write!(f, "ignored_stale"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileResult {
    #[serde(flatten)]
    pub outcome: ReconcileOutcome,
    pub order_number: Option<OrderNumber>,
    /// The delivery and its history as they stand after reconciliation. `None` when nothing was found.
    pub record: Option<DeliveryRecord>,
}

impl ReconcileResult {
    pub fn not_found() -> Self {
        Self { outcome: ReconcileOutcome::NotFound, order_number: None, record: None }
    }

    pub fn new(outcome: ReconcileOutcome, record: DeliveryRecord) -> Self {
        Self { outcome, order_number: Some(record.order_number.clone()), record: Some(record) }
    }

    pub fn status(&self) -> Option<&DeliveryStatus> {
        self.record.as_ref().map(|r| &r.delivery.status)
    }
}

/// What reconciling one observation against the stored delivery should do. Produced by [`plan_transition`], which
/// is pure, so that all the decision logic can be tested without a database.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub outcome: ReconcileOutcome,
    /// Field changes to persist. May be non-empty even when the status does not change (rider refresh, cancellation
    /// details).
    pub patch: DeliveryPatch,
    pub entry: Option<HistoryEntry>,
    pub order_status: Option<OrderStatusType>,
    pub rider_assigned: bool,
    pub rider_dropped: bool,
    pub delivery_completed: bool,
}

impl TransitionPlan {
    fn no_transition(outcome: ReconcileOutcome, patch: DeliveryPatch) -> Self {
        Self {
            outcome,
            patch,
            entry: None,
            order_status: None,
            rider_assigned: false,
            rider_dropped: false,
            delivery_completed: false,
        }
    }

    /// Whether anything needs to be written.
    pub fn has_writes(&self) -> bool {
        self.entry.is_some() || !self.patch.is_empty() || self.order_status.is_some()
    }
}

/// A rider who had been allotted, but had not picked up the order yet, is no longer assigned.
pub fn is_rider_drop(current: &DeliveryStatus, observed: &DeliveryStatus) -> bool {
    current.has_rider_before_pickup() && (observed.is_unassigned() || *observed == DeliveryStatus::Cancelled)
}

/// An observation is stale if it reports an earlier stage than the stored one. Rider drops are the one legitimate
/// regression. Statuses without a stage are never stale.
pub fn is_stale(current: &DeliveryStatus, observed: &DeliveryStatus) -> bool {
    if is_rider_drop(current, observed) {
        return false;
    }
    matches!((current.stage(), observed.stage()), (Some(c), Some(o)) if o < c)
}

/// The observation names a courier request that has since been replaced by a redispatch. Updates for the old request
/// describe a rider who will never carry this order.
pub fn is_superseded(delivery: &Delivery, observation: &StatusObservation) -> bool {
    matches!(
        (observation.courier_delivery_id.as_deref(), delivery.external_id.as_deref()),
        (Some(observed), Some(stored)) if observed != stored
    )
}

/// The order status that a delivery transition implies, if any.
pub fn order_milestone(current: &DeliveryStatus, observed: &DeliveryStatus) -> Option<OrderStatusType> {
    match observed {
        DeliveryStatus::Delivered => Some(OrderStatusType::Completed),
        DeliveryStatus::PickedUp => Some(OrderStatusType::OnWay),
        DeliveryStatus::Allotted if current.is_unassigned() => Some(OrderStatusType::Placed),
        _ => None,
    }
}

/// Decides what to do with an observation, given the stored order, delivery and history.
pub fn plan_transition(
    order: &Order,
    delivery: &Delivery,
    history: &[HistoryEntry],
    observation: &StatusObservation,
    now: DateTime<Utc>,
) -> TransitionPlan {
    let current = &delivery.status;
    let observed = map_courier_status(&observation.raw_status);
    // Cancellation details are kept whatever happens to the status
    let cancellation_only = DeliveryPatch::default().with_cancellation(&observation.cancellation);
    let refresh = cancellation_only
        .clone()
        .with_rider(&observation.rider)
        .with_coordinates(observation.coordinates)
        .with_otps(&observation.otps);

    if observed.is_empty() || observed == *current {
        let patch = if current.is_terminal() { cancellation_only } else { refresh };
        return TransitionPlan::no_transition(ReconcileOutcome::Unchanged, patch.without_unchanged(delivery));
    }
    if current.is_terminal() {
        return TransitionPlan::no_transition(
            ReconcileOutcome::IgnoredTerminal,
            cancellation_only.without_unchanged(delivery),
        );
    }
    if is_stale(current, &observed) {
        return TransitionPlan::no_transition(
            ReconcileOutcome::IgnoredStale,
            cancellation_only.without_unchanged(delivery),
        );
    }

    let entry = history_ledger::transition_entry(observed.clone(), observation.source, &observation.raw_status, now);
    let entry = history_ledger::stamp(history, entry);
    let order_status = order_milestone(current, &observed).filter(|s| order.status.accepts_milestone(*s));
    let rider_assigned = observed == DeliveryStatus::Allotted && current.is_unassigned();
    let rider_dropped = is_rider_drop(current, &observed);
    let delivery_completed = observed == DeliveryStatus::Delivered;
    TransitionPlan {
        outcome: ReconcileOutcome::Transitioned { from: current.clone(), to: observed.clone() },
        patch: refresh.without_unchanged(delivery).with_status(observed),
        entry: Some(entry),
        order_status,
        rider_assigned,
        rider_dropped,
        delivery_completed,
    }
}
