use std::{fmt::Display, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dse_api::reconcile_objects::ReconcileOutcome;

pub const DEFAULT_SWEEP_MAX_ORDERS: i64 = 50;
pub const DEFAULT_SWEEP_WINDOW_HOURS: i64 = 12;
pub const DEFAULT_SWEEP_CALL_DELAY_MS: u64 = 100;
pub const DEFAULT_TRACKING_TIMEOUT_SECS: u64 = 5;

/// Which reference the courier account tracks deliveries by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackBy {
    /// Our order number, which the courier knows as the client order id.
    #[default]
    OrderNumber,
    /// The courier's own delivery id.
    ExternalId,
}

#[derive(Debug, Clone, Error)]
#[error("Invalid tracking reference type: {0}. Use 'order_number' or 'external_id'")]
pub struct TrackByParseError(String);

impl FromStr for TrackBy {
    type Err = TrackByParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "order_number" | "coid" => Ok(Self::OrderNumber),
            "external_id" | "sfx_order_id" => Ok(Self::ExternalId),
            other => Err(TrackByParseError(other.to_string())),
        }
    }
}

impl Display for TrackBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrderNumber => write!(f, "order_number"),
            Self::ExternalId => write!(f, "external_id"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// The most orders a single sweep will look at.
    pub max_orders: i64,
    /// Only orders created within this window are swept.
    pub window: chrono::Duration,
    /// Pause between consecutive courier calls, to stay inside the courier's rate limits.
    pub call_delay: Duration,
    /// Upper bound on each individual tracking call.
    pub call_timeout: Duration,
    pub track_by: TrackBy,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            max_orders: DEFAULT_SWEEP_MAX_ORDERS,
            window: chrono::Duration::hours(DEFAULT_SWEEP_WINDOW_HOURS),
            call_delay: Duration::from_millis(DEFAULT_SWEEP_CALL_DELAY_MS),
            call_timeout: Duration::from_secs(DEFAULT_TRACKING_TIMEOUT_SECS),
            track_by: TrackBy::default(),
        }
    }
}

/// Tallies of what happened during one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Orders returned by the candidate query.
    pub selected: usize,
    /// Courier tracking calls made.
    pub tracked: usize,
    pub transitioned: usize,
    pub unchanged: usize,
    /// Stale or post-terminal reports.
    pub ignored: usize,
    pub not_found: usize,
    /// The courier had nothing to report.
    pub no_update: usize,
    /// Orders without a trackable delivery.
    pub skipped: usize,
    pub errored: usize,
    /// The sweep was stopped before it got through the batch.
    pub cancelled: bool,
}

impl SweepSummary {
    pub fn record_outcome(&mut self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Transitioned { .. } => self.transitioned += 1,
            ReconcileOutcome::Unchanged => self.unchanged += 1,
            ReconcileOutcome::IgnoredTerminal | ReconcileOutcome::IgnoredStale => self.ignored += 1,
            ReconcileOutcome::NotFound => self.not_found += 1,
        }
    }
}

impl Display for SweepSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "selected: {}, tracked: {}, transitioned: {}, unchanged: {}, ignored: {}, not found: {}, no update: {}, \
             skipped: {}, errored: {}{}",
            self.selected,
            self.tracked,
            self.transitioned,
            self.unchanged,
            self.ignored,
            self.not_found,
            self.no_update,
            self.skipped,
            self.errored,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}
