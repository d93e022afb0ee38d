use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use delivery_sync_engine::{sweep_objects::SweepSummary, SqliteDatabase, TrackingApi};
use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::integrations::courier::CourierClient;

pub type SweepApi = TrackingApi<SqliteDatabase, CourierClient>;

/// Marks a sweep as in flight. Only one guard can exist at a time; dropping it marks the sweeper idle again.
pub struct SweepGuard {
    running: Arc<AtomicBool>,
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Periodically polls the courier for the status of recent open orders.
///
/// The sweeper is `idle` or `running`. A tick that fires while a sweep is still running is skipped, so sweeps never
/// overlap. [`PollSweeper::stop`] cancels the timer and waits for an in-flight sweep to wind down; the sweep itself
/// stops between orders.
pub struct PollSweeper {
    api: Arc<SweepApi>,
    interval: Duration,
    running: Arc<AtomicBool>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollSweeper {
    pub fn new(api: SweepApi, interval: Duration) -> Self {
        Self {
            api: Arc::new(api),
            interval,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
            handle: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_sweeping(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Claims the sweeper for one run. Returns `None` if a sweep is already in flight.
    pub fn try_begin(&self) -> Option<SweepGuard> {
        try_begin(&self.running)
    }

    /// Runs a single sweep right now, unless one is already in flight.
    pub async fn run_once(&self) -> Option<SweepSummary> {
        let guard = self.try_begin()?;
        let summary = sweep(&self.api, &self.shutdown).await;
        drop(guard);
        summary
    }

    /// Starts the timer. Calling `start` on a sweeper that is already started does nothing.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            warn!("🧹️ The poll sweeper has already been started");
            return;
        }
        let api = Arc::clone(&self.api);
        let running = Arc::clone(&self.running);
        let shutdown = self.shutdown.clone();
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("🧹️ Poll sweeper started. Sweeping every {}s", interval.as_secs_f32());
            let mut current: Option<JoinHandle<()>> = None;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = timer.tick() => {},
                }
                let Some(guard) = try_begin(&running) else {
                    info!("🧹️ The previous sweep is still running. Skipping this tick.");
                    continue;
                };
                let api = Arc::clone(&api);
                let token = shutdown.clone();
                current = Some(tokio::spawn(async move {
                    let _guard = guard;
                    sweep(&api, &token).await;
                }));
            }
            if let Some(task) = current {
                if let Err(e) = task.await {
                    error!("🧹️ The last sweep did not shut down cleanly. {e}");
                }
            }
            info!("🧹️ Poll sweeper stopped");
        });
        self.handle = Some(handle);
    }

    /// Stops the timer and waits for any in-flight sweep to finish its current order.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("🧹️ The poll sweeper did not shut down cleanly. {e}");
            }
        }
    }
}

fn try_begin(running: &Arc<AtomicBool>) -> Option<SweepGuard> {
    running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .ok()
        .map(|_| SweepGuard { running: Arc::clone(running) })
}

async fn sweep(api: &SweepApi, shutdown: &CancellationToken) -> Option<SweepSummary> {
    debug!("🧹️ Running delivery status sweep");
    match api.sweep(shutdown).await {
        Ok(summary) => {
            if summary.errored > 0 {
                warn!("🧹️ Sweep complete with errors. {summary}");
            } else {
                info!("🧹️ Sweep complete. {summary}");
            }
            Some(summary)
        },
        Err(e) => {
            error!("🧹️ Could not run the delivery status sweep. {e}");
            None
        },
    }
}
