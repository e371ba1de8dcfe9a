//! Fixed-interval driver for the pipeline.
//!
//! Each tick dispatches one cycle onto its own task and then sleeps for the
//! interval, so a slow upstream never delays the timer. At most one cycle is
//! in flight; a tick that finds the previous cycle still running is skipped.

use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

use crate::{error::CycleError, pipeline::Pipeline};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub dispatched: u64,
    pub skipped: u64,
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Tick until `shutdown` fires (or its sender is dropped), or until
    /// `max_ticks` ticks have elapsed. The in-flight cycle is awaited before
    /// returning.
    pub async fn run(
        &self,
        mut shutdown: watch::Receiver<()>,
        max_ticks: Option<u64>,
    ) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let mut in_flight: Option<JoinHandle<()>> = None;

        info!(interval_secs = self.interval.as_secs(), "Starting weather poll loop");

        loop {
            stats.ticks += 1;

            let busy = in_flight
                .as_ref()
                .is_some_and(|handle| !handle.is_finished());

            if busy {
                stats.skipped += 1;
                warn!(tick = stats.ticks, "Previous cycle still running, skipping tick");
            } else {
                stats.dispatched += 1;
                in_flight = Some(self.dispatch());
            }

            if max_ticks.is_some_and(|max| stats.ticks >= max) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    info!("Shutdown requested, stopping poll loop");
                    break;
                }
            }
        }

        if let Some(handle) = in_flight
            && let Err(e) = handle.await
        {
            error!(error = %e, "Cycle task failed");
        }

        info!(
            ticks = stats.ticks,
            dispatched = stats.dispatched,
            skipped = stats.skipped,
            "Poll loop stopped"
        );
        stats
    }

    fn dispatch(&self) -> JoinHandle<()> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::spawn(async move {
            if let Err(e) = pipeline.run_cycle().await {
                log_cycle_error(&e);
            }
        })
    }
}

fn log_cycle_error(err: &CycleError) {
    match err {
        CycleError::Fetch(_) | CycleError::Schema(_) => {
            warn!(stage = err.stage(), error = %err, "Skipping cycle");
        }
        _ => {
            error!(stage = err.stage(), error = %err, "Cycle failed");
        }
    }
}
