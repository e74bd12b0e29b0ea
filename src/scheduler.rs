// src/scheduler.rs
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::orchestrator::{CycleError, Orchestrator};

/// Run a cycle now and then every `every`. Missed ticks are skipped, not
/// burst, so a slow cycle never queues up more behind it.
pub fn spawn_cycle_scheduler(orch: Arc<Orchestrator>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!(target: "cycle", every_secs = every.as_secs(), "cycle scheduler started");
        loop {
            ticker.tick().await;
            match orch.run_cycle().await {
                Ok(report) => {
                    tracing::info!(
                        target: "cycle",
                        enqueued = report.enqueued.len(),
                        published = report.published_count(),
                        "scheduled cycle done"
                    );
                }
                Err(CycleError::AlreadyRunning) => {
                    tracing::debug!(target: "cycle", "previous cycle still running; tick skipped");
                }
                Err(e) => {
                    counter!("cycle_failures_total").increment(1);
                    tracing::error!(target: "cycle", error = %e, "scheduled cycle failed");
                }
            }
        }
    })
}
