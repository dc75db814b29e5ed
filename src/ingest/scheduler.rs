// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::engine::Poller;
use crate::error::PollError;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
}

/// Run `run_cycle` on a fixed interval until `shutdown` fires.
///
/// Cycles run one after another on this task; a slow cycle makes the next
/// tick skip rather than overlap.
pub fn spawn_scheduler(
    poller: Arc<Poller>,
    cfg: SchedulerCfg,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            target: "ingest",
            interval_secs = cfg.interval.as_secs(),
            query = %poller.query(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match poller.run_cycle().await {
                Ok(report) => tracing::info!(
                    target: "ingest",
                    new = report.items.len(),
                    watermark = %report.watermark_after,
                    "poll tick"
                ),
                Err(PollError::Cancelled) => break,
                // Already logged with context by the engine; the next tick retries.
                Err(_) => {}
            }
        }
        tracing::info!(target: "ingest", "scheduler stopped");
    })
}
