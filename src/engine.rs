//! # Poll Cycle Engine
//! One cycle: read watermark → fetch (bounded retry) → sort → filter →
//! commit watermark → forward.
//!
//! A cycle either advances the watermark and forwards a non-empty,
//! newest-first batch of strictly newer items, or changes nothing. Forwarding
//! only starts after the watermark commit succeeded.
//!
//! The engine holds no timer; see `ingest::scheduler` for the periodic driver.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::checkpoint::{CheckpointError, CheckpointStore, Watermark, DEFAULT_CHECKPOINT_KEY};
use crate::error::{FetchError, PollError};
use crate::ingest::query::SearchQuery;
use crate::ingest::select_new_items;
use crate::ingest::types::{Item, SearchGateway};
use crate::notify::Forwarder;

/// Bounded exponential backoff for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT: Self = Self {
        max_attempts: 3,
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(8),
    };

    /// Delay after the `retry`-th failure (0-indexed): doubles, capped.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Newly observed items, newest first. Empty when nothing changed.
    pub items: Vec<Item>,
    pub watermark_before: Watermark,
    pub watermark_after: Watermark,
}

impl CycleReport {
    fn unchanged(watermark: Watermark) -> Self {
        Self {
            items: Vec::new(),
            watermark_before: watermark,
            watermark_after: watermark,
        }
    }

    pub fn advanced(&self) -> bool {
        self.watermark_before != self.watermark_after
    }
}

pub struct Poller {
    gateway: Arc<dyn SearchGateway>,
    checkpoint: Arc<dyn CheckpointStore>,
    forwarder: Arc<dyn Forwarder>,
    query: SearchQuery,
    checkpoint_key: String,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(
        gateway: Arc<dyn SearchGateway>,
        checkpoint: Arc<dyn CheckpointStore>,
        forwarder: Arc<dyn Forwarder>,
        query: SearchQuery,
    ) -> Self {
        Self {
            gateway,
            checkpoint,
            forwarder,
            query,
            checkpoint_key: DEFAULT_CHECKPOINT_KEY.to_string(),
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_checkpoint_key(mut self, key: impl Into<String>) -> Self {
        self.checkpoint_key = key.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Token checked between fetch attempts; cancelling it aborts the cycle
    /// without touching the checkpoint.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn checkpoint_key(&self) -> &str {
        &self.checkpoint_key
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub async fn watermark(&self) -> Result<Watermark, PollError> {
        self.checkpoint
            .read(&self.checkpoint_key)
            .await
            .map_err(|source| PollError::CheckpointRead {
                key: self.checkpoint_key.clone(),
                source,
            })
    }

    /// Full cycle: `poll`, then hand the new items to the forwarder.
    ///
    /// Forwarder failures are logged and counted but do not fail the cycle;
    /// the watermark is already committed at that point.
    pub async fn run_cycle(&self) -> Result<CycleReport, PollError> {
        crate::metrics::describe();
        counter!("poller_cycles_total").increment(1);
        gauge!("poller_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

        let report = match self.poll().await {
            Ok(report) => report,
            Err(e) => {
                counter!("poller_cycle_errors_total", "kind" => e.kind()).increment(1);
                return Err(e);
            }
        };

        if report.items.is_empty() {
            return Ok(report);
        }

        let count = report.items.len();
        match self.forwarder.forward(&report.items).await {
            Ok(()) => {
                counter!("poller_items_dispatched_total").increment(count as u64);
                info!(
                    count,
                    forwarder = self.forwarder.name(),
                    watermark = %report.watermark_after,
                    "dispatched new items"
                );
            }
            Err(e) => {
                counter!("poller_forward_errors_total").increment(1);
                let msg = format!("{e:#}");
                error!(
                    count,
                    forwarder = self.forwarder.name(),
                    watermark = %report.watermark_after,
                    error = %msg,
                    "forwarding failed; watermark stays committed"
                );
            }
        }
        Ok(report)
    }

    /// Compute and commit one cycle's worth of new items without forwarding.
    pub async fn poll(&self) -> Result<CycleReport, PollError> {
        let key = self.checkpoint_key.as_str();
        let before = match self.watermark().await {
            Ok(w) => w,
            Err(e) => {
                error!(key, query = %self.query, error = %e, "poll cycle failed before fetch");
                return Err(e);
            }
        };
        debug!(key, watermark = %before, "read checkpoint");

        self.poll_from(before).await.inspect_err(|e| {
            error!(
                key,
                watermark = %before,
                query = %self.query,
                error = %e,
                cause = ?std::error::Error::source(e).map(|s| s.to_string()),
                "poll cycle failed"
            )
        })
    }

    async fn poll_from(&self, before: Watermark) -> Result<CycleReport, PollError> {
        let batch = self.fetch_with_retry().await?;
        counter!("poller_items_fetched_total").increment(batch.len() as u64);
        if batch.is_empty() {
            debug!("no items fetched; checkpoint untouched");
            return Ok(CycleReport::unchanged(before));
        }

        let total = batch.len();
        let fresh = select_new_items(batch, before);
        debug!(total, new = fresh.len(), watermark = %before, "filtered batch");

        let Some(newest) = fresh.first().map(Item::created_at_ms) else {
            debug!("no new items; checkpoint untouched");
            return Ok(CycleReport::unchanged(before));
        };

        self.checkpoint
            .write(&self.checkpoint_key, before, newest)
            .await
            .map_err(|e| match e {
                CheckpointError::Conflict { expected, found } => PollError::CheckpointConflict {
                    key: self.checkpoint_key.clone(),
                    expected,
                    found,
                },
                source => PollError::CheckpointWrite {
                    key: self.checkpoint_key.clone(),
                    next: newest,
                    source,
                },
            })?;
        gauge!("poller_watermark_ms").set(newest as f64);
        debug!(
            from = %before,
            to = newest,
            newest_id = ?fresh.first().and_then(Item::id),
            "checkpoint advanced"
        );

        Ok(CycleReport {
            items: fresh,
            watermark_before: before,
            watermark_after: Watermark::At(newest),
        })
    }

    async fn fetch_with_retry(&self) -> Result<Vec<Item>, PollError> {
        let max = self.retry.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }
            attempt += 1;

            let t0 = Instant::now();
            let res = self.gateway.fetch(&self.query).await;
            histogram!("poller_fetch_attempt_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

            match res {
                Ok(items) => return Ok(items),
                Err(e) if e.is_transient() && attempt < max => {
                    counter!("poller_fetch_retries_total").increment(1);
                    let delay = self.retry.delay_for_retry(attempt - 1);
                    warn!(
                        attempt,
                        max,
                        gateway = self.gateway.name(),
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient fetch failure, retrying"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(PollError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(last) if last.is_transient() => {
                    return Err(PollError::FetchExhausted {
                        attempts: attempt,
                        last,
                    })
                }
                Err(FetchError::Auth(msg)) => return Err(PollError::Auth(msg)),
                Err(e) => return Err(PollError::FetchRejected(e)),
            }
        }
    }
}
