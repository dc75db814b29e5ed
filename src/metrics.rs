use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Call once, at startup.
    pub fn install() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        describe();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn describe() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poller_cycles_total", "Poll cycles started.");
        describe_counter!(
            "poller_cycle_errors_total",
            "Poll cycles that ended in a fatal error, by kind."
        );
        describe_counter!("poller_items_fetched_total", "Items returned by the gateway.");
        describe_counter!(
            "poller_items_dispatched_total",
            "New items the forwarder accepted; detached webhooks may still fail."
        );
        describe_counter!(
            "poller_items_delivered_total",
            "Items confirmed delivered by the webhook target."
        );
        describe_counter!(
            "poller_fetch_retries_total",
            "Fetch attempts retried after a transient failure."
        );
        describe_counter!("poller_forward_errors_total", "Forwarder failures.");
        describe_counter!(
            "poller_items_unparseable_total",
            "Records dropped for lacking a usable created_at."
        );
        describe_gauge!("poller_watermark_ms", "Last committed watermark (ms).");
        describe_gauge!("poller_last_run_ts", "Unix ts when a cycle last started.");
        describe_histogram!("poller_fetch_ms", "Search API round trip in milliseconds.");
        describe_histogram!(
            "poller_fetch_attempt_ms",
            "Gateway fetch attempt duration in milliseconds."
        );
    });
}
