//! search-poller binary entrypoint.
//! Loads config, wires the poller, runs the scheduler and the HTTP surface
//! until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use search_poller::api::{self, AppState};
use search_poller::bootstrap::build_poller;
use search_poller::config::{Credentials, PollerConfig};
use search_poller::ingest::scheduler::{spawn_scheduler, SchedulerCfg};
use search_poller::metrics::Metrics;

/// `RUST_LOG` picks the filter; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("search_poller=info,ingest=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = PollerConfig::load_default().context("loading poller config")?;
    let credentials = Credentials::from_env().context("reading credentials")?;
    cfg.validate(credentials.as_ref())
        .context("validating poller config")?;

    let metrics = Metrics::install()?;
    let shutdown = CancellationToken::new();

    let poller = Arc::new(build_poller(&cfg, credentials.as_ref(), shutdown.clone())?);
    let scheduler = spawn_scheduler(
        poller.clone(),
        SchedulerCfg {
            interval: cfg.poll_interval(),
        },
        shutdown.clone(),
    );

    let server = match &cfg.listen_addr {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            tracing::info!(addr = %addr, "http listening");
            let app = api::router(AppState { poller }).merge(metrics.router());
            let stop = shutdown.clone();
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { stop.cancelled().await })
                    .await
            }))
        }
        None => None,
    };

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    shutdown.cancel();

    scheduler.await.context("scheduler task")?;
    if let Some(server) = server {
        server.await.context("http task")?.context("http server")?;
    }
    Ok(())
}
