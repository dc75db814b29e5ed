// src/bootstrap.rs
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth;
use crate::checkpoint::FileCheckpointStore;
use crate::config::{Credentials, PollerConfig};
use crate::engine::Poller;
use crate::ingest::providers::{fixture::FixtureGateway, twitter::TwitterSearchGateway};
use crate::ingest::types::SearchGateway;
use crate::notify::{Forwarder, StdoutForwarder, WebhookForwarder};

/// Wire the collaborators named by `cfg` into a poller.
///
/// A fixture path replaces the search API; a webhook URL replaces stdout as
/// the forwarding target.
pub fn build_poller(
    cfg: &PollerConfig,
    credentials: Option<&Credentials>,
    shutdown: CancellationToken,
) -> anyhow::Result<Poller> {
    let gateway: Arc<dyn SearchGateway> = match (&cfg.fixture_path, credentials) {
        (Some(path), _) => {
            info!(path = %path.display(), "using recorded search fixture");
            Arc::new(FixtureGateway::from_path(path).context("loading fixture gateway")?)
        }
        (None, Some(creds)) => {
            let tokens = auth::provider_for(creds, &cfg.token_url, cfg.request_timeout());
            Arc::new(
                TwitterSearchGateway::new(cfg.api_base_url.clone(), tokens)
                    .with_timeout(cfg.request_timeout()),
            )
        }
        (None, None) => return Err(anyhow!("no search credentials configured")),
    };

    let forwarder: Arc<dyn Forwarder> = match &cfg.forward_webhook_url {
        Some(url) => {
            Arc::new(WebhookForwarder::new(url.clone()).with_timeout(cfg.request_timeout()))
        }
        None => Arc::new(StdoutForwarder),
    };

    info!(
        gateway = gateway.name(),
        forwarder = forwarder.name(),
        checkpoint = %cfg.checkpoint_path.display(),
        key = %cfg.checkpoint_key,
        credentials = ?credentials,
        "poller wired"
    );

    Ok(Poller::new(
        gateway,
        Arc::new(FileCheckpointStore::new(cfg.checkpoint_path.clone())),
        forwarder,
        cfg.query(),
    )
    .with_checkpoint_key(cfg.checkpoint_key.clone())
    .with_retry(cfg.retry_policy())
    .with_cancellation(shutdown))
}
