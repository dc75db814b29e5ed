use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use super::Forwarder;
use crate::ingest::types::Item;

/// POSTs the batch as a JSON array to a downstream endpoint.
///
/// By default delivery is event style: the POST (with its retries) runs on a
/// spawned task and `forward` returns once the payload is encoded. Only a
/// confirmed delivery counts towards `poller_items_delivered_total`.
#[derive(Clone)]
pub struct WebhookForwarder {
    url: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
    detached: bool,
}

impl WebhookForwarder {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
            detached: true,
        }
    }

    /// Per-request timeout, applied to every delivery attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Make `forward` wait for the downstream response.
    pub fn wait_for_delivery(mut self) -> Self {
        self.detached = false;
        self
    }

    pub async fn deliver(&self, payload: Vec<u8>) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.url)
                .timeout(self.timeout)
                .header(CONTENT_TYPE, "application/json")
                .body(payload.clone())
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("webhook request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::debug!(attempt, error = %err, url = %self.url, "webhook delivery retry");
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

#[async_trait]
impl Forwarder for WebhookForwarder {
    async fn forward(&self, items: &[Item]) -> Result<()> {
        let payload = serde_json::to_vec(items).context("encoding item batch")?;
        let count = items.len();

        if !self.detached {
            self.deliver(payload)
                .await
                .with_context(|| format!("forwarding {count} item(s) to {}", self.url))?;
            counter!("poller_items_delivered_total").increment(count as u64);
            return Ok(());
        }

        let this = self.clone();
        tokio::spawn(async move {
            match this.deliver(payload).await {
                Ok(()) => {
                    counter!("poller_items_delivered_total").increment(count as u64);
                    tracing::info!(count, url = %this.url, "published items to webhook");
                }
                Err(e) => {
                    let msg = format!("{e:#}");
                    tracing::error!(count, url = %this.url, error = %msg, "error publishing items to webhook");
                    counter!("poller_forward_errors_total").increment(1);
                }
            }
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
