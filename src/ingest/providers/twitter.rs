// src/ingest/providers/twitter.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use reqwest::{Client, StatusCode};

use crate::auth::TokenProvider;
use crate::error::FetchError;
use crate::ingest::providers::parse_search_body;
use crate::ingest::query::SearchQuery;
use crate::ingest::types::{Item, SearchGateway};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com/1.1";
const SEARCH_PATH: &str = "/search/tweets.json";

/// Standard search endpoint (`GET /search/tweets.json`) with bearer auth.
pub struct TwitterSearchGateway {
    base_url: String,
    client: Client,
    tokens: Arc<dyn TokenProvider>,
    timeout: Duration,
}

impl TwitterSearchGateway {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            tokens,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Query string is appended as-is: the expression is already encoded and
    /// the extra parameters are the caller's responsibility.
    fn search_url(&self, query: &SearchQuery) -> String {
        format!(
            "{}{}?{}",
            self.base_url.trim_end_matches('/'),
            SEARCH_PATH,
            query.to_query_string()
        )
    }
}

fn classify_request_error(e: reqwest::Error) -> FetchError {
    if e.is_builder() {
        FetchError::Fatal(format!("building search request: {e}"))
    } else {
        FetchError::Transient(format!("search request: {e}"))
    }
}

fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        None
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Some(FetchError::Transient(format!("search API returned HTTP {status}")))
    } else if status == StatusCode::UNAUTHORIZED {
        Some(FetchError::Auth(format!("search API returned HTTP {status}")))
    } else {
        Some(FetchError::Fatal(format!("search API returned HTTP {status}")))
    }
}

#[async_trait]
impl SearchGateway for TwitterSearchGateway {
    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<Item>, FetchError> {
        let token = self
            .tokens
            .auth_token()
            .await
            .map_err(|e| FetchError::Auth(e.to_string()))?;

        let url = self.search_url(query);
        tracing::debug!(url = %url, "calling search api");
        let t0 = Instant::now();

        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify_request_error)?;

        if let Some(err) = classify_status(resp.status()) {
            if matches!(err, FetchError::Auth(_)) {
                // Expired or revoked; the next cycle re-authenticates.
                self.tokens.invalidate().await;
            }
            return Err(err);
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transient(format!("reading search response: {e}")))?;
        histogram!("poller_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let items = parse_search_body(&body)?;
        if items.is_empty() {
            tracing::debug!("did not receive any results");
        }
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "twitter"
    }
}
