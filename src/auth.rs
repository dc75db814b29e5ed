//! Bearer-token acquisition for the search API.
//!
//! Built once at startup and handed to the gateway; the cached token lives
//! inside the provider rather than in process-wide state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::Credentials;
use crate::error::AuthError;

pub const DEFAULT_TOKEN_URL: &str = "https://api.twitter.com/oauth2/token";

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn auth_token(&self) -> Result<String, AuthError>;

    /// Drop any cached token so the next call fetches a fresh one.
    async fn invalidate(&self) {}
}

/// Pre-issued bearer token.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn auth_token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token_type: String,
    access_token: String,
}

/// OAuth2 client-credentials exchange with an in-memory cache.
pub struct BearerTokenProvider {
    token_url: String,
    api_key: String,
    api_secret: String,
    client: Client,
    timeout: Duration,
    cached: Mutex<Option<String>>,
}

impl BearerTokenProvider {
    pub fn new(
        token_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            cached: Mutex::new(None),
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

    async fn request_token(&self) -> Result<String, AuthError> {
        info!(url = %self.token_url, "requesting bearer token");
        let resp = self
            .client
            .post(&self.token_url)
            .basic_auth(
                urlencoding::encode(&self.api_key),
                Some(urlencoding::encode(&self.api_secret)),
            )
            .header(
                CONTENT_TYPE,
                "application/x-www-form-urlencoded;charset=UTF-8",
            )
            .body("grant_type=client_credentials")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::Status {
                status: status.as_u16(),
            });
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))?;
        if !body.token_type.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::WrongTokenType(body.token_type));
        }
        info!("bearer token received");
        Ok(body.access_token)
    }
}

#[async_trait]
impl TokenProvider for BearerTokenProvider {
    async fn auth_token(&self) -> Result<String, AuthError> {
        // Held across the request so concurrent callers share one refresh.
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let token = self.request_token().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}

/// Pick the provider matching the configured credentials.
pub fn provider_for(
    credentials: &Credentials,
    token_url: &str,
    timeout: Duration,
) -> Arc<dyn TokenProvider> {
    match credentials {
        Credentials::Bearer(token) => Arc::new(StaticTokenProvider::new(token.clone())),
        Credentials::Consumer {
            api_key,
            api_secret,
        } => Arc::new(
            BearerTokenProvider::new(token_url, api_key.clone(), api_secret.clone())
                .with_timeout(timeout),
        ),
    }
}
