// src/config/poller.rs
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::auth::DEFAULT_TOKEN_URL;
use crate::checkpoint::DEFAULT_CHECKPOINT_KEY;
use crate::engine::RetryPolicy;
use crate::error::ConfigError;
use crate::ingest::providers::twitter::DEFAULT_API_BASE;
use crate::ingest::query::SearchQuery;

pub const ENV_CONFIG_PATH: &str = "POLLER_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/poller.toml";

fn default_timeout_ms() -> u64 {
    5_000
}
fn default_interval_secs() -> u64 {
    60
}
fn default_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollerConfig {
    /// Search expression; URL-encoded when the query is built.
    pub search_query: String,
    /// Extra `k=v&k=v` parameters, passed through unescaped.
    pub additional_parameters: Option<String>,
    pub api_base_url: String,
    pub token_url: String,
    pub per_request_timeout_ms: u64,
    pub poll_interval_secs: u64,
    /// Total fetch attempts per cycle, first try included.
    pub max_fetch_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub checkpoint_path: PathBuf,
    pub checkpoint_key: String,
    pub forward_webhook_url: Option<String>,
    pub listen_addr: Option<String>,
    /// Serve a recorded search response instead of calling the API.
    pub fixture_path: Option<PathBuf>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            search_query: String::new(),
            additional_parameters: None,
            api_base_url: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            per_request_timeout_ms: default_timeout_ms(),
            poll_interval_secs: default_interval_secs(),
            max_fetch_attempts: default_attempts(),
            retry_initial_delay_ms: default_retry_delay_ms(),
            checkpoint_path: PathBuf::from("state/checkpoint.json"),
            checkpoint_key: DEFAULT_CHECKPOINT_KEY.to_string(),
            forward_webhook_url: None,
            listen_addr: Some("127.0.0.1:8080".to_string()),
            fixture_path: None,
        }
    }
}

impl PollerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// File from $POLLER_CONFIG_PATH, else `config/poller.toml`, else
    /// defaults; environment overrides applied on top.
    pub fn load_default() -> Result<Self, ConfigError> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => Self::load_from_file(p)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load_from_file(DEFAULT_CONFIG_PATH)?
            }
            Err(_) => Self::default(),
        };
        cfg.apply_overrides(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SEARCH_QUERY") {
            self.search_query = v;
        }
        if let Some(v) = get("ADDITIONAL_PARAMETERS") {
            self.additional_parameters = Some(v);
        }
        if let Some(v) = get("PER_REQUEST_TIMEOUT") {
            self.per_request_timeout_ms = parse_number("PER_REQUEST_TIMEOUT", &v)?;
        }
        if let Some(v) = get("POLL_INTERVAL_SECS") {
            self.poll_interval_secs = parse_number("POLL_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("CHECKPOINT_PATH") {
            self.checkpoint_path = PathBuf::from(v);
        }
        if let Some(v) = get("CHECKPOINT_KEY") {
            self.checkpoint_key = v;
        }
        if let Some(v) = get("FORWARD_WEBHOOK_URL") {
            self.forward_webhook_url = Some(v);
        }
        if let Some(v) = get("LISTEN_ADDR") {
            self.listen_addr = Some(v);
        }
        if let Some(v) = get("POLLER_FIXTURE_PATH") {
            self.fixture_path = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Everything a cycle needs must be present before any network call.
    pub fn validate(&self, credentials: Option<&Credentials>) -> Result<(), ConfigError> {
        if self.search_query.trim().is_empty() {
            return Err(ConfigError::Missing("SEARCH_QUERY"));
        }
        if self.per_request_timeout_ms == 0 {
            return Err(invalid("per_request_timeout_ms", "must be > 0"));
        }
        if self.poll_interval_secs == 0 {
            return Err(invalid("poll_interval_secs", "must be > 0"));
        }
        if self.max_fetch_attempts == 0 {
            return Err(invalid("max_fetch_attempts", "must be >= 1"));
        }
        if self.checkpoint_key.trim().is_empty() {
            return Err(ConfigError::Missing("CHECKPOINT_KEY"));
        }
        if self.fixture_path.is_none() && credentials.is_none() {
            return Err(ConfigError::Missing(
                "BEARER_TOKEN or CONSUMER_API_KEY/CONSUMER_API_SECRET_KEY",
            ));
        }
        Ok(())
    }

    pub fn query(&self) -> SearchQuery {
        SearchQuery::new(
            self.search_query.clone(),
            self.additional_parameters.clone(),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.per_request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_fetch_attempts,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            ..RetryPolicy::default()
        }
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, v: &str) -> Result<T, ConfigError> {
    v.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        reason: format!("not a number: {v:?}"),
    })
}

/// API credentials, read from the environment only.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Consumer { api_key: String, api_secret: String },
}

impl Credentials {
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// `BEARER_TOKEN` wins; otherwise both consumer keys are required together.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(token) = get("BEARER_TOKEN") {
            return Ok(Some(Credentials::Bearer(token)));
        }
        match (get("CONSUMER_API_KEY"), get("CONSUMER_API_SECRET_KEY")) {
            (Some(api_key), Some(api_secret)) => Ok(Some(Credentials::Consumer {
                api_key,
                api_secret,
            })),
            (Some(_), None) => Err(ConfigError::Missing("CONSUMER_API_SECRET_KEY")),
            (None, Some(_)) => Err(ConfigError::Missing("CONSUMER_API_KEY")),
            (None, None) => Ok(None),
        }
    }
}

// Never print secrets.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Bearer(t) => write!(f, "Bearer(len={})", t.len()),
            Credentials::Consumer { api_key, .. } => {
                write!(f, "Consumer(key_len={}, secret=***)", api_key.len())
            }
        }
    }
}
