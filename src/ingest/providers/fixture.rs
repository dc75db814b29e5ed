// src/ingest/providers/fixture.rs
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::error::FetchError;
use crate::ingest::providers::parse_search_body;
use crate::ingest::query::SearchQuery;
use crate::ingest::types::{Item, SearchGateway};

/// Serves the same recorded search response on every call. Used for local
/// dry runs without credentials.
pub struct FixtureGateway {
    body: String,
}

impl FixtureGateway {
    pub fn from_fixture(body: &str) -> Self {
        Self {
            body: body.to_string(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("reading search fixture from {}", path.display()))?;
        Ok(Self { body })
    }
}

#[async_trait]
impl SearchGateway for FixtureGateway {
    async fn fetch(&self, _query: &SearchQuery) -> Result<Vec<Item>, FetchError> {
        parse_search_body(&self.body)
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
