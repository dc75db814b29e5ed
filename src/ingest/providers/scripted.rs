// src/ingest/providers/scripted.rs
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::ingest::query::SearchQuery;
use crate::ingest::types::{Item, SearchGateway};

/// Plays back queued outcomes in order, then falls back to a fixed batch
/// (empty unless set). Counts calls and remembers the last query.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<Vec<Item>, FetchError>>>,
    fallback: Vec<Item>,
    calls: AtomicUsize,
    last_query: Mutex<Option<String>>,
}

impl ScriptedGateway {
    pub fn new(outcomes: Vec<Result<Vec<Item>, FetchError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            ..Self::default()
        }
    }

    /// Always answers with `batch`, as a remote whose result set never changes.
    pub fn repeating(batch: Vec<Item>) -> Self {
        Self {
            fallback: batch,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().ok().and_then(|q| q.clone())
    }
}

#[async_trait]
impl SearchGateway for ScriptedGateway {
    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<Item>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_query.lock() {
            *last = Some(query.to_query_string());
        }
        let next = self
            .script
            .lock()
            .map_err(|_| FetchError::Fatal("script mutex poisoned".into()))?
            .pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
