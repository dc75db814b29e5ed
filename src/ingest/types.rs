// src/ingest/types.rs
use async_trait::async_trait;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::FetchError;
use crate::ingest::query::SearchQuery;
use crate::ingest::timestamp::parse_created_at;

/// One record from the search feed.
///
/// The record itself stays opaque; only its creation instant is extracted.
/// Serializes back to exactly the raw record.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    created_at_ms: i64,
    raw: Value,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("record has no created_at field")]
    MissingCreatedAt,
    #[error("unparseable created_at: {0:?}")]
    BadCreatedAt(String),
}

impl Item {
    pub fn new(created_at_ms: i64, raw: Value) -> Self {
        Self { created_at_ms, raw }
    }

    /// Build from a raw record. `created_at` may be a date string in any of the
    /// formats `parse_created_at` understands, or integer epoch milliseconds.
    pub fn from_json(raw: Value) -> Result<Self, ItemError> {
        let created_at_ms = match raw.get("created_at") {
            None | Some(Value::Null) => return Err(ItemError::MissingCreatedAt),
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| ItemError::BadCreatedAt(n.to_string()))?,
            Some(Value::String(s)) => {
                parse_created_at(s).ok_or_else(|| ItemError::BadCreatedAt(s.clone()))?
            }
            Some(other) => return Err(ItemError::BadCreatedAt(other.to_string())),
        };
        Ok(Self { created_at_ms, raw })
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// `id_str` (or numeric `id`) when the record carries one; for logs only.
    pub fn id(&self) -> Option<String> {
        match self.raw.get("id_str").or_else(|| self.raw.get("id"))? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

/// Remote source: one network call per `fetch`, unordered batch back.
#[async_trait]
pub trait SearchGateway: Send + Sync {
    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<Item>, FetchError>;
    fn name(&self) -> &'static str;
}
