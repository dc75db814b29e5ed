// src/checkpoint/mod.rs
pub mod file;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Serialize, Serializer};

pub use crate::error::CheckpointError;
pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;

/// Fixed logical key used when none is configured.
pub const DEFAULT_CHECKPOINT_KEY: &str = "CHECKPOINT_TIMESTAMP";

/// Creation time (ms since epoch) of the newest item already forwarded.
///
/// `Unset` is its own variant rather than a magic number, so a first-ever
/// poll admits every fetched item, including ones with pre-epoch timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Watermark {
    #[default]
    Unset,
    At(i64),
}

impl Watermark {
    /// True when an item created at `created_at_ms` is strictly newer.
    pub fn admits(self, created_at_ms: i64) -> bool {
        match self {
            Watermark::Unset => true,
            Watermark::At(w) => created_at_ms > w,
        }
    }

    pub fn as_millis(self) -> Option<i64> {
        match self {
            Watermark::Unset => None,
            Watermark::At(w) => Some(w),
        }
    }

    pub fn from_millis(ms: Option<i64>) -> Self {
        ms.map_or(Watermark::Unset, Watermark::At)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Watermark::Unset => f.write_str("unset"),
            Watermark::At(ms) => write!(f, "{ms}"),
        }
    }
}

// JSON: integer, or null when unset.
impl Serialize for Watermark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_millis().serialize(serializer)
    }
}

/// Durable key -> watermark store.
///
/// A successful `write` must be visible to the next `read` of the same key.
/// `write` is a compare-and-set: it fails with [`CheckpointError::Conflict`]
/// when the stored value is no longer `expected`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Watermark, CheckpointError>;

    async fn write(&self, key: &str, expected: Watermark, next: i64)
        -> Result<(), CheckpointError>;

    fn name(&self) -> &'static str;
}
