// src/ingest/mod.rs
pub mod providers;
pub mod query;
pub mod scheduler;
pub mod timestamp;
pub mod types;

use std::cmp::Reverse;

use crate::checkpoint::Watermark;
use crate::ingest::types::Item;

/// Newest-first, then keep only items strictly newer than `watermark`.
///
/// The sort is stable, so items sharing a timestamp keep their source order.
pub fn select_new_items(mut batch: Vec<Item>, watermark: Watermark) -> Vec<Item> {
    batch.sort_by_key(|it| Reverse(it.created_at_ms()));
    batch.retain(|it| watermark.admits(it.created_at_ms()));
    batch
}
