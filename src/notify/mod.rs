// src/notify/mod.rs
pub mod recording;
pub mod stdout;
pub mod webhook;

use async_trait::async_trait;

use crate::ingest::types::Item;

pub use recording::RecordingForwarder;
pub use stdout::StdoutForwarder;
pub use webhook::WebhookForwarder;

/// Downstream sink for an already sorted, already deduplicated batch.
///
/// Implementations may dispatch in the background and return before the
/// downstream side has processed anything.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, items: &[Item]) -> anyhow::Result<()>;
    fn name(&self) -> &'static str;
}
