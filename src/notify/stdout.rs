// src/notify/stdout.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::Forwarder;
use crate::ingest::types::Item;

/// Writes each item as one JSON line on stdout, newest first.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutForwarder;

#[async_trait]
impl Forwarder for StdoutForwarder {
    async fn forward(&self, items: &[Item]) -> Result<()> {
        let mut buf = Vec::new();
        for it in items {
            serde_json::to_writer(&mut buf, it).context("encoding item")?;
            buf.push(b'\n');
        }
        let mut out = tokio::io::stdout();
        out.write_all(&buf).await.context("writing items to stdout")?;
        out.flush().await.context("flushing stdout")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}
