// src/notify/recording.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::Forwarder;
use crate::ingest::types::Item;

/// Keeps every batch it is handed. Can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingForwarder {
    batches: Mutex<Vec<Vec<Item>>>,
    fail: AtomicBool,
}

impl RecordingForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Vec<Item>> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.batches.lock().map(|b| b.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(&self, items: &[Item]) -> Result<()> {
        self.batches
            .lock()
            .map_err(|_| anyhow!("recording mutex poisoned"))?
            .push(items.to_vec());
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("injected forward failure"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
