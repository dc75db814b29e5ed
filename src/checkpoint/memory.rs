// src/checkpoint/memory.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CheckpointError, CheckpointStore, Watermark};

/// Process-local store. Reads and writes can be made to fail for tests.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    values: Mutex<HashMap<String, i64>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, ms: i64) -> Self {
        let store = Self::default();
        if let Ok(mut values) = store.values.lock() {
            values.insert(key.to_string(), ms);
        }
        store
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Moves the stored value behind the poller's back, as a concurrent cycle would.
    pub fn force(&self, key: &str, ms: i64) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), ms);
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, i64>>, CheckpointError> {
        self.values
            .lock()
            .map_err(|_| CheckpointError::Backend("checkpoint mutex poisoned".into()))
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn read(&self, key: &str) -> Result<Watermark, CheckpointError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CheckpointError::Backend("injected read failure".into()));
        }
        let values = self.lock()?;
        Ok(Watermark::from_millis(values.get(key).copied()))
    }

    async fn write(
        &self,
        key: &str,
        expected: Watermark,
        next: i64,
    ) -> Result<(), CheckpointError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CheckpointError::Backend("injected write failure".into()));
        }
        let mut values = self.lock()?;
        let found = Watermark::from_millis(values.get(key).copied());
        if found != expected {
            return Err(CheckpointError::Conflict { expected, found });
        }
        values.insert(key.to_string(), next);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_is_visible_to_next_read() {
        let store = InMemoryCheckpointStore::new();
        assert_eq!(store.read("k").await.unwrap(), Watermark::Unset);
        store.write("k", Watermark::Unset, 300).await.unwrap();
        assert_eq!(store.read("k").await.unwrap(), Watermark::At(300));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn stale_expected_value_is_rejected() {
        let store = InMemoryCheckpointStore::with_value("k", 100);
        let err = store.write("k", Watermark::Unset, 300).await.unwrap_err();
        assert_eq!(
            err,
            CheckpointError::Conflict {
                expected: Watermark::Unset,
                found: Watermark::At(100),
            }
        );
        assert_eq!(store.read("k").await.unwrap(), Watermark::At(100));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = InMemoryCheckpointStore::with_value("a", 1);
        assert_eq!(store.read("b").await.unwrap(), Watermark::Unset);
    }
}
