// src/checkpoint/file.rs
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::{fs, sync::Mutex};

use super::{CheckpointError, CheckpointStore, Watermark};

/// JSON file holding `{ "<key>": <ms>, ... }`.
///
/// Writes go to a sibling temp file, which is synced and then renamed into
/// place. The async mutex makes read-compare-write atomic within this process.
#[derive(Debug)]
pub struct FileCheckpointStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, i64>, CheckpointError> {
        match fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(s) => serde_json::from_str(&s).map_err(|e| {
                CheckpointError::Backend(format!("parsing {}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(CheckpointError::Backend(format!(
                "reading {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn store(&self, values: &BTreeMap<String, i64>) -> Result<(), CheckpointError> {
        let backend = |what: &str, e: std::io::Error| {
            CheckpointError::Backend(format!("{what} {}: {e}", self.path.display()))
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| backend("creating dir for", e))?;
        }

        let json = serde_json::to_vec_pretty(values)
            .map_err(|e| CheckpointError::Backend(format!("encoding checkpoint: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| backend("creating temp file for", e))?;
        file.write_all(&json)
            .await
            .map_err(|e| backend("writing temp file for", e))?;
        // Data must be on disk before the rename makes it visible.
        file.sync_all()
            .await
            .map_err(|e| backend("syncing temp file for", e))?;
        drop(file);
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| backend("renaming temp file onto", e))?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn read(&self, key: &str) -> Result<Watermark, CheckpointError> {
        let _guard = self.lock.lock().await;
        let values = self.load().await?;
        Ok(Watermark::from_millis(values.get(key).copied()))
    }

    async fn write(
        &self,
        key: &str,
        expected: Watermark,
        next: i64,
    ) -> Result<(), CheckpointError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        let found = Watermark::from_millis(values.get(key).copied());
        if found != expected {
            return Err(CheckpointError::Conflict { expected, found });
        }
        values.insert(key.to_string(), next);
        self.store(&values).await?;
        tracing::debug!(key, watermark = next, path = %self.path.display(), "checkpoint updated");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
