//! JSON file store
//!
//! One `<key>.json` document per key inside a cache directory. Each write goes
//! to its own temporary file in the same directory, which is synced and then
//! renamed into place, so concurrent saves never share a scratch file.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cf_orchestrator_core::error::{CoreError, CoreResult};
use cf_orchestrator_core::traits::KeyValueStore;
use serde_json::Value;

const MAX_STORE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Key-value store backed by JSON files.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> CoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            CoreError::StorageError(format!(
                "Failed to create cache directory {}: {e}",
                dir.display()
            ))
        })?;
        log::debug!("[store] Using cache directory {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, key: &str) -> CoreResult<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::ValidationError(format!(
                "Invalid store key: {key:?}"
            )));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn load(&self, key: &str) -> CoreResult<Option<Value>> {
        let path = self.file_path(key)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CoreError::StorageError(format!(
                    "Failed to read store file metadata: {e}"
                )))
            }
        };
        if metadata.len() > MAX_STORE_FILE_SIZE {
            return Err(CoreError::StorageError(format!(
                "Store file too large: {} bytes (max: {} bytes)",
                metadata.len(),
                MAX_STORE_FILE_SIZE
            )));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CoreError::StorageError(format!("Failed to read store file: {e}")))?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CoreError::SerializationError(format!("Invalid store format: {e}")))
    }

    async fn save(&self, key: &str, value: &Value) -> CoreResult<()> {
        let path = self.file_path(key)?;
        let content = serde_json::to_vec_pretty(value)?;
        if u64::try_from(content.len()).unwrap_or(u64::MAX) > MAX_STORE_FILE_SIZE {
            return Err(CoreError::StorageError(format!(
                "Document {key} too large: {} bytes",
                content.len()
            )));
        }

        let dir = self.dir.clone();
        let prefix = format!(".{key}.");
        tokio::task::spawn_blocking(move || write_atomic(&dir, &prefix, &path, &content))
            .await
            .map_err(|e| CoreError::StorageError(format!("Store write task failed: {e}")))?
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        let path = self.file_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::StorageError(format!(
                "Failed to delete store file: {e}"
            ))),
        }
    }
}

fn write_atomic(dir: &Path, prefix: &str, path: &Path, content: &[u8]) -> CoreResult<()> {
    let write_err =
        |e: std::io::Error| CoreError::StorageError(format!("Failed to write store file: {e}"));

    let mut tmp = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".json.tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(content).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| {
        CoreError::StorageError(format!("Failed to replace store file: {}", e.error))
    })?;
    Ok(())
}
