//! Document store abstract Trait

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::CoreResult;

/// Key-value document store
///
/// Each key holds one JSON document that is always written whole.
/// Provides a default memory implementation of `InMemoryStore`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Load a document, `None` when the key was never written
    ///
    /// # Arguments
    /// * `key` - Document key
    async fn load(&self, key: &str) -> CoreResult<Option<serde_json::Value>>;

    /// Overwrite a document
    ///
    /// # Arguments
    /// * `key` - Document key
    /// * `value` - Full document
    async fn save(&self, key: &str, value: &serde_json::Value) -> CoreResult<()>;

    /// Remove a document (no-op when absent)
    async fn delete(&self, key: &str) -> CoreResult<()>;
}

/// In-memory document store
#[derive(Clone, Default)]
pub struct InMemoryStore {
    documents: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl InMemoryStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn load(&self, key: &str) -> CoreResult<Option<serde_json::Value>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &serde_json::Value) -> CoreResult<()> {
        self.documents
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.documents.write().await.remove(key);
        Ok(())
    }
}
