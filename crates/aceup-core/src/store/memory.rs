//! In-memory store for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LocalStore, StoreKey};
use crate::Result;

/// Process-local document map. Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<HashMap<StoreKey, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn read(&self, key: &StoreKey) -> Result<Option<String>> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn write(&self, key: &StoreKey, contents: String) -> Result<()> {
        self.documents.write().await.insert(key.clone(), contents);
        Ok(())
    }

    async fn remove(&self, key: &StoreKey) -> Result<()> {
        self.documents.write().await.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
