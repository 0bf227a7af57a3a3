//! Durable local key-value storage for cached entities and sync bookkeeping.
//!
//! A store only moves opaque JSON documents; [`load_collection`] and
//! [`save_collection`] add the typed layer on top.

mod file;
mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::EntityKind;
use crate::util::encode_key_segment;
use crate::{Error, Result};

pub use file::FileStore;
pub use memory::MemoryStore;

/// What a stored document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// The cached entity collection
    Entities,
    /// Mutations not yet confirmed by the remote store
    PendingOperations,
    /// Recently resolved sync conflicts
    Conflicts,
    /// Per-partition sync bookkeeping (last successful sync)
    SyncState,
}

impl Namespace {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Entities => "",
            Self::PendingOperations => "pending-",
            Self::Conflicts => "conflicts-",
            Self::SyncState => "sync-",
        }
    }
}

/// Address of one stored document: a (namespace, entity type, user) partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub namespace: Namespace,
    pub kind: EntityKind,
    pub user_id: String,
}

impl StoreKey {
    pub fn new(namespace: Namespace, kind: EntityKind, user_id: impl Into<String>) -> Self {
        Self {
            namespace,
            kind,
            user_id: user_id.into(),
        }
    }

    pub fn entities(kind: EntityKind, user_id: &str) -> Self {
        Self::new(Namespace::Entities, kind, user_id)
    }

    pub fn pending(kind: EntityKind, user_id: &str) -> Self {
        Self::new(Namespace::PendingOperations, kind, user_id)
    }

    pub fn conflicts(kind: EntityKind, user_id: &str) -> Self {
        Self::new(Namespace::Conflicts, kind, user_id)
    }

    pub fn sync_state(kind: EntityKind, user_id: &str) -> Self {
        Self::new(Namespace::SyncState, kind, user_id)
    }

    /// File name derived from the namespace, collection, and user id.
    pub fn file_name(&self) -> String {
        format!(
            "{}{}-{}.json",
            self.namespace.prefix(),
            self.kind.collection(),
            encode_key_segment(&self.user_id)
        )
    }
}

/// Trait for local document storage backends
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read a document, `None` when it was never written
    async fn read(&self, key: &StoreKey) -> Result<Option<String>>;

    /// Replace a document atomically
    async fn write(&self, key: &StoreKey, contents: String) -> Result<()>;

    /// Remove a document if present
    async fn remove(&self, key: &StoreKey) -> Result<()>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Load a typed collection; a missing document is an empty collection.
pub async fn load_collection<T: DeserializeOwned>(
    store: &dyn LocalStore,
    key: &StoreKey,
) -> Result<Vec<T>> {
    let Some(raw) = store.read(key).await? else {
        return Ok(Vec::new());
    };
    serde_json::from_str(&raw).map_err(|error| {
        Error::LocalStorage(format!("failed to decode {}: {error}", key.file_name()))
    })
}

/// Serialize and atomically replace a typed collection.
pub async fn save_collection<T: Serialize + Sync>(
    store: &dyn LocalStore,
    key: &StoreKey,
    items: &[T],
) -> Result<()> {
    let raw = serde_json::to_string(items).map_err(|error| {
        Error::LocalStorage(format!("failed to encode {}: {error}", key.file_name()))
    })?;
    store.write(key, raw).await
}

/// Load a single typed document, `None` when it was never written.
pub async fn load_document<T: DeserializeOwned>(
    store: &dyn LocalStore,
    key: &StoreKey,
) -> Result<Option<T>> {
    let Some(raw) = store.read(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw).map(Some).map_err(|error| {
        Error::LocalStorage(format!("failed to decode {}: {error}", key.file_name()))
    })
}

/// Serialize and atomically replace a single typed document.
pub async fn save_document<T: Serialize + Sync>(
    store: &dyn LocalStore,
    key: &StoreKey,
    document: &T,
) -> Result<()> {
    let raw = serde_json::to_string(document).map_err(|error| {
        Error::LocalStorage(format!("failed to encode {}: {error}", key.file_name()))
    })?;
    store.write(key, raw).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Course;

    #[test]
    fn store_key_file_names_are_partitioned() {
        let user = "student@example.com";
        assert_eq!(
            StoreKey::entities(EntityKind::Assignment, user).file_name(),
            "assignments-student%40example.com.json"
        );
        assert_eq!(
            StoreKey::pending(EntityKind::CalendarEvent, user).file_name(),
            "pending-calendar_events-student%40example.com.json"
        );
        assert_eq!(
            StoreKey::conflicts(EntityKind::Course, "u1").file_name(),
            "conflicts-courses-u1.json"
        );
        assert_eq!(
            StoreKey::sync_state(EntityKind::Holiday, "u1").file_name(),
            "sync-holidays-u1.json"
        );
    }

    #[test]
    fn similar_user_ids_get_distinct_partitions() {
        let names: std::collections::HashSet<_> = ["a.b", "a_b", "a@b", "a/b", "a b"]
            .into_iter()
            .map(|user| StoreKey::entities(EntityKind::Course, user).file_name())
            .collect();
        assert_eq!(names.len(), 5);
    }

    #[tokio::test]
    async fn missing_collection_loads_empty() {
        let store = MemoryStore::new();
        let key = StoreKey::entities(EntityKind::Course, "u1");
        let courses: Vec<Course> = load_collection(&store, &key).await.unwrap();
        assert!(courses.is_empty());
    }

    #[tokio::test]
    async fn corrupt_document_is_a_local_storage_error() {
        let store = MemoryStore::new();
        let key = StoreKey::entities(EntityKind::Course, "u1");
        store.write(&key, "{not json".to_string()).await.unwrap();

        let error = load_collection::<Course>(&store, &key).await.unwrap_err();
        assert!(error.is_local_storage());
    }

    #[tokio::test]
    async fn saved_collection_loads_back() {
        let store = MemoryStore::new();
        let key = StoreKey::entities(EntityKind::Course, "u1");
        let course = Course::new("u1", "Physics I", "PHYS 151");

        save_collection(&store, &key, std::slice::from_ref(&course))
            .await
            .unwrap();
        let loaded: Vec<Course> = load_collection(&store, &key).await.unwrap();
        pretty_assertions::assert_eq!(loaded, vec![course]);
    }
}
