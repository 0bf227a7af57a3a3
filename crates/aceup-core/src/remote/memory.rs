//! In-process remote document store.
//!
//! Behaves like the hosted document database as far as the sync engine can
//! tell: upserting writes, realtime fan-out, and an availability switch to
//! simulate outages.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ChangeCallback, RemoteDataProvider, SubscriptionHandle};
use crate::models::{Entity, EntityId};
use crate::{Error, Result};

struct Inner<E> {
    documents: RwLock<BTreeMap<EntityId, E>>,
    subscribers: RwLock<HashMap<u64, (String, ChangeCallback<E>)>>,
    next_handle: AtomicU64,
    available: AtomicBool,
    latency: RwLock<Option<Duration>>,
    fetches: AtomicUsize,
    writes: AtomicUsize,
}

/// Shared in-memory document collection. Clones share the same data.
pub struct MemoryRemote<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for MemoryRemote<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Entity> Default for MemoryRemote<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> MemoryRemote<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                documents: RwLock::new(BTreeMap::new()),
                subscribers: RwLock::new(HashMap::new()),
                next_handle: AtomicU64::new(1),
                available: AtomicBool::new(true),
                latency: RwLock::new(None),
                fetches: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
            }),
        }
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Delay every call by `latency`.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.inner.latency.write().await = latency;
    }

    /// Write directly, as another device would.
    pub async fn insert(&self, entity: E) {
        let user_id = entity.user_id().to_string();
        self.inner
            .documents
            .write()
            .await
            .insert(entity.id().clone(), entity);
        self.notify(&user_id).await;
    }

    /// Delete directly, as another device would.
    pub async fn remove(&self, id: &EntityId) -> Option<E> {
        let removed = self.inner.documents.write().await.remove(id);
        if let Some(entity) = &removed {
            self.notify(entity.user_id()).await;
        }
        removed
    }

    /// Current documents owned by `user_id`, ordered by id.
    pub async fn snapshot(&self, user_id: &str) -> Vec<E> {
        self.inner
            .documents
            .read()
            .await
            .values()
            .filter(|entity| entity.user_id() == user_id)
            .cloned()
            .collect()
    }

    /// Number of `fetch_all` calls that reached the store
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Number of successful create/update/delete calls
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<()> {
        let latency = *self.inner.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.is_available() {
            Ok(())
        } else {
            Err(Error::Remote("remote store unavailable".to_string()))
        }
    }

    async fn upsert(&self, entity: &E) -> Result<()> {
        self.enter().await?;
        self.inner
            .documents
            .write()
            .await
            .insert(entity.id().clone(), entity.clone());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.notify(entity.user_id()).await;
        Ok(())
    }

    async fn notify(&self, user_id: &str) {
        let callbacks: Vec<ChangeCallback<E>> = self
            .inner
            .subscribers
            .read()
            .await
            .values()
            .filter(|(subscriber, _)| subscriber == user_id)
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        if callbacks.is_empty() {
            return;
        }

        let snapshot = self.snapshot(user_id).await;
        for callback in callbacks {
            callback(snapshot.clone());
        }
    }
}

#[async_trait]
impl<E: Entity> RemoteDataProvider<E> for MemoryRemote<E> {
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<E>> {
        self.enter().await?;
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot(user_id).await)
    }

    async fn create(&self, entity: &E) -> Result<()> {
        self.upsert(entity).await
    }

    async fn update(&self, entity: &E) -> Result<()> {
        self.upsert(entity).await
    }

    async fn delete(&self, id: &EntityId) -> Result<()> {
        self.enter().await?;
        let removed = self.inner.documents.write().await.remove(id);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(entity) = removed {
            self.notify(entity.user_id()).await;
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        user_id: &str,
        on_change: ChangeCallback<E>,
    ) -> Result<SubscriptionHandle> {
        let id = self.inner.next_handle.fetch_add(1, Ordering::SeqCst);
        self.inner
            .subscribers
            .write()
            .await
            .insert(id, (user_id.to_string(), on_change));
        Ok(SubscriptionHandle::new(id))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        self.inner.subscribers.write().await.remove(&handle.id());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Course;
    use std::sync::Mutex;

    #[tokio::test]
    async fn writes_are_upserts_scoped_by_user() {
        let remote = MemoryRemote::<Course>::new();
        let mut course = Course::new("u1", "Algebra", "MATH 101");
        remote.create(&course).await.unwrap();
        course.name = "Linear Algebra".to_string();
        remote.create(&course).await.unwrap();
        remote.create(&Course::new("u2", "Other", "X 1")).await.unwrap();

        let fetched = remote.fetch_all("u1").await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].name, "Linear Algebra");
        assert_eq!(remote.write_count(), 3);
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let remote = MemoryRemote::<Course>::new();
        remote.set_available(false);
        assert!(remote.fetch_all("u1").await.unwrap_err().is_remote());
        assert!(remote.delete(&EntityId::from("x")).await.is_err());
        assert_eq!(remote.fetch_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_user_snapshots() {
        let remote = MemoryRemote::<Course>::new();
        let seen: Arc<Mutex<Vec<usize>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let handle = remote
            .subscribe(
                "u1",
                Arc::new(move |items: Vec<Course>| sink.lock().unwrap().push(items.len())),
            )
            .await
            .unwrap();

        remote.insert(Course::new("u1", "A", "A 1")).await;
        remote.insert(Course::new("u2", "B", "B 1")).await;
        remote.insert(Course::new("u1", "C", "C 1")).await;
        remote.unsubscribe(handle).await.unwrap();
        remote.insert(Course::new("u1", "D", "D 1")).await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
