//! Remote document store abstraction.
//!
//! One [`RemoteDataProvider`] per entity type. Providers hold no entity state
//! of their own between calls and are shared freely between repositories.

mod memory;
mod rest;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{Entity, EntityId};
use crate::Result;

pub use memory::MemoryRemote;
pub use rest::RestRemote;

/// Callback invoked with the full remote set whenever it changes.
pub type ChangeCallback<E> = Arc<dyn Fn(Vec<E>) + Send + Sync>;

/// Token returned by [`RemoteDataProvider::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

/// CRUD and realtime operations against the remote store for one entity type
#[async_trait]
pub trait RemoteDataProvider<E: Entity>: Send + Sync {
    /// Every entity owned by `user_id`
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<E>>;

    /// Store a new entity
    async fn create(&self, entity: &E) -> Result<()>;

    /// Replace an existing entity
    async fn update(&self, entity: &E) -> Result<()>;

    /// Delete by id; deleting an absent id succeeds
    async fn delete(&self, id: &EntityId) -> Result<()>;

    /// Receive the user's full set on every remote change
    async fn subscribe(&self, user_id: &str, on_change: ChangeCallback<E>)
        -> Result<SubscriptionHandle>;

    /// Stop a subscription; unknown handles are ignored
    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}
