//! Local-first repository for one entity type.
//!
//! Every mutation lands in the local cache and the pending queue before the
//! call returns. When the network is up the queue is flushed opportunistically;
//! anything left over is replayed by the next [`OfflineRepository::sync_with_remote`].
//!
//! Locking: `push_lock` orders every remote write and is always taken before
//! `state`. A sync holds both for its whole run, so mutations issued meanwhile
//! wait on `state` and apply on top of the merged cache.

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, MutexGuard};

use crate::conflict::resolve;
use crate::identity::IdentityProvider;
use crate::models::{
    Assignment, AvailabilitySlot, CalendarEvent, Entity, EntityId, EntityKind, Holiday,
    SyncConflict, REMOTE_REJECTED,
};
use crate::network::NetworkMonitor;
use crate::queue::{OperationKind, PendingOperation, PendingQueue};
use crate::remote::{ChangeCallback, RemoteDataProvider, SubscriptionHandle};
use crate::store::{
    load_collection, load_document, save_collection, save_document, LocalStore, StoreKey,
};
use crate::util::{next_timestamp, now_millis};
use crate::{Error, Result};

/// Tunables shared by every repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Upper bound for each remote call, and for one opportunistic flush
    pub remote_timeout: Duration,
    /// Conflicts kept per (entity type, user) log
    pub conflict_log_limit: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(10),
            conflict_log_limit: 100,
        }
    }
}

/// Published after every mutation, sync and realtime merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataChange {
    pub kind: EntityKind,
    /// Pending operations left in this repository
    pub pending: usize,
}

/// Collaborators every repository is built from.
#[derive(Clone)]
pub struct RepositoryContext {
    pub store: Arc<dyn LocalStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub network: NetworkMonitor,
    pub changes: broadcast::Sender<DataChange>,
    pub config: RepositoryConfig,
}

impl RepositoryContext {
    pub fn new(
        store: Arc<dyn LocalStore>,
        identity: Arc<dyn IdentityProvider>,
        network: NetworkMonitor,
    ) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            store,
            identity,
            network,
            changes,
            config: RepositoryConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }
}

/// Result of one successful `sync_with_remote`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub kind: EntityKind,
    /// Pending operations confirmed by the remote during this sync
    pub replayed: usize,
    /// Entities returned by the remote fetch
    pub fetched: usize,
    /// Size of the merged local cache
    pub cached: usize,
    /// Local copies overwritten by the remote, plus queued changes it rejected
    pub conflicts: usize,
    pub duration: Duration,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SyncMetadata {
    last_sync_at: Option<DateTime<Utc>>,
}

struct RepoState<E> {
    /// Partition currently loaded; `None` until first access
    user_id: Option<String>,
    entities: Vec<E>,
    pending: PendingQueue<E>,
    last_sync_at: Option<DateTime<Utc>>,
}

impl<E: Entity> RepoState<E> {
    fn unloaded() -> Self {
        Self {
            user_id: None,
            entities: Vec::new(),
            pending: PendingQueue::new(),
            last_sync_at: None,
        }
    }

    fn position(&self, id: &EntityId) -> Option<usize> {
        self.entities.iter().position(|entity| entity.id() == id)
    }
}

/// Offline-first CRUD surface for entity type `E`
pub struct OfflineRepository<E: Entity> {
    remote: Arc<dyn RemoteDataProvider<E>>,
    context: RepositoryContext,
    state: Mutex<RepoState<E>>,
    push_lock: Mutex<()>,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

impl<E: Entity> OfflineRepository<E> {
    pub fn new(remote: Arc<dyn RemoteDataProvider<E>>, context: RepositoryContext) -> Self {
        Self {
            remote,
            context,
            state: Mutex::new(RepoState::unloaded()),
            push_lock: Mutex::new(()),
            subscription: Mutex::new(None),
        }
    }

    pub const fn kind(&self) -> EntityKind {
        E::KIND
    }

    /// Receive a notice after every change to this repository.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<DataChange> {
        self.context.changes.subscribe()
    }

    // ---- mutations ----

    /// Add a new entity locally and queue it for the remote.
    pub async fn create(&self, mut entity: E) -> Result<E> {
        entity.validate()?;
        let mut state = self.scoped_state().await?;
        let user_id = Self::loaded_user(&state)?;
        Self::check_owner(&entity, &user_id)?;
        if state.position(entity.id()).is_some() {
            return Err(Error::InvalidInput(format!(
                "{} {} already exists",
                E::KIND,
                entity.id()
            )));
        }

        entity.touch();
        let mut entities = state.entities.clone();
        entities.push(entity.clone());
        self.commit(&mut state, &user_id, entities, OperationKind::Create, entity.clone())
            .await?;
        drop(state);

        tracing::debug!("Created {} {}", E::KIND, entity.id());
        self.push_opportunistically().await;
        Ok(entity)
    }

    /// Replace an existing entity locally and queue the change.
    pub async fn update(&self, mut entity: E) -> Result<E> {
        entity.validate()?;
        let mut state = self.scoped_state().await?;
        let user_id = Self::loaded_user(&state)?;
        Self::check_owner(&entity, &user_id)?;
        let index = state
            .position(entity.id())
            .ok_or_else(|| Error::not_found(E::KIND, entity.id().as_str()))?;

        let previous = state.entities[index].updated_at().max(entity.updated_at());
        entity.set_updated_at(next_timestamp(previous));
        let mut entities = state.entities.clone();
        entities[index] = entity.clone();
        self.commit(&mut state, &user_id, entities, OperationKind::Update, entity.clone())
            .await?;
        drop(state);

        tracing::debug!("Updated {} {}", E::KIND, entity.id());
        self.push_opportunistically().await;
        Ok(entity)
    }

    /// Remove an entity locally and queue the deletion.
    ///
    /// Returns `false` without touching anything when the id is unknown.
    pub async fn delete(&self, id: &EntityId) -> Result<bool> {
        let mut state = self.scoped_state().await?;
        let user_id = Self::loaded_user(&state)?;
        let Some(index) = state.position(id) else {
            return Ok(false);
        };

        let mut entities = state.entities.clone();
        let removed = entities.remove(index);
        self.commit(&mut state, &user_id, entities, OperationKind::Delete, removed)
            .await?;
        drop(state);

        tracing::debug!("Deleted {} {id}", E::KIND);
        self.push_opportunistically().await;
        Ok(true)
    }

    /// Persist the grown pending log, then the new cache. `state` only
    /// changes once both writes landed; a failed cache write restores the
    /// previous pending log.
    async fn commit(
        &self,
        state: &mut RepoState<E>,
        user_id: &str,
        entities: Vec<E>,
        kind: OperationKind,
        payload: E,
    ) -> Result<()> {
        let mut pending = state.pending.clone();
        pending.enqueue(kind, payload);
        self.persist_pending(user_id, &pending).await?;

        if let Err(error) = self.persist_entities(user_id, &entities).await {
            if let Err(rollback) = self.persist_pending(user_id, &state.pending).await {
                tracing::error!("Failed to roll back {} pending log: {rollback}", E::KIND);
            }
            return Err(error);
        }

        state.entities = entities;
        state.pending = pending;
        self.notify(state.pending.len());
        Ok(())
    }

    // ---- remote reconciliation ----

    /// Push pending operations, fetch the remote set, and merge it into the
    /// cache with remote-wins semantics.
    ///
    /// Any transient remote failure leaves the cache untouched; operations the
    /// remote already confirmed stay removed from the queue. Operations the
    /// remote rejects for good are dropped and logged as conflicts so the
    /// fetch still runs.
    pub async fn sync_with_remote(&self) -> Result<SyncOutcome> {
        let started = Instant::now();
        let _push = self.push_lock.lock().await;
        let mut state = self.scoped_state().await?;
        let user_id = Self::loaded_user(&state)?;

        let mut replayed = 0;
        let mut rejected = 0;
        while let Some(operation) = state.pending.front().cloned() {
            match self.push_operation(&operation).await {
                Ok(()) => replayed += 1,
                Err(error) if error.is_rejected() => {
                    self.discard_rejected(&mut state, &user_id, &operation, &error)
                        .await?;
                    rejected += 1;
                }
                Err(error) => {
                    if replayed + rejected > 0 {
                        self.notify(state.pending.len());
                    }
                    return Err(error);
                }
            }
            state.pending.remove(operation.id);
            self.persist_pending(&user_id, &state.pending).await?;
        }

        let remote = self
            .with_timeout("fetch", self.remote.fetch_all(&user_id))
            .await?;
        let fetched = remote.len();
        let resolution = resolve(&state.entities, remote);
        self.persist_entities(&user_id, &resolution.merged).await?;
        state.entities = resolution.merged;

        let merged = resolution.conflicts.len();
        if merged > 0 {
            tracing::info!("{merged} {} conflict(s) resolved remote-wins", E::KIND);
            self.record_conflicts(&user_id, resolution.conflicts).await;
        }
        let conflicts = merged + rejected;

        let now = Utc::now();
        save_document(
            &*self.context.store,
            &StoreKey::sync_state(E::KIND, &user_id),
            &SyncMetadata {
                last_sync_at: Some(now),
            },
        )
        .await?;
        state.last_sync_at = Some(now);

        let outcome = SyncOutcome {
            kind: E::KIND,
            replayed,
            fetched,
            cached: state.entities.len(),
            conflicts,
            duration: started.elapsed(),
        };
        self.notify(state.pending.len());
        drop(state);

        tracing::debug!(
            "Synced {}: replayed {replayed}, fetched {fetched}, cached {}",
            E::KIND,
            outcome.cached
        );
        Ok(outcome)
    }

    /// Sync when online, otherwise reload the cache from the local store.
    pub async fn refresh_data(&self) -> Result<()> {
        if self.context.network.current_status() {
            self.sync_with_remote().await.map(drop)
        } else {
            let user_id = self.context.identity.require_user_id()?;
            let mut state = self.state.lock().await;
            *state = self.load_state(&user_id).await?;
            self.notify(state.pending.len());
            Ok(())
        }
    }

    /// Push queued operations in order, stopping at the first transient
    /// failure. Rejected operations are discarded along the way.
    ///
    /// Returns how many the remote confirmed.
    pub async fn flush_pending(&self) -> Result<usize> {
        let _push = self.push_lock.lock().await;
        let mut pushed = 0;
        loop {
            let (user_id, operation) = {
                let state = self.scoped_state().await?;
                let Some(operation) = state.pending.front().cloned() else {
                    break;
                };
                (Self::loaded_user(&state)?, operation)
            };

            let rejection = match self.push_operation(&operation).await {
                Ok(()) => None,
                Err(error) if error.is_rejected() => Some(error),
                Err(error) => return Err(error),
            };

            let mut state = self.scoped_state().await?;
            if state.user_id.as_deref() == Some(user_id.as_str())
                && state.pending.front().map(|front| front.id) == Some(operation.id)
            {
                if let Some(error) = &rejection {
                    self.discard_rejected(&mut state, &user_id, &operation, error)
                        .await?;
                }
                state.pending.remove(operation.id);
                self.persist_pending(&user_id, &state.pending).await?;
                self.notify(state.pending.len());
            }
            if rejection.is_none() {
                pushed += 1;
            }
        }
        Ok(pushed)
    }

    async fn push_opportunistically(&self) {
        if !self.context.network.current_status() {
            return;
        }

        let timeout = self.context.config.remote_timeout;
        match tokio::time::timeout(timeout, self.flush_pending()).await {
            Ok(Ok(0)) => {}
            Ok(Ok(pushed)) => tracing::debug!("Pushed {pushed} pending {} operation(s)", E::KIND),
            Ok(Err(error)) => {
                tracing::warn!("Remote write for {} deferred to next sync: {error}", E::KIND);
            }
            Err(_) => {
                tracing::warn!(
                    "Remote write for {} timed out after {timeout:?}; deferred to next sync",
                    E::KIND
                );
            }
        }
    }

    async fn push_operation(&self, operation: &PendingOperation<E>) -> Result<()> {
        let payload = &operation.payload;
        match operation.kind {
            OperationKind::Create => {
                self.with_timeout("create", self.remote.create(payload))
                    .await
            }
            OperationKind::Update => {
                self.with_timeout("update", self.remote.update(payload))
                    .await
            }
            OperationKind::Delete => {
                self.with_timeout("delete", self.remote.delete(payload.id()))
                    .await
            }
        }
    }

    /// Forget the local side of an operation the remote will never accept.
    /// The next fetch decides what the cache holds for that id.
    async fn discard_rejected(
        &self,
        state: &mut RepoState<E>,
        user_id: &str,
        operation: &PendingOperation<E>,
        error: &Error,
    ) -> Result<()> {
        let id = operation.payload.id();
        tracing::warn!(
            "Dropping {:?} of {} {id} after remote rejection: {error}",
            operation.kind,
            E::KIND
        );

        if operation.kind != OperationKind::Delete {
            if let Some(index) = state.position(id) {
                let mut entities = state.entities.clone();
                entities.remove(index);
                self.persist_entities(user_id, &entities).await?;
                state.entities = entities;
            }
        }

        let conflict = SyncConflict {
            entity_kind: E::KIND,
            entity_id: id.clone(),
            local_updated_at: operation.payload.updated_at(),
            remote_updated_at: 0,
            resolved_at: now_millis(),
            strategy: REMOTE_REJECTED.to_string(),
        };
        self.record_conflicts(user_id, vec![conflict]).await;
        Ok(())
    }

    async fn with_timeout<T>(
        &self,
        operation: &str,
        call: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let timeout = self.context.config.remote_timeout;
        tokio::time::timeout(timeout, call).await.map_err(|_| {
            Error::Remote(format!(
                "{operation} {} timed out after {timeout:?}",
                E::KIND
            ))
        })?
    }

    // ---- realtime ----

    /// Merge remote snapshots into the cache as they arrive.
    pub async fn start_realtime(self: &Arc<Self>) -> Result<()> {
        let user_id = self.context.identity.require_user_id()?;
        let mut subscription = self.subscription.lock().await;
        if subscription.is_some() {
            return Ok(());
        }

        let repository: Weak<Self> = Arc::downgrade(self);
        let on_change: ChangeCallback<E> = Arc::new(move |snapshot: Vec<E>| {
            let Some(repository) = repository.upgrade() else {
                return;
            };
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                return;
            };
            runtime.spawn(async move {
                if let Err(error) = repository.apply_remote_snapshot(snapshot).await {
                    tracing::warn!("Failed to apply realtime {} update: {error}", E::KIND);
                }
            });
        });

        let handle = self.remote.subscribe(&user_id, on_change).await?;
        *subscription = Some(handle);
        tracing::debug!("Realtime updates started for {}", E::KIND);
        Ok(())
    }

    pub async fn stop_realtime(&self) -> Result<()> {
        let handle = self.subscription.lock().await.take();
        if let Some(handle) = handle {
            self.remote.unsubscribe(handle).await?;
        }
        Ok(())
    }

    async fn apply_remote_snapshot(&self, snapshot: Vec<E>) -> Result<()> {
        let mut state = self.scoped_state().await?;
        let user_id = Self::loaded_user(&state)?;
        if snapshot.iter().any(|entity| entity.user_id() != user_id) {
            tracing::debug!("Ignoring realtime {} snapshot for another user", E::KIND);
            return Ok(());
        }

        // Ids with queued operations keep their local state until the queue
        // is replayed; the snapshot may predate those writes.
        let held: HashSet<&EntityId> = state
            .pending
            .iter()
            .map(|operation| operation.payload.id())
            .collect();
        let snapshot: Vec<E> = snapshot
            .into_iter()
            .filter(|entity| !held.contains(entity.id()))
            .collect();

        let resolution = resolve(&state.entities, snapshot);
        self.persist_entities(&user_id, &resolution.merged).await?;
        state.entities = resolution.merged;
        if !resolution.conflicts.is_empty() {
            self.record_conflicts(&user_id, resolution.conflicts).await;
        }
        self.notify(state.pending.len());
        Ok(())
    }

    // ---- reads ----

    pub async fn list(&self) -> Result<Vec<E>> {
        Ok(self.scoped_state().await?.entities.clone())
    }

    pub async fn get(&self, id: &EntityId) -> Result<Option<E>> {
        let state = self.scoped_state().await?;
        Ok(state
            .entities
            .iter()
            .find(|entity| entity.id() == id)
            .cloned())
    }

    /// Entities matching `predicate`, in cache order.
    pub async fn filter<P>(&self, predicate: P) -> Result<Vec<E>>
    where
        P: Fn(&E) -> bool + Send,
    {
        let state = self.scoped_state().await?;
        Ok(state
            .entities
            .iter()
            .filter(|entity| predicate(entity))
            .cloned()
            .collect())
    }

    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.scoped_state().await?.pending.len())
    }

    pub async fn pending_operations(&self) -> Result<Vec<PendingOperation<E>>> {
        Ok(self.scoped_state().await?.pending.to_vec())
    }

    pub async fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.scoped_state().await?.last_sync_at)
    }

    /// Most recent conflicts first.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let user_id = self.context.identity.require_user_id()?;
        let mut conflicts: Vec<SyncConflict> = load_collection(
            &*self.context.store,
            &StoreKey::conflicts(E::KIND, &user_id),
        )
        .await?;
        conflicts.reverse();
        conflicts.truncate(limit);
        Ok(conflicts)
    }

    // ---- persistence ----

    /// Lock the state, loading the current user's partition on first use or
    /// after the signed-in user changed.
    async fn scoped_state(&self) -> Result<MutexGuard<'_, RepoState<E>>> {
        let user_id = self.context.identity.require_user_id()?;
        let mut state = self.state.lock().await;
        if state.user_id.as_deref() != Some(user_id.as_str()) {
            *state = self.load_state(&user_id).await?;
        }
        Ok(state)
    }

    async fn load_state(&self, user_id: &str) -> Result<RepoState<E>> {
        let store = &*self.context.store;
        let mut entities: Vec<E> =
            load_collection(store, &StoreKey::entities(E::KIND, user_id)).await?;
        let loaded = entities.len();
        entities.retain(|entity| entity.user_id() == user_id);
        if entities.len() < loaded {
            tracing::warn!(
                "Ignored {} cached {} owned by another user",
                loaded - entities.len(),
                E::KIND
            );
        }
        let pending = load_collection(store, &StoreKey::pending(E::KIND, user_id)).await?;
        let metadata: SyncMetadata = load_document(store, &StoreKey::sync_state(E::KIND, user_id))
            .await?
            .unwrap_or_default();

        Ok(RepoState {
            user_id: Some(user_id.to_string()),
            entities,
            pending: PendingQueue::from_operations(pending),
            last_sync_at: metadata.last_sync_at,
        })
    }

    async fn persist_entities(&self, user_id: &str, entities: &[E]) -> Result<()> {
        save_collection(
            &*self.context.store,
            &StoreKey::entities(E::KIND, user_id),
            entities,
        )
        .await
    }

    async fn persist_pending(&self, user_id: &str, pending: &PendingQueue<E>) -> Result<()> {
        save_collection(
            &*self.context.store,
            &StoreKey::pending(E::KIND, user_id),
            &pending.to_vec(),
        )
        .await
    }

    /// Conflict bookkeeping never fails the sync that produced it.
    async fn record_conflicts(&self, user_id: &str, conflicts: Vec<SyncConflict>) {
        let store = &*self.context.store;
        let key = StoreKey::conflicts(E::KIND, user_id);
        let result = async {
            let mut log: Vec<SyncConflict> = load_collection(store, &key).await?;
            log.extend(conflicts);
            let limit = self.context.config.conflict_log_limit;
            if log.len() > limit {
                log.drain(..log.len() - limit);
            }
            save_collection(store, &key, &log).await
        }
        .await;

        if let Err(error) = result {
            tracing::warn!("Failed to record {} conflicts: {error}", E::KIND);
        }
    }

    fn notify(&self, pending: usize) {
        // No receivers is fine.
        let _ = self.context.changes.send(DataChange {
            kind: E::KIND,
            pending,
        });
    }

    fn loaded_user(state: &RepoState<E>) -> Result<String> {
        state.user_id.clone().ok_or(Error::AuthenticationRequired)
    }

    fn check_owner(entity: &E, user_id: &str) -> Result<()> {
        if entity.user_id() == user_id {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "{} {} belongs to another user",
                E::KIND,
                entity.id()
            )))
        }
    }
}

impl OfflineRepository<Assignment> {
    /// Assignments still pending, soonest due first.
    pub async fn pending(&self) -> Result<Vec<Assignment>> {
        let mut pending = self.filter(Assignment::is_pending).await?;
        pending.sort_by_key(|assignment| assignment.due_date);
        Ok(pending)
    }

    pub async fn for_course(&self, course_id: &str) -> Result<Vec<Assignment>> {
        self.filter(|assignment| assignment.course_id == course_id)
            .await
    }
}

impl OfflineRepository<CalendarEvent> {
    /// Events overlapping `[start, end)`, earliest first.
    pub async fn between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let mut events = self.filter(|event| event.overlaps(start, end)).await?;
        events.sort_by_key(|event| event.starts_at);
        Ok(events)
    }
}

impl OfflineRepository<Holiday> {
    /// Holidays on or after `from`, in date order.
    pub async fn upcoming(&self, from: NaiveDate) -> Result<Vec<Holiday>> {
        let mut holidays = self.filter(|holiday| holiday.date >= from).await?;
        holidays.sort_by_key(|holiday| holiday.date);
        Ok(holidays)
    }
}

impl OfflineRepository<AvailabilitySlot> {
    pub async fn for_weekday(&self, weekday: Weekday) -> Result<Vec<AvailabilitySlot>> {
        let mut slots = self.filter(|slot| slot.weekday == weekday).await?;
        slots.sort_by_key(|slot| slot.start_minute);
        Ok(slots)
    }
}

/// Type-erased view of a repository for the sync manager
#[async_trait]
pub trait SyncTarget: Send + Sync {
    fn kind(&self) -> EntityKind;

    async fn sync(&self) -> Result<SyncOutcome>;

    async fn pending_count(&self) -> Result<usize>;

    async fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>>;

    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>>;
}

#[async_trait]
impl<E: Entity> SyncTarget for OfflineRepository<E> {
    fn kind(&self) -> EntityKind {
        E::KIND
    }

    async fn sync(&self) -> Result<SyncOutcome> {
        self.sync_with_remote().await
    }

    async fn pending_count(&self) -> Result<usize> {
        Self::pending_count(self).await
    }

    async fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>> {
        Self::last_sync_at(self).await
    }

    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        Self::list_conflicts(self, limit).await
    }
}
