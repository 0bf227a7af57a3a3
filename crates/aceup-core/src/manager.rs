//! Synchronization manager.
//!
//! Owns one [`OfflineRepository`] per entity type and decides when they sync:
//! on every offline-to-online transition (full), on a fixed timer (light), and
//! on demand. Observers follow progress through a `watch` channel of
//! [`SyncSnapshot`]s.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::analytics::{AnalyticsSink, EventProperties, NoopAnalytics};
use crate::identity::IdentityProvider;
use crate::models::{
    Assignment, AvailabilitySlot, CalendarEvent, Course, EntityKind, Holiday, SyncConflict,
    WorkloadAnalysis,
};
use crate::network::NetworkMonitor;
use crate::remote::{MemoryRemote, RemoteDataProvider, RestRemote};
use crate::repository::{
    DataChange, OfflineRepository, RepositoryConfig, RepositoryContext, SyncOutcome, SyncTarget,
};
use crate::state::{SyncSnapshot, SyncStatus};
use crate::store::LocalStore;
use crate::util::is_http_url;
use crate::{Error, Result};

/// Scheduling tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Period of the background light sync
    pub light_sync_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            light_sync_interval: Duration::from_secs(30 * 60),
        }
    }
}

/// Which repositories a cycle covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    /// Assignments only
    Light,
    /// Every entity type
    Full,
}

impl SyncScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Full => "full",
        }
    }

    pub const fn kinds(self) -> &'static [EntityKind] {
        match self {
            Self::Light => &[EntityKind::Assignment],
            Self::Full => &EntityKind::ALL,
        }
    }
}

/// What one sync cycle did.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub scope: SyncScope,
    /// The cycle did not run because the network was down
    pub skipped: bool,
    pub outcomes: Vec<SyncOutcome>,
    pub failures: Vec<(EntityKind, String)>,
    pub duration: Duration,
}

impl SyncReport {
    fn skipped(scope: SyncScope) -> Self {
        Self {
            scope,
            skipped: true,
            outcomes: Vec::new(),
            failures: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        !self.skipped && self.failures.is_empty()
    }
}

/// One remote provider per entity type.
#[derive(Clone)]
pub struct RemoteProviders {
    pub assignments: Arc<dyn RemoteDataProvider<Assignment>>,
    pub holidays: Arc<dyn RemoteDataProvider<Holiday>>,
    pub courses: Arc<dyn RemoteDataProvider<Course>>,
    pub calendar_events: Arc<dyn RemoteDataProvider<CalendarEvent>>,
    pub availability: Arc<dyn RemoteDataProvider<AvailabilitySlot>>,
    pub workload_analyses: Arc<dyn RemoteDataProvider<WorkloadAnalysis>>,
}

impl RemoteProviders {
    /// REST providers sharing one HTTP client.
    pub fn rest(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !is_http_url(&base_url) {
            return Err(Error::Config(
                "remote base URL must include http:// or https://".to_string(),
            ));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let poll_interval = Duration::from_secs(30);

        Ok(Self {
            assignments: Arc::new(
                RestRemote::<Assignment>::with_client(base_url.clone(), client.clone())
                    .with_poll_interval(poll_interval),
            ),
            holidays: Arc::new(
                RestRemote::<Holiday>::with_client(base_url.clone(), client.clone())
                    .with_poll_interval(poll_interval),
            ),
            courses: Arc::new(
                RestRemote::<Course>::with_client(base_url.clone(), client.clone())
                    .with_poll_interval(poll_interval),
            ),
            calendar_events: Arc::new(
                RestRemote::<CalendarEvent>::with_client(base_url.clone(), client.clone())
                    .with_poll_interval(poll_interval),
            ),
            availability: Arc::new(
                RestRemote::<AvailabilitySlot>::with_client(base_url.clone(), client.clone())
                    .with_poll_interval(poll_interval),
            ),
            workload_analyses: Arc::new(
                RestRemote::<WorkloadAnalysis>::with_client(base_url, client)
                    .with_poll_interval(poll_interval),
            ),
        })
    }
}

/// In-process remotes, kept as concrete handles for inspection.
#[derive(Clone, Default)]
pub struct MemoryRemotes {
    pub assignments: MemoryRemote<Assignment>,
    pub holidays: MemoryRemote<Holiday>,
    pub courses: MemoryRemote<Course>,
    pub calendar_events: MemoryRemote<CalendarEvent>,
    pub availability: MemoryRemote<AvailabilitySlot>,
    pub workload_analyses: MemoryRemote<WorkloadAnalysis>,
}

impl MemoryRemotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn providers(&self) -> RemoteProviders {
        RemoteProviders {
            assignments: Arc::new(self.assignments.clone()),
            holidays: Arc::new(self.holidays.clone()),
            courses: Arc::new(self.courses.clone()),
            calendar_events: Arc::new(self.calendar_events.clone()),
            availability: Arc::new(self.availability.clone()),
            workload_analyses: Arc::new(self.workload_analyses.clone()),
        }
    }
}

/// Shared collaborators for the manager and its repositories.
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn LocalStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub network: NetworkMonitor,
    pub analytics: Arc<dyn AnalyticsSink>,
    pub repository: RepositoryConfig,
    pub sync: SyncConfig,
}

impl SyncContext {
    pub fn new(
        store: Arc<dyn LocalStore>,
        identity: Arc<dyn IdentityProvider>,
        network: NetworkMonitor,
    ) -> Self {
        Self {
            store,
            identity,
            network,
            analytics: Arc::new(NoopAnalytics),
            repository: RepositoryConfig::default(),
            sync: SyncConfig::default(),
        }
    }

    #[must_use]
    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    #[must_use]
    pub const fn with_repository_config(mut self, config: RepositoryConfig) -> Self {
        self.repository = config;
        self
    }

    #[must_use]
    pub const fn with_sync_config(mut self, config: SyncConfig) -> Self {
        self.sync = config;
        self
    }
}

/// Drives synchronization of every entity type.
pub struct SyncManager {
    assignments: Arc<OfflineRepository<Assignment>>,
    holidays: Arc<OfflineRepository<Holiday>>,
    courses: Arc<OfflineRepository<Course>>,
    calendar_events: Arc<OfflineRepository<CalendarEvent>>,
    availability: Arc<OfflineRepository<AvailabilitySlot>>,
    workload_analyses: Arc<OfflineRepository<WorkloadAnalysis>>,
    targets: Vec<Arc<dyn SyncTarget>>,
    network: NetworkMonitor,
    analytics: Arc<dyn AnalyticsSink>,
    config: SyncConfig,
    changes: broadcast::Sender<DataChange>,
    snapshot: watch::Sender<SyncSnapshot>,
    pending_by_kind: Mutex<BTreeMap<EntityKind, usize>>,
    in_flight: AtomicUsize,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncManager {
    pub fn new(context: SyncContext, remotes: RemoteProviders) -> Self {
        let repository_context = RepositoryContext::new(
            Arc::clone(&context.store),
            Arc::clone(&context.identity),
            context.network.clone(),
        )
        .with_config(context.repository);
        let changes = repository_context.changes.clone();

        let assignments = Arc::new(OfflineRepository::new(
            remotes.assignments,
            repository_context.clone(),
        ));
        let holidays = Arc::new(OfflineRepository::new(
            remotes.holidays,
            repository_context.clone(),
        ));
        let courses = Arc::new(OfflineRepository::new(
            remotes.courses,
            repository_context.clone(),
        ));
        let calendar_events = Arc::new(OfflineRepository::new(
            remotes.calendar_events,
            repository_context.clone(),
        ));
        let availability = Arc::new(OfflineRepository::new(
            remotes.availability,
            repository_context.clone(),
        ));
        let workload_analyses = Arc::new(OfflineRepository::new(
            remotes.workload_analyses,
            repository_context,
        ));

        let targets: Vec<Arc<dyn SyncTarget>> = vec![
            assignments.clone(),
            holidays.clone(),
            courses.clone(),
            calendar_events.clone(),
            availability.clone(),
            workload_analyses.clone(),
        ];

        let (snapshot, _) = watch::channel(SyncSnapshot {
            is_online: context.network.current_status(),
            ..SyncSnapshot::default()
        });

        Self {
            assignments,
            holidays,
            courses,
            calendar_events,
            availability,
            workload_analyses,
            targets,
            network: context.network,
            analytics: context.analytics,
            config: context.sync,
            changes,
            snapshot,
            pending_by_kind: Mutex::new(BTreeMap::new()),
            in_flight: AtomicUsize::new(0),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub const fn assignments(&self) -> &Arc<OfflineRepository<Assignment>> {
        &self.assignments
    }

    pub const fn holidays(&self) -> &Arc<OfflineRepository<Holiday>> {
        &self.holidays
    }

    pub const fn courses(&self) -> &Arc<OfflineRepository<Course>> {
        &self.courses
    }

    pub const fn calendar_events(&self) -> &Arc<OfflineRepository<CalendarEvent>> {
        &self.calendar_events
    }

    pub const fn availability(&self) -> &Arc<OfflineRepository<AvailabilitySlot>> {
        &self.availability
    }

    pub const fn workload_analyses(&self) -> &Arc<OfflineRepository<WorkloadAnalysis>> {
        &self.workload_analyses
    }

    pub const fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    /// Type-erased repository for `kind`.
    pub fn target(&self, kind: EntityKind) -> Option<Arc<dyn SyncTarget>> {
        self.targets
            .iter()
            .find(|target| target.kind() == kind)
            .cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Spawn the reachability watcher, the light-sync timer and the change
    /// listener. Calling it again replaces the running tasks.
    pub async fn start(self: &Arc<Self>) {
        self.shutdown();
        self.refresh_pending_count().await;

        let online = self.network.current_status();
        self.publish(|snapshot| snapshot.is_online = online);

        let tasks = vec![
            self.spawn_network_watcher(),
            self.spawn_periodic_sync(),
            self.spawn_change_listener(),
        ];
        *self.tasks.lock().unwrap_or_else(PoisonError::into_inner) = tasks;
        tracing::info!(
            "Sync manager started (online: {online}, light sync every {:?})",
            self.config.light_sync_interval
        );
    }

    /// Stop background tasks. In-flight cycles run to completion.
    pub fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            task.abort();
        }
    }

    /// Sync every entity type.
    pub async fn trigger_full_sync(&self) -> SyncReport {
        self.run_cycle(SyncScope::Full).await
    }

    /// Sync assignments only.
    pub async fn trigger_light_sync(&self) -> SyncReport {
        self.run_cycle(SyncScope::Light).await
    }

    /// Start realtime merging on every repository.
    pub async fn start_realtime(&self) -> Result<()> {
        self.assignments.start_realtime().await?;
        self.holidays.start_realtime().await?;
        self.courses.start_realtime().await?;
        self.calendar_events.start_realtime().await?;
        self.availability.start_realtime().await?;
        self.workload_analyses.start_realtime().await
    }

    pub async fn stop_realtime(&self) -> Result<()> {
        self.assignments.stop_realtime().await?;
        self.holidays.stop_realtime().await?;
        self.courses.stop_realtime().await?;
        self.calendar_events.stop_realtime().await?;
        self.availability.stop_realtime().await?;
        self.workload_analyses.stop_realtime().await
    }

    /// Pending operations per entity type.
    pub async fn pending_counts(&self) -> Result<BTreeMap<EntityKind, usize>> {
        let mut counts = BTreeMap::new();
        for target in &self.targets {
            counts.insert(target.kind(), target.pending_count().await?);
        }
        Ok(counts)
    }

    /// Last successful sync per entity type.
    pub async fn last_sync_times(&self) -> Result<BTreeMap<EntityKind, Option<DateTime<Utc>>>> {
        let mut times = BTreeMap::new();
        for target in &self.targets {
            times.insert(target.kind(), target.last_sync_at().await?);
        }
        Ok(times)
    }

    /// Most recent conflicts across every entity type, newest first.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut conflicts = Vec::new();
        for target in &self.targets {
            conflicts.extend(target.list_conflicts(limit).await?);
        }
        conflicts.sort_by(|a, b| b.resolved_at.cmp(&a.resolved_at));
        conflicts.truncate(limit);
        Ok(conflicts)
    }

    async fn run_cycle(&self, scope: SyncScope) -> SyncReport {
        if !self.network.current_status() {
            tracing::debug!("Skipping {} sync while offline", scope.as_str());
            return SyncReport::skipped(scope);
        }

        let targets: Vec<Arc<dyn SyncTarget>> = self
            .targets
            .iter()
            .filter(|target| scope.kinds().contains(&target.kind()))
            .cloned()
            .collect();
        let total = targets.len();

        let started = Instant::now();
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.publish(|snapshot| {
            snapshot.is_syncing = true;
            snapshot.status = SyncStatus::Syncing;
            snapshot.progress = 0.0;
        });
        tracing::info!("Starting {} sync of {total} entity type(s)", scope.as_str());

        let mut outcomes = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (done, target) in targets.iter().enumerate() {
            match target.sync().await {
                Ok(outcome) => outcomes.push(outcome),
                Err(error) => {
                    tracing::warn!("Sync of {} failed: {error}", target.kind());
                    failures.push((target.kind(), error.to_string()));
                }
            }
            #[allow(clippy::cast_precision_loss)]
            let progress = (done + 1) as f32 / total as f32;
            self.publish(|snapshot| snapshot.progress = progress);
        }

        let pending = self.refresh_pending_count().await;
        let duration = started.elapsed();
        let last_to_finish = self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1;
        let succeeded = failures.is_empty();
        let online = self.network.current_status();
        let finished_at = Utc::now();
        self.publish(|snapshot| {
            if succeeded {
                snapshot.last_sync_at = Some(finished_at);
            }
            if last_to_finish {
                snapshot.is_syncing = false;
                snapshot.status = if !online {
                    SyncStatus::Offline
                } else if succeeded {
                    SyncStatus::Synced
                } else {
                    SyncStatus::Error
                };
            }
        });

        self.track_cycle(scope, duration, &targets, pending, failures.len());
        if succeeded {
            tracing::info!(
                "Finished {} sync in {}ms ({pending} pending)",
                scope.as_str(),
                duration.as_millis()
            );
        } else {
            tracing::error!(
                "{} sync finished with {} failure(s)",
                scope.as_str(),
                failures.len()
            );
        }

        SyncReport {
            scope,
            skipped: false,
            outcomes,
            failures,
            duration,
        }
    }

    fn track_cycle(
        &self,
        scope: SyncScope,
        duration: Duration,
        targets: &[Arc<dyn SyncTarget>],
        pending: usize,
        failed: usize,
    ) {
        let event = if failed == 0 {
            "sync_completed"
        } else {
            "sync_failed"
        };
        let entity_types: Vec<Value> = targets
            .iter()
            .map(|target| Value::from(target.kind().collection()))
            .collect();

        let mut properties = EventProperties::new();
        properties.insert("scope".to_string(), Value::from(scope.as_str()));
        properties.insert(
            "duration_ms".to_string(),
            Value::from(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)),
        );
        properties.insert("entity_types".to_string(), Value::Array(entity_types));
        properties.insert("pending".to_string(), Value::from(pending));
        properties.insert("failed".to_string(), Value::from(failed));
        self.analytics.track(event, properties);
    }

    /// Recount pending operations from every repository and publish the sum.
    async fn refresh_pending_count(&self) -> usize {
        let mut counts = BTreeMap::new();
        for target in &self.targets {
            match target.pending_count().await {
                Ok(count) => {
                    counts.insert(target.kind(), count);
                }
                Err(Error::AuthenticationRequired) => {}
                Err(error) => {
                    tracing::debug!("Failed to count pending {}: {error}", target.kind());
                }
            }
        }
        let total = counts.values().sum();
        *self
            .pending_by_kind
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = counts;
        self.publish(|snapshot| snapshot.pending_sync_count = total);
        total
    }

    fn apply_change(&self, change: DataChange) {
        let total = {
            let mut counts = self
                .pending_by_kind
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            counts.insert(change.kind, change.pending);
            counts.values().sum()
        };
        self.publish(|snapshot| snapshot.pending_sync_count = total);
    }

    fn publish(&self, update: impl FnOnce(&mut SyncSnapshot)) {
        self.snapshot.send_modify(update);
    }

    fn spawn_network_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let mut receiver = self.network.subscribe();
        tokio::spawn(async move {
            let initially_online = *receiver.borrow_and_update();
            if initially_online {
                if let Some(manager) = manager.upgrade() {
                    manager.trigger_full_sync().await;
                }
            }

            while receiver.changed().await.is_ok() {
                let online = *receiver.borrow_and_update();
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.handle_transition(online).await;
            }
        })
    }

    async fn handle_transition(&self, online: bool) {
        if online {
            self.publish(|snapshot| snapshot.is_online = true);
            tracing::info!("Back online; starting full sync");
            self.trigger_full_sync().await;
        } else {
            self.publish(|snapshot| {
                snapshot.is_online = false;
                if snapshot.is_syncing {
                    return;
                }
                snapshot.status = SyncStatus::Offline;
            });
        }
    }

    fn spawn_periodic_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = self.config.light_sync_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.trigger_light_sync().await;
            }
        })
    }

    fn spawn_change_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let mut receiver = self.changes.subscribe();
        tokio::spawn(async move {
            loop {
                let received = receiver.recv().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                match received {
                    Ok(change) => manager.apply_change(change),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Change listener lagged by {skipped}; recounting");
                        manager.refresh_pending_count().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    const USER: &str = "student-1";

    #[derive(Default)]
    struct RecordingAnalytics {
        events: Mutex<Vec<(String, EventProperties)>>,
    }

    impl AnalyticsSink for RecordingAnalytics {
        fn track(&self, event: &str, properties: EventProperties) {
            self.events
                .lock()
                .unwrap()
                .push((event.to_string(), properties));
        }
    }

    struct Harness {
        manager: Arc<SyncManager>,
        remotes: MemoryRemotes,
        network: NetworkMonitor,
        analytics: Arc<RecordingAnalytics>,
    }

    fn harness(online: bool, config: SyncConfig) -> Harness {
        let network = NetworkMonitor::new(online);
        let remotes = MemoryRemotes::new();
        let analytics = Arc::new(RecordingAnalytics::default());
        let context = SyncContext::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StaticIdentity::signed_in(USER)),
            network.clone(),
        )
        .with_analytics(analytics.clone())
        .with_sync_config(config);

        Harness {
            manager: Arc::new(SyncManager::new(context, remotes.providers())),
            remotes,
            network,
            analytics,
        }
    }

    fn assignment(title: &str) -> Assignment {
        let due = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
        Assignment::new(USER, "course-1", "Databases", title, due)
    }

    async fn wait_for(
        manager: &SyncManager,
        condition: impl FnMut(&SyncSnapshot) -> bool,
    ) -> SyncSnapshot {
        let mut receiver = manager.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), receiver.wait_for(condition))
            .await
            .expect("timed out waiting for sync snapshot")
            .unwrap()
            .clone();
        snapshot
    }

    #[tokio::test]
    async fn coming_online_flushes_pending_operations() {
        let h = harness(false, SyncConfig::default());
        h.manager.start().await;

        h.manager
            .assignments()
            .create(assignment("Offline essay"))
            .await
            .unwrap();
        h.manager
            .courses()
            .create(Course::new(USER, "Databases", "CS 348"))
            .await
            .unwrap();
        let before = wait_for(&h.manager, |s| s.pending_sync_count == 2).await;
        assert_eq!(before.status, SyncStatus::Offline);

        h.network.set_online(true);
        let after = wait_for(&h.manager, |s| {
            s.status == SyncStatus::Synced && s.pending_sync_count == 0
        })
        .await;

        assert!(after.is_online);
        assert!(after.last_sync_at.is_some());
        assert_eq!(h.remotes.assignments.snapshot(USER).await.len(), 1);
        assert_eq!(h.remotes.courses.snapshot(USER).await.len(), 1);
    }

    #[tokio::test]
    async fn triggers_are_skipped_while_offline() {
        let h = harness(false, SyncConfig::default());
        let report = h.manager.trigger_full_sync().await;
        assert!(report.skipped);
        assert!(!report.is_success());
        assert_eq!(h.remotes.assignments.fetch_count(), 0);
        assert!(h.analytics.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn light_sync_covers_assignments_only() {
        let h = harness(true, SyncConfig::default());
        let report = h.manager.trigger_light_sync().await;

        assert!(report.is_success());
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].kind, EntityKind::Assignment);
        assert_eq!(h.remotes.assignments.fetch_count(), 1);
        assert_eq!(h.remotes.courses.fetch_count(), 0);
        assert_eq!(h.remotes.holidays.fetch_count(), 0);
    }

    #[tokio::test]
    async fn full_sync_covers_every_entity_type_and_tracks_one_event() {
        let h = harness(true, SyncConfig::default());
        let report = h.manager.trigger_full_sync().await;

        assert!(report.is_success());
        assert_eq!(report.outcomes.len(), EntityKind::ALL.len());
        assert_eq!(h.remotes.workload_analyses.fetch_count(), 1);

        let events = h.analytics.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let (name, properties) = &events[0];
        assert_eq!(name, "sync_completed");
        assert_eq!(properties["scope"], Value::from("full"));
        assert_eq!(properties["entity_types"].as_array().unwrap().len(), 6);

        let snapshot = h.manager.snapshot();
        assert_eq!(snapshot.status, SyncStatus::Synced);
        assert!(!snapshot.is_syncing);
        assert!((snapshot.progress - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn remote_failure_sets_error_status_and_keeps_going() {
        let h = harness(true, SyncConfig::default());
        h.remotes.holidays.set_available(false);

        let report = h.manager.trigger_full_sync().await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, EntityKind::Holiday);
        assert_eq!(report.outcomes.len(), EntityKind::ALL.len() - 1);
        assert_eq!(h.manager.snapshot().status, SyncStatus::Error);
        assert_eq!(h.manager.snapshot().last_sync_at, None);
        assert_eq!(h.analytics.events.lock().unwrap()[0].0, "sync_failed");

        h.remotes.holidays.set_available(true);
        assert!(h.manager.trigger_full_sync().await.is_success());
        assert_eq!(h.manager.snapshot().status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn going_offline_publishes_offline_status() {
        let h = harness(true, SyncConfig::default());
        h.manager.start().await;
        wait_for(&h.manager, |s| s.status == SyncStatus::Synced && !s.is_syncing).await;

        h.network.set_online(false);
        let snapshot = wait_for(&h.manager, |s| {
            !s.is_online && s.status == SyncStatus::Offline
        })
        .await;
        assert!(!snapshot.is_syncing);
        h.manager.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_timer_runs_light_sync() {
        let h = harness(
            true,
            SyncConfig {
                light_sync_interval: Duration::from_secs(60),
            },
        );
        h.manager.start().await;
        wait_for(&h.manager, |s| s.last_sync_at.is_some() && !s.is_syncing).await;
        assert_eq!(h.remotes.assignments.fetch_count(), 1);
        assert_eq!(h.remotes.courses.fetch_count(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(h.remotes.assignments.fetch_count(), 2);
        assert_eq!(h.remotes.courses.fetch_count(), 1);
        h.manager.shutdown();
    }

    #[tokio::test]
    async fn pending_counts_are_reported_per_kind() {
        let h = harness(false, SyncConfig::default());
        h.manager
            .assignments()
            .create(assignment("A"))
            .await
            .unwrap();

        let counts = h.manager.pending_counts().await.unwrap();
        assert_eq!(counts[&EntityKind::Assignment], 1);
        assert_eq!(counts[&EntityKind::Course], 0);
        assert!(h.manager.target(EntityKind::Holiday).is_some());
    }

    #[tokio::test]
    async fn conflicts_and_sync_times_are_aggregated_across_kinds() {
        let h = harness(true, SyncConfig::default());
        let local = h
            .manager
            .assignments()
            .create(assignment("Essay"))
            .await
            .unwrap();
        assert_eq!(h.manager.assignments().pending_count().await.unwrap(), 0);

        let mut edited = local.clone();
        edited.title = "Essay (edited elsewhere)".to_string();
        edited.updated_at = local.updated_at + 5_000;
        h.remotes.assignments.insert(edited).await;

        assert!(h.manager.trigger_full_sync().await.is_success());

        let conflicts = h.manager.list_conflicts(10).await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].entity_kind, EntityKind::Assignment);
        assert_eq!(conflicts[0].entity_id, local.id);

        let times = h.manager.last_sync_times().await.unwrap();
        assert_eq!(times.len(), EntityKind::ALL.len());
        assert!(times.values().all(Option::is_some));
    }
}
