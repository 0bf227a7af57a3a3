//! Observable sync state shared with front ends.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Process-wide sync status, driven by the sync manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Offline,
    Syncing,
    Synced,
    Error,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Everything observers see about synchronization at one moment.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SyncSnapshot {
    pub is_online: bool,
    pub is_syncing: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Fraction of the current cycle's entity types done; indicative only
    pub progress: f32,
    pub status: SyncStatus,
    /// Operations waiting for the remote across every entity type
    pub pending_sync_count: usize,
}
