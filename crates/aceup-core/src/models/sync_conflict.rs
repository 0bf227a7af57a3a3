//! Sync conflict model

use serde::{Deserialize, Serialize};

use super::{EntityId, EntityKind};

/// Strategy name recorded for server-authoritative resolution.
pub const REMOTE_WINS: &str = "remote_wins";

/// Strategy name recorded when the remote refused a queued change outright.
/// Such entries carry a `remote_updated_at` of zero.
pub const REMOTE_REJECTED: &str = "remote_rejected";

/// A local copy that was overwritten by the remote copy during a merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Collection the entity belongs to
    pub entity_kind: EntityKind,
    /// Entity involved in the conflict
    pub entity_id: EntityId,
    /// Discarded local copy's timestamp
    pub local_updated_at: i64,
    /// Winning remote copy's timestamp
    pub remote_updated_at: i64,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Resolution strategy name
    pub strategy: String,
}

impl SyncConflict {
    /// Whether the discarded local copy was the more recent edit.
    pub const fn discarded_newer_local(&self) -> bool {
        self.local_updated_at > self.remote_updated_at
    }
}
