//! Data models for AceUp
//!
//! Every synchronized domain object implements [`Entity`], the capability
//! trait the offline repositories and remote providers are generic over.

mod assignment;
mod availability;
mod calendar_event;
mod course;
mod entity_id;
mod holiday;
mod sync_conflict;
mod workload;

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::util::next_timestamp;

pub use assignment::{Assignment, AssignmentKind, AssignmentStatus, Priority};
pub use availability::AvailabilitySlot;
pub use calendar_event::CalendarEvent;
pub use course::Course;
pub use entity_id::EntityId;
pub use holiday::Holiday;
pub use sync_conflict::{SyncConflict, REMOTE_REJECTED, REMOTE_WINS};
pub use workload::WorkloadAnalysis;

/// The synchronized entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Assignment,
    Holiday,
    Course,
    CalendarEvent,
    Availability,
    WorkloadAnalysis,
}

impl EntityKind {
    /// All kinds, in full-sync order.
    pub const ALL: [Self; 6] = [
        Self::Assignment,
        Self::Holiday,
        Self::Course,
        Self::CalendarEvent,
        Self::Availability,
        Self::WorkloadAnalysis,
    ];

    /// Stable collection name used in store keys, REST paths, and logs.
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Assignment => "assignments",
            Self::Holiday => "holidays",
            Self::Course => "courses",
            Self::CalendarEvent => "calendar_events",
            Self::Availability => "availability",
            Self::WorkloadAnalysis => "workload_analyses",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.collection())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "assignment" | "assignments" => Ok(Self::Assignment),
            "holiday" | "holidays" => Ok(Self::Holiday),
            "course" | "courses" => Ok(Self::Course),
            "calendar_event" | "calendar_events" | "event" | "events" => Ok(Self::CalendarEvent),
            "availability" | "availability_slot" | "availability_slots" => Ok(Self::Availability),
            "workload" | "workload_analysis" | "workload_analyses" => Ok(Self::WorkloadAnalysis),
            _ => Err(format!("unknown entity kind: {s}")),
        }
    }
}

/// A domain object that can be cached locally and mirrored remotely.
///
/// `id` never changes after creation and `updated_at` strictly increases on
/// every mutation (see [`Entity::touch`]).
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Which collection this type belongs to
    const KIND: EntityKind;

    /// Unique identifier
    fn id(&self) -> &EntityId;

    /// Owning user
    fn user_id(&self) -> &str;

    /// Last modification timestamp (Unix ms)
    fn updated_at(&self) -> i64;

    /// Overwrite the modification timestamp
    fn set_updated_at(&mut self, timestamp: i64);

    /// Bump `updated_at` past its previous value.
    fn touch(&mut self) {
        let next = next_timestamp(self.updated_at());
        self.set_updated_at(next);
    }

    /// Per-type invariants checked before any local write.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_parses_collection_and_singular_names() {
        assert_eq!("assignments".parse(), Ok(EntityKind::Assignment));
        assert_eq!("calendar-event".parse(), Ok(EntityKind::CalendarEvent));
        assert_eq!("Workload".parse(), Ok(EntityKind::WorkloadAnalysis));
        assert!("grades".parse::<EntityKind>().is_err());
    }

    #[test]
    fn entity_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EntityKind::CalendarEvent).unwrap();
        assert_eq!(json, "\"calendar_event\"");
    }

    #[test]
    fn touch_strictly_increases_updated_at() {
        let mut course = Course::new("user-1", "Calculus II", "MATH 201");
        let before = course.updated_at();
        course.touch();
        assert!(course.updated_at() > before);
        let after_first = course.updated_at();
        course.touch();
        assert!(course.updated_at() > after_first);
    }
}
