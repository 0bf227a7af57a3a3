//! Calendar event model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, EntityId, EntityKind};
use crate::error::{Error, Result};
use crate::util::now_millis;

/// An entry on a (possibly shared) calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: EntityId,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Other users who can see this event
    #[serde(default)]
    pub shared_with: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CalendarEvent {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: EntityId::new(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            location: None,
            starts_at,
            ends_at,
            shared_with: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the event intersects the half-open window `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.starts_at < end && self.ends_at > start
    }
}

impl Entity for CalendarEvent {
    const KIND: EntityKind = EntityKind::CalendarEvent;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn set_updated_at(&mut self, timestamp: i64) {
        self.updated_at = timestamp;
    }

    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("event title cannot be empty".to_string()));
        }
        if self.ends_at < self.starts_at {
            return Err(Error::InvalidInput(
                "event cannot end before it starts".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_validate_rejects_inverted_range() {
        let start = Utc::now();
        let event = CalendarEvent::new("u", "Study group", start, start - Duration::hours(1));
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_overlaps_is_half_open() {
        let start = Utc::now();
        let event = CalendarEvent::new("u", "Lecture", start, start + Duration::hours(1));
        assert!(event.overlaps(start - Duration::minutes(30), start + Duration::minutes(1)));
        assert!(!event.overlaps(start + Duration::hours(1), start + Duration::hours(2)));
    }
}
