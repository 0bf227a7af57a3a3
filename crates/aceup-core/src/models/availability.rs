//! Weekly availability slot model

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use super::{Entity, EntityId, EntityKind};
use crate::error::{Error, Result};
use crate::util::now_millis;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// A recurring weekly window in which the user is free to study or meet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: EntityId,
    pub user_id: String,
    pub weekday: Weekday,
    /// Minutes after local midnight
    pub start_minute: u16,
    pub end_minute: u16,
    #[serde(default)]
    pub label: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AvailabilitySlot {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        weekday: Weekday,
        start_minute: u16,
        end_minute: u16,
    ) -> Self {
        let now = now_millis();
        Self {
            id: EntityId::new(),
            user_id: user_id.into(),
            weekday,
            start_minute,
            end_minute,
            label: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub const fn duration_minutes(&self) -> u16 {
        self.end_minute.saturating_sub(self.start_minute)
    }
}

impl Entity for AvailabilitySlot {
    const KIND: EntityKind = EntityKind::Availability;

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
        if self.start_minute >= self.end_minute || self.end_minute > MINUTES_PER_DAY {
            return Err(Error::InvalidInput(format!(
                "invalid availability window {}..{}",
                self.start_minute, self.end_minute
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_window_bounds() {
        assert!(AvailabilitySlot::new("u", Weekday::Mon, 540, 600).validate().is_ok());
        assert!(AvailabilitySlot::new("u", Weekday::Mon, 600, 600).validate().is_err());
        assert!(AvailabilitySlot::new("u", Weekday::Mon, 1400, 1441).validate().is_err());
    }
}
