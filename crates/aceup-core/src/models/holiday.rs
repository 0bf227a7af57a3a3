//! Holiday model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Entity, EntityId, EntityKind};
use crate::error::{Error, Result};
use crate::util::now_millis;

/// A non-teaching day shown on the user's calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub id: EntityId,
    pub user_id: String,
    pub name: String,
    pub date: NaiveDate,
    /// ISO 3166-1 alpha-2 country code
    pub country_code: String,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Holiday {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        date: NaiveDate,
        country_code: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: EntityId::new(),
            user_id: user_id.into(),
            name: name.into(),
            date,
            country_code: country_code.into(),
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Holiday {
    const KIND: EntityKind = EntityKind::Holiday;

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
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("holiday name cannot be empty".to_string()));
        }
        Ok(())
    }
}
