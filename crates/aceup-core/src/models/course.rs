//! Course model

use serde::{Deserialize, Serialize};

use super::{Entity, EntityId, EntityKind};
use crate::error::{Error, Result};
use crate::util::now_millis;

/// A course the student is enrolled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: EntityId,
    pub user_id: String,
    pub name: String,
    /// Catalogue code, e.g. "CS 101"
    pub code: String,
    #[serde(default)]
    pub credits: u8,
    #[serde(default)]
    pub instructor: Option<String>,
    /// Display color as `#RRGGBB`
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Target final grade as a fraction
    #[serde(default)]
    pub target_grade: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Course {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: EntityId::new(),
            user_id: user_id.into(),
            name: name.into(),
            code: code.into(),
            credits: 0,
            instructor: None,
            color: None,
            semester: None,
            year: None,
            target_grade: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for Course {
    const KIND: EntityKind = EntityKind::Course;

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
        if self.name.trim().is_empty() || self.code.trim().is_empty() {
            return Err(Error::InvalidInput(
                "course name and code are required".to_string(),
            ));
        }
        if self.target_grade.is_some_and(|grade| !(0.0..=1.0).contains(&grade)) {
            return Err(Error::InvalidInput(
                "target grade must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}
