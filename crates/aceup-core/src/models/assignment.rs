//! Assignment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entity, EntityId, EntityKind};
use crate::error::{Error, Result};
use crate::util::now_millis;

/// What kind of graded work an assignment is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    Homework,
    Quiz,
    Exam,
    Project,
    #[default]
    Assignment,
}

/// Completion state of an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// User-assigned priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// A graded piece of coursework with a due date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Unique identifier
    pub id: EntityId,
    /// Owning user
    pub user_id: String,
    /// Course this belongs to
    pub course_id: String,
    /// Denormalized course name for display
    pub course_name: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: AssignmentKind,
    #[serde(default)]
    pub status: AssignmentStatus,
    pub due_date: DateTime<Utc>,
    /// Fraction of the final grade, `0.0..=1.0`
    pub weight: f64,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub priority: Priority,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Assignment {
    /// Create a pending assignment due at `due_date`
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        course_id: impl Into<String>,
        course_name: impl Into<String>,
        title: impl Into<String>,
        due_date: DateTime<Utc>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: EntityId::new(),
            user_id: user_id.into(),
            course_id: course_id.into(),
            course_name: course_name.into(),
            title: title.into(),
            description: None,
            kind: AssignmentKind::default(),
            status: AssignmentStatus::default(),
            due_date,
            weight: 0.0,
            estimated_hours: None,
            priority: Priority::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub const fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: AssignmentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == AssignmentStatus::Pending
    }
}

impl Entity for Assignment {
    const KIND: EntityKind = EntityKind::Assignment;

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
            return Err(Error::InvalidInput(
                "assignment title cannot be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(Error::InvalidInput(format!(
                "assignment weight must be between 0 and 1, got {}",
                self.weight
            )));
        }
        if self.estimated_hours.is_some_and(|hours| hours < 0.0) {
            return Err(Error::InvalidInput(
                "estimated hours cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Assignment {
        Assignment::new("user-1", "cs101", "Intro to CS", "Lab 3", Utc::now())
    }

    #[test]
    fn test_assignment_new_defaults() {
        let assignment = sample();
        assert!(assignment.is_pending());
        assert_eq!(assignment.kind, AssignmentKind::Assignment);
        assert_eq!(assignment.created_at, assignment.updated_at);
    }

    #[test]
    fn test_validate_rejects_out_of_range_weight() {
        assert!(sample().with_weight(0.4).validate().is_ok());
        assert!(sample().with_weight(1.5).validate().is_err());
        assert!(sample().with_weight(-0.1).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_title() {
        let mut assignment = sample();
        assignment.title = "  ".to_string();
        assert!(matches!(assignment.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&AssignmentStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
