//! Workload analysis model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Entity, EntityId, EntityKind};
use crate::error::{Error, Result};
use crate::util::now_millis;

/// A stored summary of the user's workload over a period.
///
/// Produced elsewhere; the sync layer only stores and mirrors it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadAnalysis {
    pub id: EntityId,
    pub user_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_hours: f64,
    pub assignment_count: u32,
    #[serde(default)]
    pub course_ids: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl WorkloadAnalysis {
    #[must_use]
    pub fn new(user_id: impl Into<String>, period_start: NaiveDate, period_end: NaiveDate) -> Self {
        let now = now_millis();
        Self {
            id: EntityId::new(),
            user_id: user_id.into(),
            period_start,
            period_end,
            total_hours: 0.0,
            assignment_count: 0,
            course_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Entity for WorkloadAnalysis {
    const KIND: EntityKind = EntityKind::WorkloadAnalysis;

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
        if self.period_end < self.period_start {
            return Err(Error::InvalidInput(
                "workload period cannot end before it starts".to_string(),
            ));
        }
        if self.total_hours < 0.0 {
            return Err(Error::InvalidInput("total hours cannot be negative".to_string()));
        }
        Ok(())
    }
}
