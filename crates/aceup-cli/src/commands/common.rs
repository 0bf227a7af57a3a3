use std::collections::HashSet;

use aceup_core::models::{
    Assignment, AssignmentKind, AssignmentStatus, AvailabilitySlot, CalendarEvent, Course,
    Holiday, SyncConflict, WorkloadAnalysis,
};
use aceup_core::{Entity, EntityId, OfflineRepository};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

#[derive(Debug, Serialize)]
pub struct AssignmentListItem {
    pub id: String,
    pub title: String,
    pub course: String,
    pub kind: AssignmentKind,
    pub status: AssignmentStatus,
    pub due_date: DateTime<Utc>,
    pub due: String,
    pub weight: f64,
    pub updated_at: i64,
    pub pending_sync: bool,
}

#[derive(Debug, Serialize)]
pub struct EntityListItem {
    pub id: String,
    pub summary: String,
    pub updated_at: i64,
    pub relative_time: String,
    pub pending_sync: bool,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub entity_kind: String,
    pub entity_id: String,
    pub local_updated_at: i64,
    pub remote_updated_at: i64,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
    pub strategy: String,
    pub discarded_newer_local: bool,
}

/// One-line description of an entity for text listings.
pub trait Summary {
    fn summary(&self) -> String;
}

impl Summary for Assignment {
    fn summary(&self) -> String {
        format!("{} ({})", self.title, self.course_name)
    }
}

impl Summary for Holiday {
    fn summary(&self) -> String {
        format!("{} {} [{}]", self.date, self.name, self.country_code)
    }
}

impl Summary for Course {
    fn summary(&self) -> String {
        if self.code == self.name {
            self.name.clone()
        } else {
            format!("{} {}", self.code, self.name)
        }
    }
}

impl Summary for CalendarEvent {
    fn summary(&self) -> String {
        format!(
            "{} {}",
            self.starts_at.format("%Y-%m-%d %H:%M"),
            self.title
        )
    }
}

impl Summary for AvailabilitySlot {
    fn summary(&self) -> String {
        let label = self.label.as_deref().unwrap_or("available");
        format!(
            "{} {}-{} {label}",
            self.weekday,
            format_minute_of_day(self.start_minute),
            format_minute_of_day(self.end_minute)
        )
    }
}

impl Summary for WorkloadAnalysis {
    fn summary(&self) -> String {
        format!(
            "{}..{} {:.1}h across {} assignments",
            self.period_start, self.period_end, self.total_hours, self.assignment_count
        )
    }
}

/// Resolve a full ID or a unique ID prefix against the local cache.
pub async fn resolve_entity<E: Entity>(
    repo: &OfflineRepository<E>,
    query: &str,
) -> Result<E, CliError> {
    let query = normalize_identifier(query)?;
    if let Some(entity) = repo.get(&EntityId::from(query.as_str())).await? {
        return Ok(entity);
    }

    let mut matches = repo
        .filter(|entity| entity.id().as_str().starts_with(&query))
        .await?;

    match matches.len() {
        0 => Err(CliError::NotFound {
            kind: E::KIND,
            query,
        }),
        1 => Ok(matches.remove(0)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|entity| short_id(entity.id()))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// IDs of entities with mutations still waiting for the remote.
pub async fn pending_ids<E: Entity>(
    repo: &OfflineRepository<E>,
) -> Result<HashSet<EntityId>, CliError> {
    Ok(repo
        .pending_operations()
        .await?
        .into_iter()
        .map(|operation| operation.payload.id().clone())
        .collect())
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_title(parts: &[String]) -> Result<String, CliError> {
    let collapsed = parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");
    if collapsed.is_empty() {
        Err(CliError::EmptyTitle)
    } else {
        Ok(collapsed)
    }
}

/// Parse `YYYY-MM-DD` as the end of that day in UTC.
pub fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, CliError> {
    let trimmed = raw.trim();
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| CliError::InvalidDate(trimmed.to_string()))?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 0)
        .ok_or_else(|| CliError::InvalidDate(trimmed.to_string()))?;
    Ok(Utc.from_utc_datetime(&date.and_time(end_of_day)))
}

pub fn default_due_date(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(7)
}

pub fn short_id(id: &EntityId) -> String {
    id.as_str().chars().take(SHORT_ID_LEN).collect()
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = text.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub const fn status_label(status: AssignmentStatus) -> &'static str {
    match status {
        AssignmentStatus::Pending => "pending",
        AssignmentStatus::InProgress => "in progress",
        AssignmentStatus::Completed => "done",
    }
}

pub fn format_assignment_lines(
    assignments: &[Assignment],
    pending: &HashSet<EntityId>,
    now: DateTime<Utc>,
) -> Vec<String> {
    assignments
        .iter()
        .map(|assignment| {
            let marker = if pending.contains(&assignment.id) { "*" } else { " " };
            format!(
                "{marker}{:<13}  {:<32}  {:<16}  {:<12}  {}",
                short_id(&assignment.id),
                truncate(&assignment.title, 32),
                truncate(&assignment.course_name, 16),
                format_due(assignment.due_date, now),
                status_label(assignment.status)
            )
        })
        .collect()
}

pub fn assignment_to_list_item(
    assignment: &Assignment,
    pending: &HashSet<EntityId>,
    now: DateTime<Utc>,
) -> AssignmentListItem {
    AssignmentListItem {
        id: assignment.id.to_string(),
        title: assignment.title.clone(),
        course: assignment.course_name.clone(),
        kind: assignment.kind,
        status: assignment.status,
        due_date: assignment.due_date,
        due: format_due(assignment.due_date, now),
        weight: assignment.weight,
        updated_at: assignment.updated_at,
        pending_sync: pending.contains(&assignment.id),
    }
}

pub fn format_entity_lines<E: Entity + Summary>(
    entities: &[E],
    pending: &HashSet<EntityId>,
) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entities
        .iter()
        .map(|entity| {
            let marker = if pending.contains(entity.id()) { "*" } else { " " };
            format!(
                "{marker}{:<13}  {:<48}  {}",
                short_id(entity.id()),
                truncate(&entity.summary(), 48),
                format_relative_time(entity.updated_at(), now_ms)
            )
        })
        .collect()
}

pub fn entity_to_list_item<E: Entity + Summary>(
    entity: &E,
    pending: &HashSet<EntityId>,
) -> EntityListItem {
    let now_ms = Utc::now().timestamp_millis();
    EntityListItem {
        id: entity.id().to_string(),
        summary: entity.summary(),
        updated_at: entity.updated_at(),
        relative_time: format_relative_time(entity.updated_at(), now_ms),
        pending_sync: pending.contains(entity.id()),
    }
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        entity_kind: conflict.entity_kind.to_string(),
        entity_id: conflict.entity_id.to_string(),
        local_updated_at: conflict.local_updated_at,
        remote_updated_at: conflict.remote_updated_at,
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_sync_timestamp(conflict.resolved_at),
        strategy: conflict.strategy.clone(),
        discarded_newer_local: conflict.discarded_newer_local(),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            let note = if conflict.discarded_newer_local() {
                "  (newer local edit discarded)"
            } else {
                ""
            };
            format!(
                "{}  {:<11}  {}={}  local={} remote={}{note}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.strategy,
                conflict.entity_kind,
                conflict.entity_id,
                conflict.local_updated_at,
                conflict.remote_updated_at
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Coarse distance to a due date: "due 3d", "due 5h", "overdue 2d".
pub fn format_due(due: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = due.signed_duration_since(now);
    let (prefix, magnitude) = if diff < Duration::zero() {
        ("overdue", -diff)
    } else {
        ("due", diff)
    };

    if magnitude.num_days() > 0 {
        format!("{prefix} {}d", magnitude.num_days())
    } else if magnitude.num_hours() > 0 {
        format!("{prefix} {}h", magnitude.num_hours())
    } else {
        format!("{prefix} {}m", magnitude.num_minutes())
    }
}

fn format_minute_of_day(minute: u16) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}
