use aceup_core::models::Assignment;
use aceup_core::{Entity, EntityKind, OfflineRepository};
use chrono::Utc;

use crate::app::App;
use crate::commands::common::{
    assignment_to_list_item, entity_to_list_item, format_assignment_lines, format_entity_lines,
    pending_ids, AssignmentListItem, EntityListItem, Summary,
};
use crate::error::CliError;

pub async fn run_list(
    app: &App,
    kind: EntityKind,
    pending_only: bool,
    as_json: bool,
) -> Result<(), CliError> {
    if pending_only && kind != EntityKind::Assignment {
        return Err(CliError::InvalidArgument(
            "--pending only applies to assignments".to_string(),
        ));
    }

    let manager = &app.manager;
    match kind {
        EntityKind::Assignment => list_assignments(app, pending_only, as_json).await,
        EntityKind::Holiday => list_entities(manager.holidays(), as_json).await,
        EntityKind::Course => list_entities(manager.courses(), as_json).await,
        EntityKind::CalendarEvent => list_entities(manager.calendar_events(), as_json).await,
        EntityKind::Availability => list_entities(manager.availability(), as_json).await,
        EntityKind::WorkloadAnalysis => list_entities(manager.workload_analyses(), as_json).await,
    }
}

/// Assignments ordered by due date.
pub async fn load_assignments(app: &App, pending_only: bool) -> Result<Vec<Assignment>, CliError> {
    let repo = app.manager.assignments();
    if pending_only {
        return Ok(repo.pending().await?);
    }
    let mut assignments = repo.list().await?;
    assignments.sort_by_key(|assignment| assignment.due_date);
    Ok(assignments)
}

async fn list_assignments(app: &App, pending_only: bool, as_json: bool) -> Result<(), CliError> {
    let assignments = load_assignments(app, pending_only).await?;
    let pending = pending_ids(app.manager.assignments()).await?;
    let now = Utc::now();

    if as_json {
        let json_items = assignments
            .iter()
            .map(|assignment| assignment_to_list_item(assignment, &pending, now))
            .collect::<Vec<AssignmentListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if assignments.is_empty() {
        println!("No assignments found.");
    } else {
        for line in format_assignment_lines(&assignments, &pending, now) {
            println!("{line}");
        }
    }

    Ok(())
}

async fn list_entities<E: Entity + Summary>(
    repo: &OfflineRepository<E>,
    as_json: bool,
) -> Result<(), CliError> {
    let entities = repo.list().await?;
    let pending = pending_ids(repo).await?;

    if as_json {
        let json_items = entities
            .iter()
            .map(|entity| entity_to_list_item(entity, &pending))
            .collect::<Vec<EntityListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if entities.is_empty() {
        println!("No {} found.", E::KIND);
    } else {
        for line in format_entity_lines(&entities, &pending) {
            println!("{line}");
        }
    }

    Ok(())
}
