use aceup_core::{Entity, EntityId, EntityKind, OfflineRepository};

use crate::app::App;
use crate::commands::common::resolve_entity;
use crate::error::CliError;

pub async fn run_delete(app: &App, id: &str, kind: EntityKind) -> Result<(), CliError> {
    let deleted = delete_entity(app, id, kind).await?;
    println!("{deleted}");
    Ok(())
}

pub async fn delete_entity(app: &App, id: &str, kind: EntityKind) -> Result<EntityId, CliError> {
    let manager = &app.manager;
    match kind {
        EntityKind::Assignment => delete_from(manager.assignments(), id).await,
        EntityKind::Holiday => delete_from(manager.holidays(), id).await,
        EntityKind::Course => delete_from(manager.courses(), id).await,
        EntityKind::CalendarEvent => delete_from(manager.calendar_events(), id).await,
        EntityKind::Availability => delete_from(manager.availability(), id).await,
        EntityKind::WorkloadAnalysis => delete_from(manager.workload_analyses(), id).await,
    }
}

async fn delete_from<E: Entity>(
    repo: &OfflineRepository<E>,
    id: &str,
) -> Result<EntityId, CliError> {
    let entity = resolve_entity(repo, id).await?;
    repo.delete(entity.id()).await?;
    Ok(entity.id().clone())
}
