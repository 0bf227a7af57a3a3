use aceup_core::models::{Assignment, AssignmentStatus};

use crate::app::App;
use crate::commands::common::resolve_entity;
use crate::error::CliError;

pub async fn run_complete(app: &App, id: &str) -> Result<(), CliError> {
    let (assignment, changed) = complete_assignment(app, id).await?;
    if changed {
        println!("{}", assignment.id);
    } else {
        println!("{} was already completed", assignment.id);
    }
    Ok(())
}

/// Returns the assignment and whether its status actually changed.
pub async fn complete_assignment(app: &App, id: &str) -> Result<(Assignment, bool), CliError> {
    let repo = app.manager.assignments();
    let mut assignment = resolve_entity(repo, id).await?;
    if assignment.status == AssignmentStatus::Completed {
        return Ok((assignment, false));
    }

    assignment.status = AssignmentStatus::Completed;
    Ok((repo.update(assignment).await?, true))
}
