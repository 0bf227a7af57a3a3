use aceup_core::models::{Assignment, Course};
use chrono::Utc;

use crate::app::App;
use crate::cli::AssignmentKindArg;
use crate::commands::common::{default_due_date, normalize_title, parse_due_date, short_id};
use crate::error::CliError;

pub struct NewAssignment<'a> {
    pub title_parts: &'a [String],
    pub course: &'a str,
    pub due: Option<&'a str>,
    pub weight: f64,
    pub kind: AssignmentKindArg,
}

pub async fn run_add(app: &App, request: NewAssignment<'_>) -> Result<(), CliError> {
    let assignment = add_assignment(app, request).await?;
    let pending = app.manager.assignments().pending_count().await?;

    println!("{}", assignment.id);
    if pending > 0 {
        eprintln!(
            "Saved {} locally; {pending} change(s) waiting to sync",
            short_id(&assignment.id)
        );
    }
    Ok(())
}

pub async fn add_assignment(app: &App, request: NewAssignment<'_>) -> Result<Assignment, CliError> {
    let title = normalize_title(request.title_parts)?;
    let user_id = app.user_id()?;
    let due_date = match request.due {
        Some(raw) => parse_due_date(raw)?,
        None => default_due_date(Utc::now()),
    };
    let course = find_or_create_course(app, &user_id, request.course).await?;

    let assignment = Assignment::new(
        user_id,
        course.id.to_string(),
        course.name.clone(),
        title,
        due_date,
    )
    .with_weight(request.weight)
    .with_kind(request.kind.into());

    Ok(app.manager.assignments().create(assignment).await?)
}

/// Match an existing course by name or code, case-insensitively.
pub async fn find_or_create_course(
    app: &App,
    user_id: &str,
    name_or_code: &str,
) -> Result<Course, CliError> {
    let needle = name_or_code.trim().to_string();
    if needle.is_empty() {
        return Err(CliError::EmptyCourse);
    }

    let courses = app.manager.courses();
    let existing = courses
        .filter(|course| {
            course.name.eq_ignore_ascii_case(&needle) || course.code.eq_ignore_ascii_case(&needle)
        })
        .await?;
    if let Some(course) = existing.into_iter().next() {
        return Ok(course);
    }

    tracing::debug!("Creating course '{needle}'");
    Ok(courses
        .create(Course::new(user_id, needle.clone(), needle))
        .await?)
}
