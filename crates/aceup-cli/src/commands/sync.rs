use aceup_core::SyncReport;

use crate::app::App;
use crate::commands::common::{format_sync_conflict_lines, sync_conflict_to_item, SyncConflictItem};
use crate::error::CliError;

pub async fn run_sync(app: &App, light: bool) -> Result<(), CliError> {
    let report = if light {
        app.manager.trigger_light_sync().await
    } else {
        app.manager.trigger_full_sync().await
    };

    if report.skipped {
        let pending: usize = app.manager.pending_counts().await?.values().sum();
        let reason = if app.is_remote_configured() {
            "remote unreachable"
        } else {
            "no remote configured"
        };
        println!("Sync skipped ({reason}); {pending} change(s) pending");
        return Ok(());
    }

    for line in format_sync_report_lines(&report) {
        println!("{line}");
    }
    check_sync_report(&report)
}

pub async fn run_sync_conflicts(app: &App, limit: usize, as_json: bool) -> Result<(), CliError> {
    let conflicts = app.manager.list_conflicts(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_sync_report_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = report
        .outcomes
        .iter()
        .map(|outcome| {
            format!(
                "{:<18}  replayed={} fetched={} cached={} conflicts={}",
                outcome.kind, outcome.replayed, outcome.fetched, outcome.cached, outcome.conflicts
            )
        })
        .collect::<Vec<_>>();
    lines.extend(
        report
            .failures
            .iter()
            .map(|(kind, message)| format!("{kind:<18}  failed: {message}")),
    );
    lines.push(format!(
        "{} sync finished in {}ms",
        report.scope.as_str(),
        report.duration.as_millis()
    ));
    lines
}

pub fn check_sync_report(report: &SyncReport) -> Result<(), CliError> {
    if report.failures.is_empty() {
        return Ok(());
    }
    let kinds = report
        .failures
        .iter()
        .map(|(kind, _)| kind.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(CliError::SyncFailed(kinds))
}
