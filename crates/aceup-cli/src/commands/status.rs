use aceup_core::identity::IdentityProvider;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::App;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub online: bool,
    pub remote_base_url: Option<String>,
    pub user_id: Option<String>,
    pub data_dir: String,
    pub pending_total: usize,
    pub entities: Vec<EntityStatus>,
}

#[derive(Debug, Serialize)]
pub struct EntityStatus {
    pub kind: String,
    pub pending: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
}

pub async fn run_status(app: &App, as_json: bool) -> Result<(), CliError> {
    let report = collect_status(app).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_status_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub async fn collect_status(app: &App) -> Result<StatusReport, CliError> {
    let user_id = app.identity.current_user_id();
    let mut entities = Vec::new();
    if user_id.is_some() {
        let pending = app.manager.pending_counts().await?;
        let last_sync = app.manager.last_sync_times().await?;
        for (kind, count) in pending {
            entities.push(EntityStatus {
                kind: kind.to_string(),
                pending: count,
                last_sync_at: last_sync.get(&kind).copied().flatten(),
            });
        }
    }

    Ok(StatusReport {
        online: app.is_online(),
        remote_base_url: app.config.remote_base_url.clone(),
        user_id,
        data_dir: app.data_dir.display().to_string(),
        pending_total: entities.iter().map(|entity| entity.pending).sum(),
        entities,
    })
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let connectivity = match (&report.remote_base_url, report.online) {
        (None, _) => "local only".to_string(),
        (Some(url), true) => format!("online ({url})"),
        (Some(url), false) => format!("offline ({url})"),
    };
    let mut lines = vec![
        format!("Network:  {connectivity}"),
        format!("Data:     {}", report.data_dir),
    ];

    let Some(user_id) = &report.user_id else {
        lines.push("User:     signed out (pass --user or set ACEUP_USER_ID)".to_string());
        return lines;
    };
    lines.push(format!("User:     {user_id}"));
    lines.push(format!("Pending:  {}", report.pending_total));

    for entity in &report.entities {
        let last_sync = entity.last_sync_at.map_or_else(
            || "never".to_string(),
            |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        lines.push(format!(
            "  {:<18}  pending={:<4} last sync {last_sync}",
            entity.kind, entity.pending
        ));
    }
    lines
}
