//! aceup - offline-first academic planner CLI
//!
//! Usage:
//!   aceup add "Lab report 3" --course "CS 101" --due 2026-03-14
//!   aceup list --pending
//!   aceup complete 0190c2a1
//!   aceup sync
//!   aceup status

mod app;
mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::add::{run_add, NewAssignment};
use crate::commands::complete::run_complete;
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::status::run_status;
use crate::commands::sync::{run_sync, run_sync_conflicts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive: Directive = "aceup=info"
        .parse()
        .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let app = App::open(&cli.global).await?;

    let result = match cli.command {
        Commands::Add {
            title,
            course,
            due,
            weight,
            kind,
        } => {
            run_add(
                &app,
                NewAssignment {
                    title_parts: &title,
                    course: &course,
                    due: due.as_deref(),
                    weight,
                    kind,
                },
            )
            .await
        }
        Commands::List {
            kind,
            pending,
            json,
        } => run_list(&app, kind, pending, json).await,
        Commands::Complete { id } => run_complete(&app, &id).await,
        Commands::Delete { id, kind } => run_delete(&app, &id, kind).await,
        Commands::Sync { light, command } => match command {
            Some(SyncCommands::Conflicts { limit, json }) => {
                run_sync_conflicts(&app, limit, json).await
            }
            None => run_sync(&app, light).await,
        },
        Commands::Status { json } => run_status(&app, json).await,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    };
    app.flush_analytics().await;
    result
}
