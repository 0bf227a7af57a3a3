use std::path::PathBuf;

use aceup_core::models::AssignmentKind;
use aceup_core::EntityKind;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "aceup")]
#[command(about = "Plan coursework offline and sync it when you are back online")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOptions,
}

#[derive(Args, Clone, Debug, Default)]
pub struct GlobalOptions {
    /// Directory for the local store
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Signed-in user id (defaults to ACEUP_USER_ID)
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,

    /// REST document API base URL; overrides the configured one
    #[arg(long, global = true, value_name = "URL")]
    pub remote_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add an assignment
    #[command(alias = "new")]
    Add {
        /// Assignment title
        title: Vec<String>,
        /// Course name or code; created when it does not exist yet
        #[arg(long)]
        course: String,
        /// Due date (defaults to one week from now)
        #[arg(long, value_name = "YYYY-MM-DD")]
        due: Option<String>,
        /// Fraction of the final grade, between 0 and 1
        #[arg(long, default_value_t = 0.0)]
        weight: f64,
        /// Kind of graded work
        #[arg(long, value_enum, default_value_t = AssignmentKindArg::Assignment)]
        kind: AssignmentKindArg,
    },
    /// List cached entities
    List {
        /// Entity type to list
        #[arg(long, default_value = "assignments")]
        kind: EntityKind,
        /// Only assignments that are still pending
        #[arg(long)]
        pending: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark an assignment as completed
    #[command(alias = "done")]
    Complete {
        /// Assignment ID or unique ID prefix
        id: String,
    },
    /// Delete an entity
    Delete {
        /// ID or unique ID prefix
        id: String,
        /// Entity type the ID belongs to
        #[arg(long, default_value = "assignments")]
        kind: EntityKind,
    },
    /// Synchronize with the remote store
    Sync {
        /// Only sync assignments
        #[arg(long)]
        light: bool,
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Show connectivity and pending work
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum AssignmentKindArg {
    Homework,
    Quiz,
    Exam,
    Project,
    Assignment,
}

impl From<AssignmentKindArg> for AssignmentKind {
    fn from(value: AssignmentKindArg) -> Self {
        match value {
            AssignmentKindArg::Homework => Self::Homework,
            AssignmentKindArg::Quiz => Self::Quiz,
            AssignmentKindArg::Exam => Self::Exam,
            AssignmentKindArg::Project => Self::Project,
            AssignmentKindArg::Assignment => Self::Assignment,
        }
    }
}
