use std::io;

use aceup_core::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] aceup_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Assignment title cannot be empty")]
    EmptyTitle,
    #[error("Course cannot be empty")]
    EmptyCourse,
    #[error("ID cannot be empty")]
    EmptyId,
    #[error("No {kind} found for id/prefix: {query}")]
    NotFound { kind: EntityKind, query: String },
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Sync failed: {0}")]
    SyncFailed(String),
}
