//! Error types for aceup-core

use thiserror::Error;

use crate::models::EntityKind;

/// Result type alias using aceup-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in aceup-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local store failure (disk or encoding)
    #[error("Local storage error: {0}")]
    LocalStorage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity not found in the expected scope
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Remote provider failure (network, timeout, server error)
    #[error("Remote error: {0}")]
    Remote(String),

    /// The remote refused an operation and will keep refusing it
    #[error("Remote rejected: {0}")]
    Rejected(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// No signed-in user
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error originated in the local store.
    pub const fn is_local_storage(&self) -> bool {
        matches!(
            self,
            Self::LocalStorage(_) | Self::Io(_) | Self::Serialization(_)
        )
    }

    /// Whether this error is a transient remote failure worth retrying.
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::Http(_))
    }

    /// Whether the remote refused the operation for good, so retrying it
    /// can never succeed.
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_local_and_remote_errors() {
        assert!(Error::LocalStorage("disk full".to_string()).is_local_storage());
        assert!(Error::Io(std::io::Error::other("boom")).is_local_storage());
        assert!(!Error::Remote("timeout".to_string()).is_local_storage());

        assert!(Error::Remote("timeout".to_string()).is_remote());
        assert!(!Error::AuthenticationRequired.is_remote());
        assert!(!Error::not_found(EntityKind::Assignment, "a1").is_remote());

        let rejected = Error::Rejected("update failed: not found (404)".to_string());
        assert!(rejected.is_rejected());
        assert!(!rejected.is_remote());
        assert!(!Error::Remote("timeout".to_string()).is_rejected());
    }

    #[test]
    fn not_found_names_the_entity_kind() {
        let error = Error::not_found(EntityKind::CalendarEvent, "evt-1");
        assert_eq!(error.to_string(), "calendar_events not found: evt-1");
    }
}
