//! Signed-in user lookup.

use crate::util::normalize_text_option;
use crate::{Error, Result};

/// Source of the current user id. Every local partition and remote query is
/// scoped by it.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;

    /// Current user id, or `AuthenticationRequired`.
    fn require_user_id(&self) -> Result<String> {
        self.current_user_id().ok_or(Error::AuthenticationRequired)
    }
}

/// Fixed identity resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    /// Blank ids are treated as signed out.
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id: normalize_text_option(user_id),
        }
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self::new(Some(user_id.into()))
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_user_id_is_signed_out() {
        let identity = StaticIdentity::new(Some("  ".to_string()));
        assert_eq!(identity.current_user_id(), None);
        assert!(matches!(
            identity.require_user_id(),
            Err(Error::AuthenticationRequired)
        ));
    }

    #[test]
    fn signed_in_identity_is_trimmed() {
        let identity = StaticIdentity::new(Some(" student-42 ".to_string()));
        assert_eq!(identity.require_user_id().unwrap(), "student-42");
    }
}
