use serde::{Deserialize, Serialize};

use booksmartly_core::{Email, UserId};

/// Authenticated identity supplied by the session provider.
///
/// Immutable for the lifetime of a session; absent when unauthenticated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub email: Email,
}

impl Identity {
    pub fn new(user_id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: Email::new(email),
        }
    }
}

/// What the session source currently knows.
///
/// `Pending` transitions to `Resolved` once per page load; a resolved session
/// may later flip between signed-in and signed-out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Pending,
    Resolved(Option<Identity>),
}

impl SessionState {
    pub fn signed_in(identity: Identity) -> Self {
        Self::Resolved(Some(identity))
    }

    pub fn signed_out() -> Self {
        Self::Resolved(None)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// The resolved identity, if any. Always `None` while pending.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Resolved(identity) => identity.as_ref(),
            Self::Pending => None,
        }
    }
}
