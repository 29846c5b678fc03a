use booksmartly_auth::{Identity, RoleState};

/// Session attached to every request (anonymous when no bearer token).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionContext {
    identity: Option<Identity>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self { identity: None }
    }

    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }
}

/// Role state resolved by the gate for the current request.
///
/// Only present on routes behind a gate layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RoleContext {
    role_state: RoleState,
}

impl RoleContext {
    pub fn new(role_state: RoleState) -> Self {
        Self { role_state }
    }

    pub fn role_state(&self) -> &RoleState {
        &self.role_state
    }
}
