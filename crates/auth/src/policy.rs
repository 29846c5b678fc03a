//! The privileged-identity exception.
//!
//! One value of [`PrivilegePolicy`] is shared by the resolver and the gate so
//! the two checks cannot drift apart.

use booksmartly_core::OrganizationId;

use crate::{Identity, RoleState};

/// Address that is always treated as a super admin.
pub const PRIVILEGED_EMAIL: &str = "pdarleyjr@gmail.com";

/// Organization reported for the privileged identity.
pub const BYPASS_ORGANIZATION_ID: OrganizationId = OrganizationId::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegePolicy {
    privileged_email: String,
    organization_id: OrganizationId,
}

impl PrivilegePolicy {
    pub fn new(privileged_email: impl Into<String>, organization_id: OrganizationId) -> Self {
        Self {
            privileged_email: privileged_email.into(),
            organization_id,
        }
    }

    pub fn privileged_email(&self) -> &str {
        &self.privileged_email
    }

    /// Whether `identity` receives the bypass.
    pub fn is_privileged(&self, identity: &Identity) -> bool {
        identity.email.as_str() == self.privileged_email
    }

    /// The fixed role state granted by the bypass.
    pub fn bypass_state(&self) -> RoleState {
        RoleState::super_admin_bypass(self.organization_id)
    }
}

impl Default for PrivilegePolicy {
    fn default() -> Self {
        Self::new(PRIVILEGED_EMAIL, BYPASS_ORGANIZATION_ID)
    }
}
