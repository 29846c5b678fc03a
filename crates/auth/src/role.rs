use core::str::FromStr;

use serde::{Deserialize, Serialize};

use booksmartly_core::{DomainError, OrganizationId};

/// Stored role classification of a user (`user_roles.role`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    OrgAdmin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::OrgAdmin => "org_admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "org_admin" => Ok(Role::OrgAdmin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(DomainError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// Admin flags derived from a stored role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleFlags {
    pub is_admin: bool,
    pub is_super_admin: bool,
    pub is_org_admin: bool,
}

impl RoleFlags {
    /// `None` (no role row) grants nothing.
    pub fn from_role(role: Option<Role>) -> Self {
        match role {
            Some(Role::SuperAdmin) => Self {
                is_admin: true,
                is_super_admin: true,
                is_org_admin: false,
            },
            Some(Role::OrgAdmin) => Self {
                is_admin: true,
                is_super_admin: false,
                is_org_admin: true,
            },
            Some(Role::Admin) => Self {
                is_admin: true,
                is_super_admin: false,
                is_org_admin: false,
            },
            Some(Role::User) | None => Self::default(),
        }
    }
}

/// Resolved authorization flags and tenant membership for one identity.
///
/// Produced whole by a single resolution; never updated field by field.
/// Every value handed out by the resolver satisfies
/// `is_super_admin => is_admin`, and `organization_id == None` implies
/// `!is_org_approved`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleState {
    pub is_admin: bool,
    pub is_super_admin: bool,
    pub is_org_admin: bool,
    pub organization_id: Option<OrganizationId>,
    pub is_org_approved: bool,
}

impl RoleState {
    /// Least-privileged state: every flag false, no organization.
    pub const fn restricted() -> Self {
        Self {
            is_admin: false,
            is_super_admin: false,
            is_org_admin: false,
            organization_id: None,
            is_org_approved: false,
        }
    }

    /// Fixed state granted to the privileged identity.
    pub const fn super_admin_bypass(organization_id: OrganizationId) -> Self {
        Self {
            is_admin: true,
            is_super_admin: true,
            is_org_admin: false,
            organization_id: Some(organization_id),
            is_org_approved: true,
        }
    }

    pub fn flags(&self) -> RoleFlags {
        RoleFlags {
            is_admin: self.is_admin,
            is_super_admin: self.is_super_admin,
            is_org_admin: self.is_org_admin,
        }
    }

    /// Checks the structural invariants.
    pub fn is_consistent(&self) -> bool {
        (!self.is_super_admin || self.is_admin)
            && (self.organization_id.is_some() || !self.is_org_approved)
    }
}
