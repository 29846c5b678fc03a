//! Tenant scoping for membership administration.
//!
//! Super admins act on every organization; other admins act only inside their
//! own organization. These checks are pure: storage lives behind the
//! directory in the infra crate.

use serde::Serialize;
use thiserror::Error;

use booksmartly_core::{OrganizationId, UserId};

use crate::RoleState;

/// Which users an actor may see and manage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "organizationId", rename_all = "snake_case")]
pub enum MembershipScope {
    All,
    Organization(OrganizationId),
    Nothing,
}

impl MembershipScope {
    /// Whether a user belonging to `organization_id` is inside this scope.
    pub fn admits(&self, organization_id: Option<OrganizationId>) -> bool {
        match self {
            MembershipScope::All => true,
            MembershipScope::Organization(own) => organization_id == Some(*own),
            MembershipScope::Nothing => false,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MembershipError {
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("user {0} has no organization")]
    NoOrganization(UserId),

    #[error("user {0} not found")]
    NotFound(UserId),

    #[error("approval requires an organization")]
    ApprovalWithoutOrganization,

    #[error("organization {0} not found")]
    OrganizationNotFound(OrganizationId),

    #[error("invalid organization access code")]
    InvalidAccessCode,

    #[error("directory error: {0}")]
    Directory(String),
}

impl MembershipError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

/// Users an actor may manage. Organization admins act only once their own
/// membership has been approved.
pub fn membership_scope(actor: &RoleState) -> MembershipScope {
    if actor.is_super_admin {
        return MembershipScope::All;
    }
    match actor.organization_id {
        Some(org) if actor.is_admin && actor.is_org_approved => MembershipScope::Organization(org),
        _ => MembershipScope::Nothing,
    }
}

/// Only super admins change stored roles.
pub fn authorize_set_role(actor: &RoleState) -> Result<(), MembershipError> {
    if actor.is_super_admin {
        Ok(())
    } else {
        Err(MembershipError::forbidden("changing roles requires a super admin"))
    }
}

/// Checks moving a user from `current` to `target`.
///
/// Organization admins may only pull unassigned users (or their own members)
/// into their own organization, and such requests always start unapproved.
pub fn authorize_assign_organization(
    actor: &RoleState,
    current: Option<OrganizationId>,
    target: Option<OrganizationId>,
    approved: bool,
) -> Result<(), MembershipError> {
    if target.is_none() && approved {
        return Err(MembershipError::ApprovalWithoutOrganization);
    }

    match membership_scope(actor) {
        MembershipScope::All => Ok(()),
        MembershipScope::Organization(own) if current.is_some_and(|org| org != own) => {
            Err(MembershipError::forbidden("user belongs to another organization"))
        }
        MembershipScope::Organization(own) if target == Some(own) && !approved => Ok(()),
        MembershipScope::Organization(own) => Err(MembershipError::forbidden(format!(
            "organization admins may only add unapproved members to organization {own}"
        ))),
        MembershipScope::Nothing => Err(MembershipError::forbidden("not an administrator")),
    }
}

/// Checks approval of `user_id`, currently a member of `target`.
pub fn authorize_approve(
    actor: &RoleState,
    user_id: &UserId,
    target: Option<OrganizationId>,
) -> Result<(), MembershipError> {
    let Some(target) = target else {
        return Err(MembershipError::NoOrganization(user_id.clone()));
    };

    if membership_scope(actor).admits(Some(target)) {
        Ok(())
    } else {
        Err(MembershipError::forbidden(format!(
            "user {user_id} belongs to another organization"
        )))
    }
}

/// Only super admins and approved admins of `organization_id` rotate its
/// access code.
pub fn authorize_regenerate_access_code(
    actor: &RoleState,
    organization_id: OrganizationId,
) -> Result<(), MembershipError> {
    if membership_scope(actor).admits(Some(organization_id)) {
        Ok(())
    } else {
        Err(MembershipError::forbidden(format!(
            "cannot manage access code of organization {organization_id}"
        )))
    }
}

/// What a valid access code does for the user presenting it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JoinPlan {
    /// Move the user into the organization, pending approval.
    Assign,
    /// Already a member; membership and approval stay as they are.
    AlreadyMember,
}

/// Decide a join by access code for a user currently in `current`.
///
/// Approved members of another organization must be moved by an admin.
pub fn plan_join(
    current: Option<OrganizationId>,
    approved: bool,
    target: OrganizationId,
) -> Result<JoinPlan, MembershipError> {
    match current {
        Some(org) if org == target => Ok(JoinPlan::AlreadyMember),
        Some(_) if approved => Err(MembershipError::forbidden(
            "approved members of another organization cannot switch by access code",
        )),
        _ => Ok(JoinPlan::Assign),
    }
}
