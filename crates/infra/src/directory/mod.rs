//! User directory: the `users` / `user_roles` tables behind role resolution
//! and membership administration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use booksmartly_auth::{ApprovalLookup, LookupError, MembershipError, MembershipScope, Role, RoleLookup};
use booksmartly_core::{AccessCode, Email, OrganizationId, UserId};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryDirectory;
pub use postgres::PostgresDirectory;

/// A user row joined with its role row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub id: UserId,
    pub email: Email,
    pub name: Option<String>,
    pub organization_id: Option<OrganizationId>,
    pub organization_approved: bool,
    pub role: Option<Role>,
    pub updated_at: DateTime<Utc>,
}

impl DirectoryUser {
    pub fn new(id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: Email::new(email),
            name: None,
            organization_id: None,
            organization_approved: false,
            role: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn in_organization(mut self, organization_id: OrganizationId, approved: bool) -> Self {
        self.organization_id = Some(organization_id);
        self.organization_approved = approved;
        self
    }
}

/// An organization row with its current access code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryOrganization {
    pub id: OrganizationId,
    pub name: String,
    pub access_code: AccessCode,
    pub updated_at: DateTime<Utc>,
}

impl DirectoryOrganization {
    pub fn new(id: OrganizationId, name: impl Into<String>, access_code: AccessCode) -> Self {
        Self {
            id,
            name: name.into(),
            access_code,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user {0} not found")]
    NotFound(UserId),

    #[error("organization {0} not found")]
    OrganizationNotFound(OrganizationId),

    #[error("directory unavailable")]
    Unavailable,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<DirectoryError> for LookupError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::Unavailable => LookupError::Unavailable("directory".to_string()),
            other => LookupError::Query(other.to_string()),
        }
    }
}

impl From<DirectoryError> for MembershipError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::NotFound(user_id) => MembershipError::NotFound(user_id),
            DirectoryError::OrganizationNotFound(id) => MembershipError::OrganizationNotFound(id),
            other => MembershipError::Directory(other.to_string()),
        }
    }
}

/// Write side and listing of the user directory.
///
/// Authorization is the caller's job; implementations only enforce that the
/// user or organization exists.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<DirectoryUser>, DirectoryError>;

    /// Users inside `scope`, ordered by email.
    async fn list_users(&self, scope: MembershipScope) -> Result<Vec<DirectoryUser>, DirectoryError>;

    async fn set_role(&self, user_id: &UserId, role: Role) -> Result<(), DirectoryError>;

    async fn set_organization(
        &self,
        user_id: &UserId,
        organization_id: Option<OrganizationId>,
        approved: bool,
    ) -> Result<(), DirectoryError>;

    async fn approve(&self, user_id: &UserId) -> Result<(), DirectoryError>;

    /// Whether `code` is the current access code of `organization_id`.
    /// Unknown organizations never match.
    async fn verify_access_code(
        &self,
        organization_id: OrganizationId,
        code: &AccessCode,
    ) -> Result<bool, DirectoryError>;

    async fn set_access_code(
        &self,
        organization_id: OrganizationId,
        code: &AccessCode,
    ) -> Result<(), DirectoryError>;
}

/// A directory that also answers the resolver's lookups.
pub trait Directory: UserDirectory + RoleLookup + ApprovalLookup {}

impl<T> Directory for T where T: UserDirectory + RoleLookup + ApprovalLookup {}
