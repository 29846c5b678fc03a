//! Collaborator seams consumed by the resolver.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use booksmartly_core::{OrganizationId, UserId};

/// Output of the role lookup for one user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleLookupResult {
    pub is_admin: bool,
    pub is_super_admin: bool,
    pub is_org_admin: bool,
    pub organization_id: Option<OrganizationId>,
}

/// Approval row for a user's organization membership.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub organization_approved: bool,
}

/// A role or approval query failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("lookup backend unavailable: {0}")]
    Unavailable(String),

    #[error("lookup failed: {0}")]
    Query(String),
}

impl LookupError {
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }
}

/// Role classification source, keyed by user id.
#[async_trait]
pub trait RoleLookup: Send + Sync {
    async fn check_admin_status(&self, user_id: &UserId) -> Result<RoleLookupResult, LookupError>;
}

/// Organization approval source, keyed by user id.
///
/// `Ok(None)` means no row exists for the user.
#[async_trait]
pub trait ApprovalLookup: Send + Sync {
    async fn get_approval(&self, user_id: &UserId) -> Result<Option<Approval>, LookupError>;
}

#[async_trait]
impl<S> RoleLookup for Arc<S>
where
    S: RoleLookup + ?Sized,
{
    async fn check_admin_status(&self, user_id: &UserId) -> Result<RoleLookupResult, LookupError> {
        (**self).check_admin_status(user_id).await
    }
}

#[async_trait]
impl<S> ApprovalLookup for Arc<S>
where
    S: ApprovalLookup + ?Sized,
{
    async fn get_approval(&self, user_id: &UserId) -> Result<Option<Approval>, LookupError> {
        (**self).get_approval(user_id).await
    }
}
