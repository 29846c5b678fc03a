use serde::{Deserialize, Serialize};

use booksmartly_auth::{GateDecision, GateReason, GateRequirement, Role, RoleState};
use booksmartly_core::{AccessCode, Email, OrganizationId, UserId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct GateQuery {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignOrganizationRequest {
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOrganizationRequest {
    pub organization_id: OrganizationId,
    pub access_code: AccessCode,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatusResponse {
    #[serde(flatten)]
    pub role_state: RoleState,
    pub is_loading: bool,
}

impl From<RoleState> for AdminStatusResponse {
    fn from(role_state: RoleState) -> Self {
        Self {
            role_state,
            is_loading: false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GateResponse {
    pub path: String,
    pub requirement: GateRequirement,
    #[serde(flatten)]
    pub decision: GateDecision,
    pub reason: GateReason,
}

/// A directory user as shown to admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub email: Email,
    pub name: Option<String>,
    pub organization_id: Option<OrganizationId>,
    pub organization_approved: bool,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOrganizationResponse {
    pub organization_id: OrganizationId,
    pub already_member: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCodeResponse {
    pub organization_id: OrganizationId,
    pub access_code: String,
}
