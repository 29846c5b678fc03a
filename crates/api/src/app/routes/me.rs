use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};

use booksmartly_auth::{JoinPlan, screen_requirement};

use crate::app::dto::{
    AdminStatusResponse, GateQuery, GateResponse, JoinOrganizationRequest, JoinOrganizationResponse,
};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::{RoleContext, SessionContext};

/// The caller's resolved role state (what `useAdminStatus` reports once settled).
pub async fn admin_status(Extension(role): Extension<RoleContext>) -> impl IntoResponse {
    Json(AdminStatusResponse::from(*role.role_state()))
}

/// Evaluate the gate for a screen path on behalf of the caller.
///
/// Always `200`: the decision itself is the payload.
pub async fn gate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<GateQuery>,
) -> impl IntoResponse {
    let identity = session.identity();
    let requirement = screen_requirement(&query.path);
    let role_state = services.resolver.resolve(identity).await;
    let outcome = services
        .gate
        .evaluate(false, identity, &role_state, requirement);

    Json(GateResponse {
        path: query.path,
        requirement,
        decision: outcome.decision,
        reason: outcome.reason,
    })
}

/// Join an organization with its access code; an admin still has to approve.
pub async fn join_organization(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(body): Json<JoinOrganizationRequest>,
) -> axum::response::Response {
    let Some(identity) = session.identity() else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "sign in first");
    };

    match services
        .membership
        .join_organization(&identity.user_id, body.organization_id, &body.access_code)
        .await
    {
        Ok(plan) => Json(JoinOrganizationResponse {
            organization_id: body.organization_id,
            already_member: plan == JoinPlan::AlreadyMember,
        })
        .into_response(),
        Err(e) => errors::membership_error_to_response(e),
    }
}
