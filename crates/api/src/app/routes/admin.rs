use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use booksmartly_core::{OrganizationId, UserId};

use crate::app::dto::{AccessCodeResponse, AssignOrganizationRequest, SetRoleRequest};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::RoleContext;

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RoleContext>,
) -> axum::response::Response {
    match services.membership.list_users(actor.role_state()).await {
        Ok(users) => Json(users).into_response(),
        Err(e) => errors::membership_error_to_response(e),
    }
}

pub async fn set_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RoleContext>,
    Path(id): Path<String>,
    Json(body): Json<SetRoleRequest>,
) -> axum::response::Response {
    let user_id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .membership
        .set_role(actor.role_state(), &user_id, body.role)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::membership_error_to_response(e),
    }
}

pub async fn assign_organization(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RoleContext>,
    Path(id): Path<String>,
    Json(body): Json<AssignOrganizationRequest>,
) -> axum::response::Response {
    let user_id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .membership
        .assign_organization(actor.role_state(), &user_id, body.organization_id, body.approved)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::membership_error_to_response(e),
    }
}

pub async fn approve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RoleContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let user_id = match parse_user_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.membership.approve(actor.role_state(), &user_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::membership_error_to_response(e),
    }
}

pub async fn regenerate_access_code(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<RoleContext>,
    Path(id): Path<i64>,
) -> axum::response::Response {
    let organization_id = OrganizationId::new(id);
    match services
        .membership
        .regenerate_access_code(actor.role_state(), organization_id)
        .await
    {
        Ok(code) => Json(AccessCodeResponse {
            organization_id,
            access_code: code.into(),
        })
        .into_response(),
        Err(e) => errors::membership_error_to_response(e),
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, axum::response::Response> {
    raw.parse::<UserId>().map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
    })
}
