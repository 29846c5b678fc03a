use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use booksmartly_auth::{GateReason, MembershipError, gate::LOGIN_PATH};

pub fn membership_error_to_response(err: MembershipError) -> axum::response::Response {
    match err {
        MembershipError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        MembershipError::NotFound(user_id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("user {user_id} not found"))
        }
        e @ MembershipError::NoOrganization(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "no_organization", e.to_string())
        }
        e @ MembershipError::ApprovalWithoutOrganization => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
        MembershipError::OrganizationNotFound(id) => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("organization {id} not found"),
        ),
        e @ MembershipError::InvalidAccessCode => {
            json_error(StatusCode::FORBIDDEN, "invalid_access_code", e.to_string())
        }
        MembershipError::Directory(msg) => {
            tracing::error!(error = %msg, "directory failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "directory_error", msg)
        }
    }
}

/// Map a gate redirect onto HTTP: to the login page is `401`, anywhere else `403`.
pub fn redirect_response(target: &str, reason: GateReason) -> axum::response::Response {
    let (status, code) = if target == LOGIN_PATH {
        (StatusCode::UNAUTHORIZED, "unauthenticated")
    } else {
        (StatusCode::FORBIDDEN, "forbidden")
    };

    (
        status,
        axum::Json(json!({
            "error": code,
            "redirect": target,
            "reason": reason,
        })),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
