use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use booksmartly_auth::{GateDecision, GateRequirement, JwtValidator};

use crate::app::{errors, services::AppServices};
use crate::context::{RoleContext, SessionContext};

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Attach a [`SessionContext`] to the request.
///
/// No `Authorization` header means an anonymous session (the gate decides
/// what that may see); a header that is present but unusable is a `401`.
pub async fn session_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let session = match extract_bearer(req.headers())? {
        None => SessionContext::anonymous(),
        Some(token) => {
            let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
                tracing::debug!(error = %e, "rejected bearer token");
                StatusCode::UNAUTHORIZED
            })?;
            SessionContext::new(claims.identity())
        }
    };

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, StatusCode> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(Some(token))
}

#[derive(Clone)]
pub struct GateState {
    pub services: Arc<AppServices>,
    pub requirement: GateRequirement,
}

/// Resolve the caller's role state and apply the route gate.
///
/// Must run inside [`session_middleware`].
pub async fn gate_middleware(
    State(gate): State<GateState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let session = req
        .extensions()
        .get::<SessionContext>()
        .cloned()
        .unwrap_or_default();
    let identity = session.identity();

    let role_state = gate.services.resolver.resolve(identity).await;
    let outcome = gate
        .services
        .gate
        .evaluate(false, identity, &role_state, gate.requirement);

    match outcome.decision {
        GateDecision::Render => {
            req.extensions_mut().insert(RoleContext::new(role_state));
            next.run(req).await
        }
        GateDecision::RedirectTo(target) => errors::redirect_response(&target, outcome.reason),
        GateDecision::Pending => errors::json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "session_pending",
            "session has not resolved",
        ),
    }
}
