use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};

use booksmartly_auth::GateRequirement;

use crate::app::services::AppServices;
use crate::middleware::{GateState, gate_middleware};

pub mod admin;
pub mod me;
pub mod system;

/// Router for every session-aware endpoint, grouped by gate requirement.
pub fn router(services: Arc<AppServices>) -> Router {
    let gated = |requirement: GateRequirement, routes: Router| {
        routes.route_layer(axum::middleware::from_fn_with_state(
            GateState {
                services: services.clone(),
                requirement,
            },
            gate_middleware,
        ))
    };

    let public = Router::new().route("/gate", get(me::gate));

    let authenticated = gated(
        GateRequirement::AuthenticatedOnly,
        Router::new()
            .route("/me/admin-status", get(me::admin_status))
            .route("/me/organization/join", post(me::join_organization)),
    );

    let admin = gated(
        GateRequirement::AdminOnly,
        Router::new()
            .route("/admin/users", get(admin::list_users))
            .route("/admin/users/:id/organization", put(admin::assign_organization))
            .route("/admin/users/:id/approve", post(admin::approve))
            .route(
                "/admin/organizations/:id/access-code",
                post(admin::regenerate_access_code),
            ),
    );

    let super_admin = gated(
        GateRequirement::SuperAdminOnly,
        Router::new().route("/admin/users/:id/role", put(admin::set_role)),
    );

    public.merge(authenticated).merge(admin).merge(super_admin)
}
