//! Screen guards built on [`RouteGate`].

use crate::{AdminStatus, GateDecision, GateRequirement, RouteGate, RoleState, SessionState};

/// Guard for screens that only need a signed-in user.
///
/// Waits on the session alone; admin status is never consulted.
#[derive(Debug, Clone, Default)]
pub struct ProtectedRoute {
    gate: RouteGate,
}

impl ProtectedRoute {
    pub fn new(gate: RouteGate) -> Self {
        Self { gate }
    }

    pub fn requirement(&self) -> GateRequirement {
        GateRequirement::AuthenticatedOnly
    }

    pub fn evaluate(&self, session: &SessionState) -> GateDecision {
        self.gate.decide(
            session.is_pending(),
            session.identity(),
            &RoleState::restricted(),
            GateRequirement::AuthenticatedOnly,
        )
    }
}

/// Guard for admin screens.
///
/// Stays `Pending` while the session is pending, while the admin status is
/// loading, or while the admin status still belongs to a previous identity.
#[derive(Debug, Clone)]
pub struct AdminProtectedRoute {
    gate: RouteGate,
    requirement: GateRequirement,
}

impl AdminProtectedRoute {
    pub fn admin(gate: RouteGate) -> Self {
        Self {
            gate,
            requirement: GateRequirement::AdminOnly,
        }
    }

    pub fn super_admin(gate: RouteGate) -> Self {
        Self {
            gate,
            requirement: GateRequirement::SuperAdminOnly,
        }
    }

    pub fn requirement(&self) -> GateRequirement {
        self.requirement
    }

    pub fn evaluate(&self, session: &SessionState, status: &AdminStatus) -> GateDecision {
        let identity = session.identity();
        let waiting = session.is_pending() || status.is_loading || !status.is_for(identity);
        self.gate
            .decide(waiting, identity, &status.role_state, self.requirement)
    }
}

/// Access requirement of a screen path.
///
/// Organization management and the analytics widget settings are reserved
/// for super admins; the rest of `/admin` is open to any admin.
pub fn screen_requirement(path: &str) -> GateRequirement {
    let path = path.split(&['?', '#'][..]).next().unwrap_or(path);
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    match path {
        "/" | "/login" | "/signup" | "/logout" => GateRequirement::None,
        _ if is_under(path, "/admin/organizations") => GateRequirement::SuperAdminOnly,
        "/admin/settings/analytics-widget" => GateRequirement::SuperAdminOnly,
        _ if is_under(path, "/admin") => GateRequirement::AdminOnly,
        _ => GateRequirement::AuthenticatedOnly,
    }
}

fn is_under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
