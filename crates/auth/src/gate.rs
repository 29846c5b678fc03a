//! Route gate: (session, role state, requirement) -> render or redirect.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Identity, PrivilegePolicy, RoleState};

/// Where unauthenticated visitors are sent.
pub const LOGIN_PATH: &str = "/login";

/// Where signed-in visitors without the required role are sent.
pub const HOME_PATH: &str = "/";

/// Static access requirement of a screen.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateRequirement {
    None,
    AuthenticatedOnly,
    AdminOnly,
    SuperAdminOnly,
}

/// Result of evaluating a gate. Recomputed on every input change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "target", rename_all = "snake_case")]
pub enum GateDecision {
    /// The session has not resolved yet; show a loading state.
    Pending,
    Render,
    RedirectTo(String),
}

impl GateDecision {
    pub fn redirect(path: &str) -> Self {
        Self::RedirectTo(path.to_string())
    }

    pub fn is_render(&self) -> bool {
        matches!(self, Self::Render)
    }
}

/// Why the gate decided what it decided (for logs and the `/gate` endpoint).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    SessionPending,
    Public,
    NotAuthenticated,
    PrivilegedIdentity,
    MissingSuperAdmin,
    MissingAdmin,
    Allowed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateOutcome {
    #[serde(flatten)]
    pub decision: GateDecision,
    pub reason: GateReason,
}

impl GateOutcome {
    fn new(decision: GateDecision, reason: GateReason) -> Self {
        Self { decision, reason }
    }
}

/// Gate evaluator carrying the shared privilege policy.
#[derive(Debug, Clone, Default)]
pub struct RouteGate {
    policy: PrivilegePolicy,
}

impl RouteGate {
    pub fn new(policy: PrivilegePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PrivilegePolicy {
        &self.policy
    }

    /// Decide whether to render a screen.
    ///
    /// - No IO
    /// - No panics
    /// - The privileged identity renders even when `role_state` still lags
    ///   behind the identity
    pub fn decide(
        &self,
        session_pending: bool,
        identity: Option<&Identity>,
        role_state: &RoleState,
        requirement: GateRequirement,
    ) -> GateDecision {
        self.evaluate(session_pending, identity, role_state, requirement)
            .decision
    }

    /// Same as [`RouteGate::decide`], with the reason attached.
    pub fn evaluate(
        &self,
        session_pending: bool,
        identity: Option<&Identity>,
        role_state: &RoleState,
        requirement: GateRequirement,
    ) -> GateOutcome {
        let outcome = self.evaluate_inner(session_pending, identity, role_state, requirement);
        debug!(
            ?requirement,
            user_id = identity.map(|i| i.user_id.as_str()),
            reason = ?outcome.reason,
            decision = ?outcome.decision,
            "gate evaluated"
        );
        outcome
    }

    fn evaluate_inner(
        &self,
        session_pending: bool,
        identity: Option<&Identity>,
        role_state: &RoleState,
        requirement: GateRequirement,
    ) -> GateOutcome {
        if session_pending {
            return GateOutcome::new(GateDecision::Pending, GateReason::SessionPending);
        }

        let Some(identity) = identity else {
            return if requirement == GateRequirement::None {
                GateOutcome::new(GateDecision::Render, GateReason::Public)
            } else {
                GateOutcome::new(GateDecision::redirect(LOGIN_PATH), GateReason::NotAuthenticated)
            };
        };

        if self.policy.is_privileged(identity) {
            return GateOutcome::new(GateDecision::Render, GateReason::PrivilegedIdentity);
        }

        match requirement {
            GateRequirement::SuperAdminOnly if !role_state.is_super_admin => {
                GateOutcome::new(GateDecision::redirect(HOME_PATH), GateReason::MissingSuperAdmin)
            }
            GateRequirement::AdminOnly if !role_state.is_admin => {
                GateOutcome::new(GateDecision::redirect(HOME_PATH), GateReason::MissingAdmin)
            }
            GateRequirement::None => GateOutcome::new(GateDecision::Render, GateReason::Public),
            _ => GateOutcome::new(GateDecision::Render, GateReason::Allowed),
        }
    }
}
