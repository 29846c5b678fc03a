//! `booksmartly-auth`: role resolution and route gating (fail-closed).
//!
//! This crate is intentionally decoupled from HTTP and storage: role and
//! approval data arrive through the [`RoleLookup`] and [`ApprovalLookup`]
//! seams, sessions through a `watch` channel of [`SessionState`].

pub mod claims;
pub mod gate;
pub mod guard;
pub mod identity;
pub mod lookup;
pub mod membership;
pub mod policy;
pub mod resolver;
pub mod role;
pub mod status;

pub use claims::{JwtValidator, SessionClaims, TokenValidationError, validate_claims};
pub use gate::{GateDecision, GateOutcome, GateReason, GateRequirement, RouteGate};
pub use guard::{AdminProtectedRoute, ProtectedRoute, screen_requirement};
pub use identity::{Identity, SessionState};
pub use lookup::{Approval, ApprovalLookup, LookupError, RoleLookup, RoleLookupResult};
pub use membership::{JoinPlan, MembershipError, MembershipScope, membership_scope};
pub use policy::{BYPASS_ORGANIZATION_ID, PRIVILEGED_EMAIL, PrivilegePolicy};
pub use resolver::AccessControlResolver;
pub use role::{Role, RoleFlags, RoleState};
pub use status::{AdminStatus, AdminStatusTracker, Generation, ResolutionTicket};
