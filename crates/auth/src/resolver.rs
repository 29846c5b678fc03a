//! Access control resolver: identity in, [`RoleState`] out.

use tracing::{debug, info, warn};

use crate::{ApprovalLookup, Identity, PrivilegePolicy, RoleLookup, RoleState};

/// Resolves the role state of an identity against the two lookups.
///
/// - Never returns an error: every failure settles to a least-privileged state
/// - The privileged identity short-circuits before any query, and again if
///   the role lookup fails
/// - No retries; calling twice with the same identity repeats the same reads
pub struct AccessControlResolver<R, A> {
    roles: R,
    approvals: A,
    policy: PrivilegePolicy,
}

impl<R, A> AccessControlResolver<R, A>
where
    R: RoleLookup,
    A: ApprovalLookup,
{
    pub fn new(roles: R, approvals: A, policy: PrivilegePolicy) -> Self {
        Self {
            roles,
            approvals,
            policy,
        }
    }

    pub fn policy(&self) -> &PrivilegePolicy {
        &self.policy
    }

    pub async fn resolve(&self, identity: Option<&Identity>) -> RoleState {
        let Some(identity) = identity else {
            return RoleState::restricted();
        };

        if self.policy.is_privileged(identity) {
            info!(user_id = %identity.user_id, "privileged identity, granting super admin");
            return self.policy.bypass_state();
        }

        let status = match self.roles.check_admin_status(&identity.user_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!(user_id = %identity.user_id, error = %e, "role lookup failed");
                return self.after_lookup_failure(identity);
            }
        };

        let is_org_approved = match status.organization_id {
            Some(_) => match self.approvals.get_approval(&identity.user_id).await {
                Ok(Some(approval)) => approval.organization_approved,
                Ok(None) => false,
                Err(e) => {
                    warn!(user_id = %identity.user_id, error = %e, "approval lookup failed");
                    false
                }
            },
            None => false,
        };

        let state = RoleState {
            is_admin: status.is_admin || status.is_super_admin,
            is_super_admin: status.is_super_admin,
            is_org_admin: status.is_org_admin,
            organization_id: status.organization_id,
            is_org_approved,
        };
        debug!(user_id = %identity.user_id, ?state, "role state resolved");
        state
    }

    /// State settled on when the role lookup fails: the bypass for the
    /// privileged identity, least privilege for everyone else.
    fn after_lookup_failure(&self, identity: &Identity) -> RoleState {
        if self.policy.is_privileged(identity) {
            self.policy.bypass_state()
        } else {
            RoleState::restricted()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use proptest::prelude::*;

    use booksmartly_core::{OrganizationId, UserId};

    use super::*;
    use crate::{Approval, LookupError, PRIVILEGED_EMAIL, RoleLookupResult};

    /// Scripted role lookup that counts its calls.
    pub(crate) struct StubRoles {
        pub result: Mutex<Result<RoleLookupResult, LookupError>>,
        pub calls: AtomicUsize,
    }

    impl StubRoles {
        pub(crate) fn returning(result: RoleLookupResult) -> Self {
            Self {
                result: Mutex::new(Ok(result)),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                result: Mutex::new(Err(LookupError::query("user_roles unavailable"))),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RoleLookup for StubRoles {
        async fn check_admin_status(&self, _user_id: &UserId) -> Result<RoleLookupResult, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.lock().unwrap().clone()
        }
    }

    pub(crate) struct StubApprovals {
        pub result: Result<Option<Approval>, LookupError>,
        pub calls: AtomicUsize,
    }

    impl StubApprovals {
        pub(crate) fn returning(result: Result<Option<Approval>, LookupError>) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn approved() -> Self {
            Self::returning(Ok(Some(Approval {
                organization_approved: true,
            })))
        }
    }

    #[async_trait]
    impl ApprovalLookup for StubApprovals {
        async fn get_approval(&self, _user_id: &UserId) -> Result<Option<Approval>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn member_of(org: i64) -> RoleLookupResult {
        RoleLookupResult {
            organization_id: Some(OrganizationId::new(org)),
            ..RoleLookupResult::default()
        }
    }

    fn resolver(
        roles: StubRoles,
        approvals: StubApprovals,
    ) -> AccessControlResolver<StubRoles, StubApprovals> {
        AccessControlResolver::new(roles, approvals, PrivilegePolicy::default())
    }

    #[tokio::test]
    async fn no_identity_resolves_restricted_without_queries() {
        let r = resolver(StubRoles::returning(member_of(7)), StubApprovals::approved());

        assert_eq!(r.resolve(None).await, RoleState::restricted());
        assert_eq!(r.roles.calls.load(Ordering::SeqCst), 0);
        assert_eq!(r.approvals.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn privileged_identity_never_queries() {
        let r = resolver(StubRoles::returning(RoleLookupResult::default()), StubApprovals::approved());
        let identity = Identity::new("1", PRIVILEGED_EMAIL);

        let state = r.resolve(Some(&identity)).await;

        assert_eq!(state, RoleState::super_admin_bypass(OrganizationId::new(1)));
        assert_eq!(r.roles.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn member_with_approval_is_approved_but_not_admin() {
        let r = resolver(StubRoles::returning(member_of(7)), StubApprovals::approved());
        let identity = Identity::new("42", "user@x.com");

        let state = r.resolve(Some(&identity)).await;

        assert_eq!(
            state,
            RoleState {
                is_admin: false,
                is_super_admin: false,
                is_org_admin: false,
                organization_id: Some(OrganizationId::new(7)),
                is_org_approved: true,
            }
        );
    }

    #[tokio::test]
    async fn approval_is_not_queried_without_organization() {
        let r = resolver(StubRoles::returning(RoleLookupResult::default()), StubApprovals::approved());
        let identity = Identity::new("42", "user@x.com");

        let state = r.resolve(Some(&identity)).await;

        assert!(!state.is_org_approved);
        assert_eq!(r.approvals.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_or_failing_approval_fails_closed() {
        let identity = Identity::new("42", "user@x.com");

        let r = resolver(StubRoles::returning(member_of(7)), StubApprovals::returning(Ok(None)));
        assert!(!r.resolve(Some(&identity)).await.is_org_approved);

        let r = resolver(
            StubRoles::returning(member_of(7)),
            StubApprovals::returning(Err(LookupError::query("boom"))),
        );
        let state = r.resolve(Some(&identity)).await;
        assert!(!state.is_org_approved);
        assert_eq!(state.organization_id, Some(OrganizationId::new(7)));
    }

    #[tokio::test]
    async fn failing_role_lookup_resolves_restricted() {
        let r = resolver(StubRoles::failing(), StubApprovals::approved());
        let identity = Identity::new("42", "user@x.com");

        assert_eq!(r.resolve(Some(&identity)).await, RoleState::restricted());
        assert_eq!(r.approvals.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_role_lookup_keeps_bypass() {
        let r = resolver(StubRoles::failing(), StubApprovals::approved());
        let identity = Identity::new("1", PRIVILEGED_EMAIL);

        let state = r.resolve(Some(&identity)).await;

        assert!(state.is_super_admin);
        assert!(state.is_admin);
    }

    #[test]
    fn lookup_failure_fallback_depends_on_identity() {
        let r = resolver(StubRoles::failing(), StubApprovals::approved());

        let privileged = Identity::new("1", PRIVILEGED_EMAIL);
        assert_eq!(
            r.after_lookup_failure(&privileged),
            RoleState::super_admin_bypass(OrganizationId::new(1))
        );

        let ordinary = Identity::new("42", "user@x.com");
        assert_eq!(r.after_lookup_failure(&ordinary), RoleState::restricted());
        assert_eq!(r.roles.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn super_admin_without_admin_flag_is_normalised() {
        let r = resolver(
            StubRoles::returning(RoleLookupResult {
                is_super_admin: true,
                ..RoleLookupResult::default()
            }),
            StubApprovals::approved(),
        );
        let identity = Identity::new("5", "boss@x.com");

        let state = r.resolve(Some(&identity)).await;

        assert!(state.is_super_admin && state.is_admin);
    }

    #[tokio::test]
    async fn resolution_is_repeatable() {
        let r = resolver(StubRoles::returning(member_of(3)), StubApprovals::approved());
        let identity = Identity::new("42", "user@x.com");

        let first = r.resolve(Some(&identity)).await;
        let second = r.resolve(Some(&identity)).await;

        assert_eq!(first, second);
        assert_eq!(r.roles.calls.load(Ordering::SeqCst), 2);
    }

    fn lookup_result() -> impl Strategy<Value = Result<RoleLookupResult, LookupError>> {
        prop_oneof![
            (any::<bool>(), any::<bool>(), any::<bool>(), proptest::option::of(1i64..100)).prop_map(
                |(is_admin, is_super_admin, is_org_admin, org)| Ok(RoleLookupResult {
                    is_admin,
                    is_super_admin,
                    is_org_admin,
                    organization_id: org.map(OrganizationId::new),
                })
            ),
            Just(Err(LookupError::query("down"))),
        ]
    }

    fn approval_result() -> impl Strategy<Value = Result<Option<Approval>, LookupError>> {
        prop_oneof![
            any::<bool>().prop_map(|organization_approved| Ok(Some(Approval { organization_approved }))),
            Just(Ok(None)),
            Just(Err(LookupError::query("down"))),
        ]
    }

    proptest! {
        #[test]
        fn every_resolved_state_is_consistent(
            roles in lookup_result(),
            approvals in approval_result(),
            privileged in any::<bool>(),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let r = AccessControlResolver::new(
                StubRoles { result: Mutex::new(roles.clone()), calls: AtomicUsize::new(0) },
                StubApprovals::returning(approvals),
                PrivilegePolicy::default(),
            );
            let email = if privileged { PRIVILEGED_EMAIL } else { "someone@x.com" };
            let identity = Identity::new("u", email);

            let state = runtime.block_on(r.resolve(Some(&identity)));

            prop_assert!(state.is_consistent());
            if privileged {
                prop_assert_eq!(state, PrivilegePolicy::default().bypass_state());
            } else if roles.is_err() {
                prop_assert_eq!(state, RoleState::restricted());
            }
        }
    }
}
