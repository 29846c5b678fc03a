//! Service wiring: directory backend, resolver, gate and membership
//! administration.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use booksmartly_auth::membership::{
    authorize_approve, authorize_assign_organization, authorize_regenerate_access_code,
    authorize_set_role, plan_join,
};
use booksmartly_auth::{
    AccessControlResolver, JoinPlan, MembershipError, PrivilegePolicy, Role, RoleState, RouteGate,
    membership_scope,
};
use booksmartly_core::{AccessCode, OrganizationId, UserId};
use booksmartly_infra::{
    Directory, DirectoryUser, InMemoryDirectory, PostgresDirectory, UserDirectory,
};

use crate::app::dto::UserView;
use crate::config::ApiConfig;

pub type DynDirectory = Arc<dyn Directory>;

pub struct AppServices {
    pub resolver: AccessControlResolver<DynDirectory, DynDirectory>,
    pub gate: RouteGate,
    pub membership: MembershipService,
}

impl AppServices {
    /// Wire every service around one directory and one privilege policy.
    pub fn new(directory: DynDirectory, policy: PrivilegePolicy) -> Self {
        Self {
            resolver: AccessControlResolver::new(directory.clone(), directory.clone(), policy.clone()),
            gate: RouteGate::new(policy.clone()),
            membership: MembershipService::new(directory, policy),
        }
    }
}

/// Pick the directory backend from config: Postgres when `DATABASE_URL` is
/// set, in-memory otherwise.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let directory: DynDirectory = match &config.database_url {
        Some(url) => {
            let directory = PostgresDirectory::connect(url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            directory
                .ensure_schema()
                .await
                .context("failed to prepare directory schema")?;
            info!("using postgres user directory");
            Arc::new(directory)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory user directory");
            Arc::new(InMemoryDirectory::new())
        }
    };

    Ok(AppServices::new(directory, config.policy()))
}

/// Role and organization administration on behalf of an admin.
///
/// Every call takes the actor's resolved [`RoleState`] and checks scope
/// before touching the directory.
pub struct MembershipService {
    directory: DynDirectory,
    policy: PrivilegePolicy,
}

impl MembershipService {
    pub fn new(directory: DynDirectory, policy: PrivilegePolicy) -> Self {
        Self { directory, policy }
    }

    pub async fn list_users(&self, actor: &RoleState) -> Result<Vec<UserView>, MembershipError> {
        let users = self.directory.list_users(membership_scope(actor)).await?;
        Ok(users.into_iter().map(|u| self.view(u)).collect())
    }

    pub async fn set_role(&self, actor: &RoleState, user_id: &UserId, role: Role) -> Result<(), MembershipError> {
        authorize_set_role(actor)?;
        self.directory.set_role(user_id, role).await?;
        info!(user_id = %user_id, role = %role, "role updated");
        Ok(())
    }

    pub async fn assign_organization(
        &self,
        actor: &RoleState,
        user_id: &UserId,
        organization_id: Option<OrganizationId>,
        approved: bool,
    ) -> Result<(), MembershipError> {
        let user = self.require_user(user_id).await?;
        authorize_assign_organization(actor, user.organization_id, organization_id, approved)?;
        self.directory
            .set_organization(user_id, organization_id, approved)
            .await?;
        info!(
            user_id = %user_id,
            organization_id = organization_id.map(|id| id.get()),
            approved,
            "organization updated"
        );
        Ok(())
    }

    pub async fn approve(&self, actor: &RoleState, user_id: &UserId) -> Result<(), MembershipError> {
        let user = self.require_user(user_id).await?;
        authorize_approve(actor, user_id, user.organization_id)?;
        self.directory.approve(user_id).await?;
        info!(user_id = %user_id, "organization membership approved");
        Ok(())
    }

    /// Join an organization by access code. The membership starts unapproved.
    pub async fn join_organization(
        &self,
        user_id: &UserId,
        organization_id: OrganizationId,
        code: &AccessCode,
    ) -> Result<JoinPlan, MembershipError> {
        if !self.directory.verify_access_code(organization_id, code).await? {
            tracing::warn!(user_id = %user_id, organization_id = organization_id.get(), "access code rejected");
            return Err(MembershipError::InvalidAccessCode);
        }

        let user = self.require_user(user_id).await?;
        let plan = plan_join(user.organization_id, user.organization_approved, organization_id)?;
        if plan == JoinPlan::Assign {
            self.directory
                .set_organization(user_id, Some(organization_id), false)
                .await?;
            info!(
                user_id = %user_id,
                organization_id = organization_id.get(),
                "joined organization, awaiting approval"
            );
        }
        Ok(plan)
    }

    /// Replace an organization's access code; the old code stops working.
    pub async fn regenerate_access_code(
        &self,
        actor: &RoleState,
        organization_id: OrganizationId,
    ) -> Result<AccessCode, MembershipError> {
        authorize_regenerate_access_code(actor, organization_id)?;
        let code = AccessCode::generate();
        self.directory.set_access_code(organization_id, &code).await?;
        info!(organization_id = organization_id.get(), "access code regenerated");
        Ok(code)
    }

    async fn require_user(&self, user_id: &UserId) -> Result<DirectoryUser, MembershipError> {
        self.directory
            .get_user(user_id)
            .await?
            .ok_or_else(|| MembershipError::NotFound(user_id.clone()))
    }

    /// The privileged address is listed as a super admin even without a role row.
    fn view(&self, user: DirectoryUser) -> UserView {
        let role = match user.role {
            Some(role) => Some(role),
            None if user.email.as_str() == self.policy.privileged_email() => Some(Role::SuperAdmin),
            None => None,
        };
        UserView {
            id: user.id,
            email: user.email,
            name: user.name,
            organization_id: user.organization_id,
            organization_approved: user.organization_approved,
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use booksmartly_auth::PRIVILEGED_EMAIL;
    use booksmartly_infra::DirectoryOrganization;

    use super::*;

    fn service() -> (Arc<InMemoryDirectory>, MembershipService) {
        let dir = Arc::new(InMemoryDirectory::new());
        let users = [
            DirectoryUser::new("1", PRIVILEGED_EMAIL),
            DirectoryUser::new("8", "lead@x.com")
                .with_role(Role::OrgAdmin)
                .in_organization(OrganizationId::new(7), true),
            DirectoryUser::new("42", "user@x.com").in_organization(OrganizationId::new(7), false),
            DirectoryUser::new("9", "other@y.com").in_organization(OrganizationId::new(3), false),
            DirectoryUser::new("10", "new@z.com"),
        ];
        for user in users {
            dir.upsert_user(user).unwrap();
        }
        dir.upsert_organization(DirectoryOrganization::new(
            OrganizationId::new(7),
            "Clinic",
            AccessCode::parse("ABCD2345").unwrap(),
        ))
        .unwrap();
        let service = MembershipService::new(dir.clone(), PrivilegePolicy::default());
        (dir, service)
    }

    fn org_admin() -> RoleState {
        RoleState {
            is_admin: true,
            is_org_admin: true,
            organization_id: Some(OrganizationId::new(7)),
            is_org_approved: true,
            ..RoleState::restricted()
        }
    }

    fn root() -> RoleState {
        PrivilegePolicy::default().bypass_state()
    }

    #[tokio::test]
    async fn super_admin_lists_everyone_with_privileged_label() {
        let (_dir, service) = service();
        let users = service.list_users(&root()).await.unwrap();
        assert_eq!(users.len(), 5);

        let privileged = users.iter().find(|u| u.email.as_str() == PRIVILEGED_EMAIL).unwrap();
        assert_eq!(privileged.role, Some(Role::SuperAdmin));
    }

    #[tokio::test]
    async fn org_admin_lists_only_own_organization() {
        let (_dir, service) = service();
        let users = service.list_users(&org_admin()).await.unwrap();
        let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["8", "42"]);
    }

    #[tokio::test]
    async fn org_admin_approves_own_member() {
        let (dir, service) = service();
        let user = UserId::new("42");

        service.approve(&org_admin(), &user).await.unwrap();

        let row = dir
            .get_user(&user)
            .await
            .unwrap()
            .unwrap();
        assert!(row.organization_approved);
    }

    #[tokio::test]
    async fn org_admin_cannot_approve_other_organization() {
        let (_dir, service) = service();
        let err = service.approve(&org_admin(), &UserId::new("9")).await.unwrap_err();
        assert!(matches!(err, MembershipError::Forbidden(_)));
    }

    #[tokio::test]
    async fn approving_unknown_user_is_not_found() {
        let (_dir, service) = service();
        let err = service.approve(&root(), &UserId::new("ghost")).await.unwrap_err();
        assert_eq!(err, MembershipError::NotFound(UserId::new("ghost")));
    }

    #[tokio::test]
    async fn org_admin_adds_unassigned_user_unapproved() {
        let (_dir, service) = service();
        let user = UserId::new("10");
        let own = Some(OrganizationId::new(7));

        assert!(service.assign_organization(&org_admin(), &user, own, true).await.is_err());
        service.assign_organization(&org_admin(), &user, own, false).await.unwrap();

        let err = service
            .assign_organization(&org_admin(), &UserId::new("9"), own, false)
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Forbidden(_)));
    }

    #[tokio::test]
    async fn only_super_admin_sets_roles() {
        let (_dir, service) = service();
        let user = UserId::new("42");

        assert!(service.set_role(&org_admin(), &user, Role::OrgAdmin).await.is_err());
        service.set_role(&root(), &user, Role::OrgAdmin).await.unwrap();

        let users = service.list_users(&root()).await.unwrap();
        let promoted = users.iter().find(|u| u.id == user).unwrap();
        assert_eq!(promoted.role, Some(Role::OrgAdmin));
    }

    #[tokio::test]
    async fn join_with_valid_code_starts_unapproved() {
        let (dir, service) = service();
        let user = UserId::new("10");
        let seven = OrganizationId::new(7);

        let plan = service
            .join_organization(&user, seven, &AccessCode::parse("abcd2345").unwrap())
            .await
            .unwrap();
        assert_eq!(plan, JoinPlan::Assign);

        let row = dir.get_user(&user).await.unwrap().unwrap();
        assert_eq!(row.organization_id, Some(seven));
        assert!(!row.organization_approved);
    }

    #[tokio::test]
    async fn join_with_wrong_code_changes_nothing() {
        let (dir, service) = service();
        let user = UserId::new("10");

        let err = service
            .join_organization(&user, OrganizationId::new(7), &AccessCode::parse("WXYZ6789").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, MembershipError::InvalidAccessCode);

        let err = service
            .join_organization(&user, OrganizationId::new(3), &AccessCode::parse("ABCD2345").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err, MembershipError::InvalidAccessCode);

        assert_eq!(dir.get_user(&user).await.unwrap().unwrap().organization_id, None);
    }

    #[tokio::test]
    async fn rejoining_keeps_approval() {
        let (dir, service) = service();
        let lead = UserId::new("8");

        let plan = service
            .join_organization(&lead, OrganizationId::new(7), &AccessCode::parse("ABCD2345").unwrap())
            .await
            .unwrap();
        assert_eq!(plan, JoinPlan::AlreadyMember);
        assert!(dir.get_user(&lead).await.unwrap().unwrap().organization_approved);
    }

    #[tokio::test]
    async fn regenerated_code_replaces_the_old_one() {
        let (dir, service) = service();
        let seven = OrganizationId::new(7);
        let old = AccessCode::parse("ABCD2345").unwrap();

        let fresh = service.regenerate_access_code(&org_admin(), seven).await.unwrap();

        assert!(dir.verify_access_code(seven, &fresh).await.unwrap());
        assert_eq!(dir.verify_access_code(seven, &old).await.unwrap(), fresh == old);

        assert!(matches!(
            service.regenerate_access_code(&org_admin(), OrganizationId::new(3)).await,
            Err(MembershipError::Forbidden(_))
        ));
        assert_eq!(
            service.regenerate_access_code(&root(), OrganizationId::new(3)).await,
            Err(MembershipError::OrganizationNotFound(OrganizationId::new(3)))
        );
    }
}
