use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use booksmartly_auth::{
    Approval, ApprovalLookup, LookupError, MembershipScope, Role, RoleFlags, RoleLookup,
    RoleLookupResult,
};
use booksmartly_core::{AccessCode, OrganizationId, UserId};

use super::{DirectoryError, DirectoryOrganization, DirectoryUser, UserDirectory};

/// In-memory directory for tests/dev.
///
/// `set_unavailable(true)` makes every call fail, to exercise fail-closed
/// paths.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<UserId, DirectoryUser>>,
    organizations: RwLock<HashMap<OrganizationId, DirectoryOrganization>>,
    unavailable: AtomicBool,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_user(&self, user: DirectoryUser) -> Result<(), DirectoryError> {
        let mut users = self.users.write().map_err(|_| DirectoryError::Unavailable)?;
        users.insert(user.id.clone(), user);
        Ok(())
    }

    pub fn upsert_organization(&self, organization: DirectoryOrganization) -> Result<(), DirectoryError> {
        let mut organizations = self
            .organizations
            .write()
            .map_err(|_| DirectoryError::Unavailable)?;
        organizations.insert(organization.id, organization);
        Ok(())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DirectoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(DirectoryError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn update<F>(&self, user_id: &UserId, f: F) -> Result<(), DirectoryError>
    where
        F: FnOnce(&mut DirectoryUser),
    {
        self.check_available()?;
        let mut users = self.users.write().map_err(|_| DirectoryError::Unavailable)?;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| DirectoryError::NotFound(user_id.clone()))?;
        f(user);
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<DirectoryUser>, DirectoryError> {
        self.check_available()?;
        let users = self.users.read().map_err(|_| DirectoryError::Unavailable)?;
        Ok(users.get(user_id).cloned())
    }

    async fn list_users(&self, scope: MembershipScope) -> Result<Vec<DirectoryUser>, DirectoryError> {
        self.check_available()?;
        let mut users: Vec<DirectoryUser> = self
            .users
            .read()
            .map_err(|_| DirectoryError::Unavailable)?
            .values()
            .filter(|u| scope.admits(u.organization_id))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.as_str().cmp(b.email.as_str()));
        Ok(users)
    }

    async fn set_role(&self, user_id: &UserId, role: Role) -> Result<(), DirectoryError> {
        self.update(user_id, |u| u.role = Some(role))
    }

    async fn set_organization(
        &self,
        user_id: &UserId,
        organization_id: Option<OrganizationId>,
        approved: bool,
    ) -> Result<(), DirectoryError> {
        self.update(user_id, |u| {
            u.organization_id = organization_id;
            u.organization_approved = approved;
        })
    }

    async fn approve(&self, user_id: &UserId) -> Result<(), DirectoryError> {
        self.update(user_id, |u| u.organization_approved = true)
    }

    async fn verify_access_code(
        &self,
        organization_id: OrganizationId,
        code: &AccessCode,
    ) -> Result<bool, DirectoryError> {
        self.check_available()?;
        let organizations = self
            .organizations
            .read()
            .map_err(|_| DirectoryError::Unavailable)?;
        Ok(organizations
            .get(&organization_id)
            .is_some_and(|org| &org.access_code == code))
    }

    async fn set_access_code(
        &self,
        organization_id: OrganizationId,
        code: &AccessCode,
    ) -> Result<(), DirectoryError> {
        self.check_available()?;
        let mut organizations = self
            .organizations
            .write()
            .map_err(|_| DirectoryError::Unavailable)?;
        let org = organizations
            .get_mut(&organization_id)
            .ok_or(DirectoryError::OrganizationNotFound(organization_id))?;
        org.access_code = code.clone();
        org.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl RoleLookup for InMemoryDirectory {
    async fn check_admin_status(&self, user_id: &UserId) -> Result<RoleLookupResult, LookupError> {
        let Some(user) = self.get_user(user_id).await? else {
            return Ok(RoleLookupResult::default());
        };
        let flags = RoleFlags::from_role(user.role);
        Ok(RoleLookupResult {
            is_admin: flags.is_admin,
            is_super_admin: flags.is_super_admin,
            is_org_admin: flags.is_org_admin,
            organization_id: user.organization_id,
        })
    }
}

#[async_trait]
impl ApprovalLookup for InMemoryDirectory {
    async fn get_approval(&self, user_id: &UserId) -> Result<Option<Approval>, LookupError> {
        let user = self.get_user(user_id).await?;
        Ok(user.map(|u| Approval {
            organization_approved: u.organization_approved,
        }))
    }
}
