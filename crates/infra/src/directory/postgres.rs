//! Postgres-backed user directory.
//!
//! ## Tables
//!
//! - `users`: one row per session-provider user, carrying the organization
//!   membership and its approval flag
//! - `user_roles`: at most one stored role per user
//! - `organizations`: tenant rows and their join access codes
//!
//! [`PostgresDirectory::ensure_schema`] creates all three when missing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{instrument, warn};

use booksmartly_auth::{
    Approval, ApprovalLookup, LookupError, MembershipScope, Role, RoleFlags, RoleLookup,
    RoleLookupResult,
};
use booksmartly_core::{AccessCode, Email, OrganizationId, UserId};

use super::{DirectoryError, DirectoryUser, UserDirectory};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS organizations (
    id BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    access_code TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    name TEXT,
    organization_id BIGINT,
    organization_approved BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id TEXT PRIMARY KEY REFERENCES users (id) ON DELETE CASCADE,
    role TEXT NOT NULL CHECK (role IN ('user', 'admin', 'org_admin', 'super_admin')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS users_organization_id_idx ON users (organization_id);
"#;

const SELECT_USERS: &str = r#"
SELECT
    u.id,
    u.email,
    u.name,
    u.organization_id,
    u.organization_approved,
    u.updated_at,
    r.role
FROM users u
LEFT JOIN user_roles r ON r.user_id = u.id
"#;

pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, DirectoryError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn ensure_schema(&self) -> Result<(), DirectoryError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn require_updated(user_id: &UserId, rows: u64) -> Result<(), DirectoryError> {
    if rows == 0 {
        Err(DirectoryError::NotFound(user_id.clone()))
    } else {
        Ok(())
    }
}

fn parse_role(raw: Option<String>) -> Option<Role> {
    let raw = raw?;
    match raw.parse::<Role>() {
        Ok(role) => Some(role),
        Err(e) => {
            warn!(role = %raw, error = %e, "ignoring unknown stored role");
            None
        }
    }
}

fn user_from_row(row: &PgRow) -> Result<DirectoryUser, sqlx::Error> {
    Ok(DirectoryUser {
        id: UserId::new(row.try_get::<String, _>("id")?),
        email: Email::new(row.try_get::<String, _>("email")?),
        name: row.try_get::<Option<String>, _>("name")?,
        organization_id: row
            .try_get::<Option<i64>, _>("organization_id")?
            .map(OrganizationId::new),
        organization_approved: row.try_get::<bool, _>("organization_approved")?,
        role: parse_role(row.try_get::<Option<String>, _>("role")?),
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl UserDirectory for PostgresDirectory {
    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    async fn get_user(&self, user_id: &UserId) -> Result<Option<DirectoryUser>, DirectoryError> {
        let row = sqlx::query(&format!("{SELECT_USERS} WHERE u.id = $1"))
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    #[instrument(skip(self))]
    async fn list_users(&self, scope: MembershipScope) -> Result<Vec<DirectoryUser>, DirectoryError> {
        let rows = match scope {
            MembershipScope::All => {
                sqlx::query(&format!("{SELECT_USERS} ORDER BY u.email"))
                    .fetch_all(&self.pool)
                    .await?
            }
            MembershipScope::Organization(organization_id) => {
                sqlx::query(&format!("{SELECT_USERS} WHERE u.organization_id = $1 ORDER BY u.email"))
                    .bind(organization_id.get())
                    .fetch_all(&self.pool)
                    .await?
            }
            MembershipScope::Nothing => return Ok(Vec::new()),
        };
        Ok(rows.iter().map(user_from_row).collect::<Result<_, _>>()?)
    }

    #[instrument(skip(self, user_id, role), fields(user_id = %user_id, role = %role))]
    async fn set_role(&self, user_id: &UserId, role: Role) -> Result<(), DirectoryError> {
        if self.get_user(user_id).await?.is_none() {
            return Err(DirectoryError::NotFound(user_id.clone()));
        }

        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET
                role = EXCLUDED.role,
                updated_at = NOW()
            "#,
        )
        .bind(user_id.as_str())
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    async fn set_organization(
        &self,
        user_id: &UserId,
        organization_id: Option<OrganizationId>,
        approved: bool,
    ) -> Result<(), DirectoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET organization_id = $2,
                organization_approved = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_str())
        .bind(organization_id.map(|id| id.get()))
        .bind(approved)
        .execute(&self.pool)
        .await?;
        require_updated(user_id, result.rows_affected())
    }

    #[instrument(skip(self, user_id), fields(user_id = %user_id))]
    async fn approve(&self, user_id: &UserId) -> Result<(), DirectoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET organization_approved = TRUE,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_str())
        .execute(&self.pool)
        .await?;
        require_updated(user_id, result.rows_affected())
    }

    #[instrument(skip(self, code))]
    async fn verify_access_code(
        &self,
        organization_id: OrganizationId,
        code: &AccessCode,
    ) -> Result<bool, DirectoryError> {
        let matched: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM organizations WHERE id = $1 AND access_code = $2",
        )
        .bind(organization_id.get())
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(matched.is_some())
    }

    #[instrument(skip(self, code))]
    async fn set_access_code(
        &self,
        organization_id: OrganizationId,
        code: &AccessCode,
    ) -> Result<(), DirectoryError> {
        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET access_code = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(organization_id.get())
        .bind(code.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DirectoryError::OrganizationNotFound(organization_id));
        }
        Ok(())
    }
}

#[async_trait]
impl RoleLookup for PostgresDirectory {
    async fn check_admin_status(&self, user_id: &UserId) -> Result<RoleLookupResult, LookupError> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(DirectoryError::from)?;
        let flags = RoleFlags::from_role(parse_role(role));

        // A missing organization only narrows access, so its failure is not fatal.
        let organization_id = match sqlx::query_scalar::<_, Option<i64>>(
            "SELECT organization_id FROM users WHERE id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        {
            Ok(row) => row.flatten().map(OrganizationId::new),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "organization lookup failed");
                None
            }
        };

        Ok(RoleLookupResult {
            is_admin: flags.is_admin,
            is_super_admin: flags.is_super_admin,
            is_org_admin: flags.is_org_admin,
            organization_id,
        })
    }
}

#[async_trait]
impl ApprovalLookup for PostgresDirectory {
    async fn get_approval(&self, user_id: &UserId) -> Result<Option<Approval>, LookupError> {
        let approved: Option<bool> =
            sqlx::query_scalar("SELECT organization_approved FROM users WHERE id = $1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(DirectoryError::from)?;
        Ok(approved.map(|organization_approved| Approval {
            organization_approved,
        }))
    }
}
