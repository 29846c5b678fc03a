//! Environment-driven configuration.

use std::net::SocketAddr;

use anyhow::Context;

use booksmartly_auth::{BYPASS_ORGANIZATION_ID, PRIVILEGED_EMAIL, PrivilegePolicy};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// `None` runs against the in-memory directory.
    pub database_url: Option<String>,
    pub privileged_email: String,
}

impl ApiConfig {
    /// Read `BIND_ADDR`, `JWT_SECRET`, `DATABASE_URL` and `PRIVILEGED_EMAIL`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address")?;

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let privileged_email = lookup("PRIVILEGED_EMAIL")
            .filter(|email| !email.trim().is_empty())
            .unwrap_or_else(|| PRIVILEGED_EMAIL.to_string());

        Ok(Self {
            bind_addr,
            jwt_secret,
            database_url,
            privileged_email,
        })
    }

    pub fn policy(&self) -> PrivilegePolicy {
        PrivilegePolicy::new(self.privileged_email.clone(), BYPASS_ORGANIZATION_ID)
    }
}
