//! `booksmartly-core`: identity primitives shared by every crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod access_code;
pub mod error;
pub mod id;

pub use access_code::AccessCode;
pub use error::{DomainError, DomainResult};
pub use id::{Email, OrganizationId, UserId};
