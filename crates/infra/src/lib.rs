//! Infrastructure layer: the user directory backing role resolution.

pub mod directory;

pub use directory::{
    Directory, DirectoryError, DirectoryOrganization, DirectoryUser, InMemoryDirectory,
    PostgresDirectory, UserDirectory,
};
