//! Organization access codes: the shared secret a user presents to join an
//! organization.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Unambiguous alphabet (no `0`/`O`, no `1`/`I`).
pub const ACCESS_CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const ACCESS_CODE_LEN: usize = 8;

/// Eight characters from [`ACCESS_CODE_ALPHABET`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessCode(String);

impl AccessCode {
    /// Fresh random code.
    pub fn generate() -> Self {
        // Bytes 6 and 8 of a v4 UUID carry version/variant bits.
        let bytes = Uuid::new_v4().into_bytes();
        let code = [0, 1, 2, 3, 4, 5, 10, 11]
            .iter()
            .map(|&i| ACCESS_CODE_ALPHABET[(bytes[i] % 32) as usize] as char)
            .collect();
        Self(code)
    }

    /// Parse user input. Case-insensitive; surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let code = raw.trim().to_ascii_uppercase();
        let valid = code.len() == ACCESS_CODE_LEN
            && code.bytes().all(|b| ACCESS_CODE_ALPHABET.contains(&b));
        if valid {
            Ok(Self(code))
        } else {
            Err(DomainError::validation("access code must be 8 characters from the code alphabet"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Codes are secrets; keep them out of `{:?}` output such as tracing fields.
impl core::fmt::Debug for AccessCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("AccessCode(****)")
    }
}

impl FromStr for AccessCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccessCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccessCode> for String {
    fn from(value: AccessCode) -> Self {
        value.0
    }
}
