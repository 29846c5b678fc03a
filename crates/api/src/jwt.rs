use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use booksmartly_auth::{JwtValidator, SessionClaims, TokenValidationError, validate_claims};

/// HS256 bearer-token validator.
///
/// `jsonwebtoken` checks the signature only; the time window is checked by
/// [`validate_claims`] against the caller's clock.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenValidationError> {
        let data = decode::<SessionClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header, encode};

    use booksmartly_core::{Email, UserId};

    use super::*;

    fn mint(secret: &str, claims: &SessionClaims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(now: DateTime<Utc>) -> SessionClaims {
        SessionClaims {
            sub: UserId::new("42"),
            email: Email::new("user@x.com"),
            issued_at: now - Duration::minutes(1),
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn accepts_correctly_signed_token() {
        let now = Utc::now();
        let token = mint("secret", &claims(now));
        let validator = Hs256JwtValidator::new(b"secret");

        let decoded = validator.validate(&token, now).unwrap();
        assert_eq!(decoded.sub, UserId::new("42"));
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now();
        let token = mint("other", &claims(now));
        let validator = Hs256JwtValidator::new(b"secret");

        assert!(matches!(
            validator.validate(&token, now),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let now = Utc::now();
        let token = mint("secret", &claims(now));
        let validator = Hs256JwtValidator::new(b"secret");

        assert_eq!(
            validator.validate(&token, now + Duration::hours(1)),
            Err(TokenValidationError::Expired)
        );
    }
}
