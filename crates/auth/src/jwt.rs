//! Bearer token verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Verifies a raw bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

/// HS256 shared-secret validator.
///
/// Claims carry RFC 3339 `issued_at` / `expires_at` instead of the registered
/// numeric `iat` / `exp`, so the library's own time checks are disabled and
/// [`validate_claims`] decides instead.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256JwtValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256JwtValidator").finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|_| TokenValidationError::Malformed)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use depot_core::{TenantId, UserId};
    use jsonwebtoken::{EncodingKey, Header, encode};

    use crate::Role;

    fn mint(secret: &str, issued_at: DateTime<Utc>) -> (JwtClaims, String) {
        let claims = JwtClaims {
            sub: UserId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::new("viewer")],
            issued_at,
            expires_at: issued_at + Duration::minutes(10),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        (claims, token)
    }

    #[test]
    fn accepts_token_signed_with_same_secret() {
        let now = Utc::now();
        let (claims, token) = mint("s3cret", now);
        let validator = Hs256JwtValidator::new("s3cret");
        assert_eq!(validator.validate(&token, now).unwrap(), claims);
    }

    #[test]
    fn rejects_wrong_secret_and_garbage() {
        let now = Utc::now();
        let (_, token) = mint("s3cret", now);
        let validator = Hs256JwtValidator::new("other");
        assert_eq!(validator.validate(&token, now), Err(TokenValidationError::Malformed));
        assert_eq!(validator.validate("not-a-jwt", now), Err(TokenValidationError::Malformed));
    }

    #[test]
    fn rejects_expired_token() {
        let now = Utc::now();
        let (_, token) = mint("s3cret", now - Duration::hours(1));
        let validator = Hs256JwtValidator::new("s3cret");
        assert_eq!(validator.validate(&token, now), Err(TokenValidationError::Expired));
    }
}
