use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Secret;

pub const ROLE_STAFF: &str = "staff";

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Subject (customer id as string)
    pub exp: usize,  // Expiration time (as UTC timestamp)
    pub iat: usize,  // Issued at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }

    pub fn is_staff(&self) -> bool {
        self.role.as_deref() == Some(ROLE_STAFF)
    }
}

/// Verifies session tokens minted by the login service.
pub struct JwtVerifier {
    secret: Secret,
}

impl JwtVerifier {
    pub fn new(secret: Secret) -> Self {
        Self { secret }
    }

    /// Mint a token. Login lives elsewhere; this serves tooling and tests.
    pub fn issue_token(&self, user_id: i64, role: Option<&str>, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(ttl)
            .context("token expiry out of range")?
            .timestamp();

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expiration as usize,
            iat: now.timestamp() as usize,
            role: role.map(str::to_string),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.expose().as_bytes()),
        )
        .context("Failed to generate token")
    }

    /// Verify JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.secret.expose().as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(token, &decoding_key, &validation)?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let verifier = JwtVerifier::new(Secret::new("jwt"));
        let token = verifier.issue_token(5, Some(ROLE_STAFF), Duration::hours(1)).unwrap();
        let claims = verifier.verify_token(&token).unwrap();
        assert_eq!(claims.user_id(), Some(5));
        assert!(claims.is_staff());
    }

    #[test]
    fn test_expired_and_foreign_tokens_rejected() {
        let verifier = JwtVerifier::new(Secret::new("jwt"));
        let expired = verifier.issue_token(5, None, Duration::hours(-1)).unwrap();
        assert!(verifier.verify_token(&expired).is_err());

        let other = JwtVerifier::new(Secret::new("other"));
        let token = other.issue_token(5, None, Duration::hours(1)).unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }
}
