//! Stateless OTP challenges.
//!
//! A challenge is an HS256 token carrying keyed digests of the code and the
//! owning user plus an absolute expiry. Nothing is stored at issue time; the
//! consumed-id set and its wrong-code counters are the only server state.

use chrono::Utc;
use hmac::{Hmac, Mac};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashSet;
use std::sync::Arc;

use super::error::OtpError;
use super::store::UsedTokenStore;
use crate::config::{OtpConfig, Secret};
use crate::logging::AUDIT_TARGET;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OtpClaims {
    pub jti: String,
    /// hex HMAC over `jti:code`
    pub otp: String,
    /// hex HMAC over the user id
    pub usr: String,
    pub exp: usize,
    pub exp_ms: i64,
}

/// Freshly issued challenge. `code` goes out of band and nowhere else.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub code: String,
    pub token: String,
    pub expires_at_ms: i64,
}

pub struct OtpChallenge {
    secret: Secret,
    code_length: usize,
    expiry_ms: i64,
    max_attempts: u32,
    used: Arc<dyn UsedTokenStore>,
}

impl OtpChallenge {
    pub fn new(secret: Secret, config: &OtpConfig, used: Arc<dyn UsedTokenStore>) -> Self {
        Self {
            secret,
            code_length: config.code_length,
            expiry_ms: config.expiry_secs.saturating_mul(1000),
            max_attempts: config.max_attempts.max(1),
            used,
        }
    }

    pub fn used_tokens(&self) -> &Arc<dyn UsedTokenStore> {
        &self.used
    }

    fn mac(&self, parts: &[&[u8]]) -> Result<HmacSha256, OtpError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose().as_bytes())
            .map_err(|e| OtpError::Issue(e.to_string()))?;
        for p in parts {
            mac.update(p);
        }
        Ok(mac)
    }

    fn code_digest(&self, jti: &str, code: &str) -> Result<HmacSha256, OtpError> {
        self.mac(&[b"otp:", jti.as_bytes(), b":", code.as_bytes()])
    }

    fn user_digest(&self, user_id: i64) -> Result<HmacSha256, OtpError> {
        self.mac(&[b"usr:", user_id.to_string().as_bytes()])
    }

    fn generate_code(&self) -> String {
        let mut rng = OsRng;
        (0..self.code_length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    pub fn issue(&self, user_id: i64) -> Result<IssuedOtp, OtpError> {
        self.issue_at(user_id, Utc::now().timestamp_millis())
    }

    pub fn issue_at(&self, user_id: i64, now_ms: i64) -> Result<IssuedOtp, OtpError> {
        let code = self.generate_code();
        let jti = ulid::Ulid::new().to_string();
        let expires_at_ms = now_ms.saturating_add(self.expiry_ms);

        let claims = OtpClaims {
            otp: hex::encode(self.code_digest(&jti, &code)?.finalize().into_bytes()),
            usr: hex::encode(self.user_digest(user_id)?.finalize().into_bytes()),
            jti,
            exp: (expires_at_ms / 1000).max(0) as usize,
            exp_ms: expires_at_ms,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.expose().as_bytes()),
        )
        .map_err(|e| OtpError::Issue(e.to_string()))?;

        tracing::info!(target: AUDIT_TARGET, user_id, jti = %claims.jti, "OTP challenge issued");
        Ok(IssuedOtp {
            code,
            token,
            expires_at_ms,
        })
    }

    pub async fn verify(&self, code: &str, token: &str, user_id: i64) -> Result<(), OtpError> {
        self.verify_at(code, token, user_id, Utc::now().timestamp_millis()).await
    }

    /// Check `code` against `token` for `user_id` and consume the challenge.
    ///
    /// All checks run before a reason is picked. Precedence of reasons:
    /// already used, wrong user, expired, wrong code. The challenge is
    /// consumed after `max_attempts` wrong codes.
    pub async fn verify_at(&self, code: &str, token: &str, user_id: i64, now_ms: i64) -> Result<(), OtpError> {
        let result = self.check(code, token, user_id, now_ms).await;
        match &result {
            Ok(()) => tracing::info!(target: AUDIT_TARGET, user_id, "OTP challenge passed"),
            Err(e) => tracing::warn!(
                target: AUDIT_TARGET,
                user_id,
                reason = e.reason(),
                "OTP challenge failed"
            ),
        }
        result
    }

    async fn check(&self, code: &str, token: &str, user_id: i64, now_ms: i64) -> Result<(), OtpError> {
        let claims = self.decode(token)?;

        let used = self.used.is_used(&claims.jti).await?;
        let user_mac = self.user_digest(user_id)?;
        let user_ok = hex::decode(&claims.usr)
            .map(|d| user_mac.verify_slice(&d).is_ok())
            .unwrap_or(false);
        let fresh = now_ms <= claims.exp_ms;
        let code_mac = self.code_digest(&claims.jti, code)?;
        let code_ok = hex::decode(&claims.otp)
            .map(|d| code_mac.verify_slice(&d).is_ok())
            .unwrap_or(false);

        if used {
            return Err(OtpError::AlreadyUsed);
        }
        if !user_ok {
            return Err(OtpError::WrongUser);
        }
        if !fresh {
            return Err(OtpError::Expired);
        }
        if !code_ok {
            let attempts = self.used.record_failure(&claims.jti, claims.exp_ms).await?;
            if attempts >= self.max_attempts {
                self.used.consume(&claims.jti, claims.exp_ms).await?;
                tracing::warn!(
                    target: AUDIT_TARGET,
                    user_id,
                    jti = %claims.jti,
                    attempts,
                    "OTP challenge locked after repeated wrong codes"
                );
            }
            return Err(OtpError::InvalidCode);
        }
        if !self.used.consume(&claims.jti, claims.exp_ms).await? {
            return Err(OtpError::AlreadyUsed);
        }
        Ok(())
    }

    fn decode(&self, token: &str) -> Result<OtpClaims, OtpError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is judged against exp_ms together with the other checks
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();
        decode::<OtpClaims>(
            token,
            &DecodingKey::from_secret(self.secret.expose().as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|_| OtpError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::MemoryUsedTokens;

    const USER: i64 = 42;

    fn challenge() -> OtpChallenge {
        OtpChallenge::new(
            Secret::new("otp-secret"),
            &OtpConfig::default(),
            Arc::new(MemoryUsedTokens::new()),
        )
    }

    #[test]
    fn test_code_shape() {
        let otp = challenge();
        for _ in 0..20 {
            let issued = otp.issue(USER).unwrap();
            assert_eq!(issued.code.len(), 6);
            assert!(issued.code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_verify_once_then_already_used() {
        let otp = challenge();
        let issued = otp.issue(USER).unwrap();
        otp.verify(&issued.code, &issued.token, USER).await.unwrap();
        assert_eq!(
            otp.verify(&issued.code, &issued.token, USER).await.unwrap_err(),
            OtpError::AlreadyUsed
        );
    }

    #[tokio::test]
    async fn test_wrong_code() {
        let otp = challenge();
        let issued = otp.issue(USER).unwrap();
        let wrong = if issued.code == "000000" { "111111" } else { "000000" };
        assert_eq!(
            otp.verify(wrong, &issued.token, USER).await.unwrap_err(),
            OtpError::InvalidCode
        );
        // a failed attempt does not consume the challenge
        otp.verify(&issued.code, &issued.token, USER).await.unwrap();
    }

    #[tokio::test]
    async fn test_locked_after_max_wrong_codes() {
        let config = OtpConfig {
            max_attempts: 3,
            ..OtpConfig::default()
        };
        let otp = OtpChallenge::new(Secret::new("otp-secret"), &config, Arc::new(MemoryUsedTokens::new()));

        let issued = otp.issue(USER).unwrap();
        let wrong = if issued.code == "000000" { "111111" } else { "000000" };
        for _ in 0..2 {
            assert_eq!(otp.verify(wrong, &issued.token, USER).await.unwrap_err(), OtpError::InvalidCode);
        }
        // below the limit the right code still works
        otp.verify(&issued.code, &issued.token, USER).await.unwrap();

        let issued = otp.issue(USER).unwrap();
        let wrong = if issued.code == "000000" { "111111" } else { "000000" };
        for _ in 0..3 {
            assert_eq!(otp.verify(wrong, &issued.token, USER).await.unwrap_err(), OtpError::InvalidCode);
        }
        assert_eq!(
            otp.verify(&issued.code, &issued.token, USER).await.unwrap_err(),
            OtpError::AlreadyUsed
        );
    }

    #[tokio::test]
    async fn test_wrong_user() {
        let otp = challenge();
        let issued = otp.issue(USER).unwrap();
        assert_eq!(
            otp.verify(&issued.code, &issued.token, USER + 1).await.unwrap_err(),
            OtpError::WrongUser
        );
    }

    #[tokio::test]
    async fn test_expired() {
        let otp = challenge();
        let now = Utc::now().timestamp_millis();
        let issued = otp.issue_at(USER, now).unwrap();
        assert_eq!(issued.expires_at_ms, now + 300_000);
        assert_eq!(
            otp.verify_at(&issued.code, &issued.token, USER, now + 300_001)
                .await
                .unwrap_err(),
            OtpError::Expired
        );
        otp.verify_at(&issued.code, &issued.token, USER, now + 299_000)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_tampered_or_foreign_token() {
        let otp = challenge();
        let issued = otp.issue(USER).unwrap();
        let mut tampered = issued.token.clone();
        tampered.push('x');
        assert_eq!(
            otp.verify(&issued.code, &tampered, USER).await.unwrap_err(),
            OtpError::Malformed
        );

        let other = OtpChallenge::new(
            Secret::new("different"),
            &OtpConfig::default(),
            Arc::new(MemoryUsedTokens::new()),
        );
        assert_eq!(
            other.verify(&issued.code, &issued.token, USER).await.unwrap_err(),
            OtpError::Malformed
        );
        assert_eq!(otp.verify("1", "not-a-jwt", USER).await.unwrap_err(), OtpError::Malformed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_verify_single_success() {
        let otp = Arc::new(challenge());
        let issued = otp.issue(USER).unwrap();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let otp = otp.clone();
            let code = issued.code.clone();
            let token = issued.token.clone();
            handles.push(tokio::spawn(async move { otp.verify(&code, &token, USER).await }));
        }
        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(()) => ok += 1,
                Err(e) => assert_eq!(e, OtpError::AlreadyUsed),
            }
        }
        assert_eq!(ok, 1);
    }
}
