//! One-time password challenges gating customer money movement.

pub mod challenge;
pub mod delivery;
pub mod error;
pub mod store;

pub use challenge::{IssuedOtp, OtpChallenge, OtpClaims};
pub use delivery::{LogDelivery, OtpDelivery};
pub use error::OtpError;
pub use store::{MemoryUsedTokens, PgUsedTokens, UsedTokenStore};

use std::sync::Arc;

/// Challenge plus delivery: what request/verify endpoints talk to.
pub struct OtpService {
    challenge: OtpChallenge,
    delivery: Arc<dyn OtpDelivery>,
}

impl OtpService {
    pub fn new(challenge: OtpChallenge, delivery: Arc<dyn OtpDelivery>) -> Self {
        Self { challenge, delivery }
    }

    pub fn challenge(&self) -> &OtpChallenge {
        &self.challenge
    }

    /// Issue a challenge for `user_id`, send the code, return the token.
    pub async fn request(&self, user_id: i64, purpose: &str) -> Result<IssuedOtp, OtpError> {
        let issued = self.challenge.issue(user_id)?;
        self.delivery
            .deliver(user_id, &issued.code, purpose)
            .await
            .map_err(|e| OtpError::Issue(e.to_string()))?;
        Ok(issued)
    }

    pub async fn verify(&self, code: &str, token: &str, user_id: i64) -> Result<(), OtpError> {
        self.challenge.verify(code, token, user_id).await
    }

    pub async fn purge_expired(&self, now_ms: i64) -> Result<usize, OtpError> {
        self.challenge.used_tokens().purge_expired(now_ms).await
    }
}
