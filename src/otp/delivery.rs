use async_trait::async_trait;

use crate::logging::AUDIT_TARGET;

/// Out-of-band channel for the plaintext code (mail, SMS, ...).
#[async_trait]
pub trait OtpDelivery: Send + Sync {
    async fn deliver(&self, user_id: i64, code: &str, purpose: &str) -> anyhow::Result<()>;
}

/// Records that a code was sent without recording the code.
pub struct LogDelivery;

#[async_trait]
impl OtpDelivery for LogDelivery {
    async fn deliver(&self, user_id: i64, code: &str, purpose: &str) -> anyhow::Result<()> {
        tracing::info!(
            target: AUDIT_TARGET,
            user_id,
            purpose,
            digits = code.len(),
            "OTP code dispatched"
        );
        Ok(())
    }
}
