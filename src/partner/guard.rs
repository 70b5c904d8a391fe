//! Inbound guard for partner envelopes.
//!
//! Stages, in order:
//!
//! ```text
//! Received -> Decrypted -> FreshnessChecked -> IntegrityChecked -> SignatureChecked -> Authorized
//! ```
//!
//! Any stage failing rejects the request. Registration of the sending bank
//! is checked as part of `Decrypted`, since the bank code is inside the
//! encrypted payload.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Duration;

use super::dto::{PartnerPayload, SignaturePolicy};
use super::error::GuardError;
use super::replay::ReplayCache;
use crate::crypto::{CryptoEnvelope, EnvelopeHeader, PartnerEnvelope, is_fresh_at, now_ms};
use crate::logging::AUDIT_TARGET;

pub const MAX_ENVELOPE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStage {
    Received,
    Decrypted,
    FreshnessChecked,
    IntegrityChecked,
    SignatureChecked,
    Authorized,
}

/// A payload that passed every guard stage.
#[derive(Debug, Clone)]
pub struct Verified<T> {
    pub payload: T,
    pub bank_code: String,
    pub header: EnvelopeHeader,
    pub integrity: String,
    pub signature: Option<String>,
}

pub struct InboundGuard {
    crypto: Arc<CryptoEnvelope>,
    replay: ReplayCache,
    freshness_window_ms: i64,
    request_timeout: Duration,
}

impl InboundGuard {
    pub fn new(crypto: Arc<CryptoEnvelope>, freshness_window_ms: i64, request_timeout: Duration) -> Self {
        Self {
            crypto,
            replay: ReplayCache::new(),
            freshness_window_ms,
            request_timeout,
        }
    }

    pub fn replay_cache(&self) -> &ReplayCache {
        &self.replay
    }

    pub fn authorize<T: PartnerPayload>(&self, envelope: &PartnerEnvelope) -> Result<Verified<T>, GuardError> {
        self.authorize_at(envelope, now_ms())
    }

    /// Run all stages against an explicit clock reading.
    pub fn authorize_at<T: PartnerPayload>(
        &self,
        envelope: &PartnerEnvelope,
        now: i64,
    ) -> Result<Verified<T>, GuardError> {
        let mut stage = GuardStage::Received;
        let result = self.run_stages::<T>(envelope, now, &mut stage);
        match &result {
            Ok(v) => {
                tracing::info!(
                    target: AUDIT_TARGET,
                    bank = %v.bank_code,
                    timestamp = v.header.timestamp,
                    "Partner envelope authorized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    target: AUDIT_TARGET,
                    failed_after = ?stage,
                    code = e.code(),
                    reason = %e,
                    timestamp = envelope.header.timestamp,
                    "Partner envelope rejected"
                );
            }
        }
        result
    }

    fn run_stages<T: PartnerPayload>(
        &self,
        envelope: &PartnerEnvelope,
        now: i64,
        stage: &mut GuardStage,
    ) -> Result<Verified<T>, GuardError> {
        let header = envelope
            .header
            .parse()
            .map_err(|e| GuardError::UnsupportedMethod(e.to_string()))?;

        let plaintext = self
            .crypto
            .decrypt(&envelope.encrypted_payload, header.encryption_method)
            .map_err(|_| GuardError::DecryptionFailed)?;
        let payload: T = serde_json::from_slice(&plaintext).map_err(|_| GuardError::MalformedPayload)?;
        let bank_code = payload.sender_bank_code().to_string();
        if !self.crypto.keys().is_registered(&bank_code) {
            return Err(GuardError::UnknownBank(bank_code));
        }
        *stage = GuardStage::Decrypted;

        if !is_fresh_at(now, header.timestamp, self.freshness_window_ms) {
            return Err(GuardError::StaleRequest(header.timestamp));
        }
        *stage = GuardStage::FreshnessChecked;

        let input = header.signing_input(&plaintext);
        if !self
            .crypto
            .verify_hash(&input, header.hash_method, &envelope.integrity)
        {
            return Err(GuardError::IntegrityMismatch);
        }
        *stage = GuardStage::IntegrityChecked;

        match (&envelope.signature, T::SIGNATURE_POLICY) {
            (Some(sig), _) => {
                if !self
                    .crypto
                    .verify_signature(&input, sig, &bank_code, header.encryption_method)
                {
                    return Err(GuardError::SignatureInvalid);
                }
            }
            (None, SignaturePolicy::Required) => return Err(GuardError::SignatureMissing),
            (None, SignaturePolicy::IntegrityOnly) => {}
        }
        *stage = GuardStage::SignatureChecked;

        // Hex decoding ignores case; one digest has exactly one cache key
        let integrity = envelope.integrity.to_ascii_lowercase();
        let expires = header.timestamp.saturating_add(self.freshness_window_ms);
        if !self.replay.check_and_insert(&integrity, expires, now) {
            return Err(GuardError::Replayed);
        }
        *stage = GuardStage::Authorized;

        Ok(Verified {
            payload,
            bank_code,
            header,
            integrity,
            signature: envelope.signature.clone(),
        })
    }
}

/// Axum middleware guarding one partner route.
///
/// Consumes the body, runs the guard for payload type `T`, and hands the
/// handler an `Extension<Verified<T>>`. The handler runs under the
/// configured request timeout.
pub async fn partner_guard<T: PartnerPayload>(
    State(guard): State<Arc<InboundGuard>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, GuardError> {
    let (mut parts, body) = request.into_parts();

    let bytes = axum::body::to_bytes(body, MAX_ENVELOPE_BYTES)
        .await
        .map_err(|_| GuardError::MalformedEnvelope)?;
    let envelope: PartnerEnvelope =
        serde_json::from_slice(&bytes).map_err(|_| GuardError::MalformedEnvelope)?;

    // RSA decryption is CPU bound
    let worker = guard.clone();
    let verified = tokio::task::spawn_blocking(move || worker.authorize::<T>(&envelope))
        .await
        .map_err(|e| GuardError::Internal(e.to_string()))??;

    parts.extensions.insert(verified);
    let request = Request::from_parts(parts, Body::empty());

    match tokio::time::timeout(guard.request_timeout, next.run(request)).await {
        Ok(response) => Ok(response),
        Err(_) => {
            tracing::error!(target: AUDIT_TARGET, "Partner request exceeded processing timeout");
            Err(GuardError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;
    use crate::crypto::{EncryptionMethod, HashMethod, WireHeader};
    use crate::keys::{KeyRegistry, PrivateKey, PublicKey};
    use crate::partner::dto::{AccountInfoRequest, TransactionPayload};
    use crate::ledger::FeePayer;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use rust_decimal::Decimal;

    const WINDOW: i64 = 30_000;

    struct Fixture {
        guard: InboundGuard,
        sender: CryptoEnvelope,
    }

    /// "Bank A" runs the guard; "Bank B" sends.
    fn fixture() -> Fixture {
        let a = SigningKey::generate(&mut OsRng);
        let b = SigningKey::generate(&mut OsRng);
        let secret = Secret::new("integrity");
        let reg_a = KeyRegistry::builder("Bank A")
            .own_key(PrivateKey::Ed25519(a.clone()))
            .partner_key("Bank B", PublicKey::Ed25519(b.verifying_key()))
            .build();
        let reg_b = KeyRegistry::builder("Bank B")
            .own_key(PrivateKey::Ed25519(b))
            .partner_key("Bank A", PublicKey::Ed25519(a.verifying_key()))
            .build();
        Fixture {
            guard: InboundGuard::new(
                Arc::new(CryptoEnvelope::new(Arc::new(reg_a), secret.clone())),
                WINDOW,
                Duration::from_secs(5),
            ),
            sender: CryptoEnvelope::new(Arc::new(reg_b), secret),
        }
    }

    fn payload(bank: &str) -> TransactionPayload {
        TransactionPayload {
            from_bank_code: bank.into(),
            from_account_number: "B-1".into(),
            to_bank_account_number: "A-1".into(),
            amount: Decimal::from(100),
            message: "hi".into(),
            fee_payer: FeePayer::Source,
            fee_amount: Decimal::ZERO,
            idempotency_key: None,
        }
    }

    fn seal(f: &Fixture, p: &TransactionPayload, ts: i64) -> PartnerEnvelope {
        f.sender
            .seal(p, "Bank A", EncryptionMethod::Ed25519, HashMethod::Sha256, ts)
            .unwrap()
    }

    #[test]
    fn test_valid_envelope_authorized() {
        let f = fixture();
        let now = now_ms();
        let env = seal(&f, &payload("Bank B"), now - 1_000);
        let v: Verified<TransactionPayload> = f.guard.authorize_at(&env, now).unwrap();
        assert_eq!(v.bank_code, "Bank B");
        assert_eq!(v.payload.amount, Decimal::from(100));
        assert!(v.signature.is_some());
    }

    #[test]
    fn test_tampered_integrity_rejected() {
        let f = fixture();
        let now = now_ms();
        let mut env = seal(&f, &payload("Bank B"), now);
        let mut digest = hex::decode(&env.integrity).unwrap();
        digest[0] ^= 0x01;
        env.integrity = hex::encode(digest);
        assert_eq!(
            f.guard.authorize_at::<TransactionPayload>(&env, now).unwrap_err(),
            GuardError::IntegrityMismatch
        );
    }

    #[test]
    fn test_tampered_timestamp_breaks_integrity() {
        let f = fixture();
        let now = now_ms();
        let mut env = seal(&f, &payload("Bank B"), now - 5_000);
        env.header.timestamp = now;
        assert_eq!(
            f.guard.authorize_at::<TransactionPayload>(&env, now).unwrap_err(),
            GuardError::IntegrityMismatch
        );
    }

    #[test]
    fn test_stale_envelope_rejected() {
        let f = fixture();
        let now = now_ms();
        let env = seal(&f, &payload("Bank B"), now - WINDOW - 1);
        assert!(matches!(
            f.guard.authorize_at::<TransactionPayload>(&env, now),
            Err(GuardError::StaleRequest(_))
        ));
        let future = seal(&f, &payload("Bank B"), now + 10);
        assert!(matches!(
            f.guard.authorize_at::<TransactionPayload>(&future, now),
            Err(GuardError::StaleRequest(_))
        ));
    }

    #[test]
    fn test_unregistered_bank_rejected() {
        let f = fixture();
        let now = now_ms();
        let env = seal(&f, &payload("Bank Z"), now);
        assert_eq!(
            f.guard.authorize_at::<TransactionPayload>(&env, now).unwrap_err(),
            GuardError::UnknownBank("Bank Z".into())
        );
    }

    #[test]
    fn test_unknown_method_fails_closed() {
        let f = fixture();
        let now = now_ms();
        let mut env = seal(&f, &payload("Bank B"), now);
        env.header = WireHeader {
            encryption_method: "PGP".into(),
            ..env.header
        };
        assert!(matches!(
            f.guard.authorize_at::<TransactionPayload>(&env, now),
            Err(GuardError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn test_missing_signature_depends_on_policy() {
        let f = fixture();
        let now = now_ms();

        let mut tx_env = seal(&f, &payload("Bank B"), now);
        tx_env.signature = None;
        assert_eq!(
            f.guard.authorize_at::<TransactionPayload>(&tx_env, now).unwrap_err(),
            GuardError::SignatureMissing
        );

        let info = AccountInfoRequest {
            from_bank_code: "Bank B".into(),
            account_number: "A-1".into(),
        };
        let mut info_env = f
            .sender
            .seal(&info, "Bank A", EncryptionMethod::Ed25519, HashMethod::Sha256, now)
            .unwrap();
        info_env.signature = None;
        assert!(f.guard.authorize_at::<AccountInfoRequest>(&info_env, now).is_ok());
    }

    #[test]
    fn test_bad_signature_rejected_even_when_optional() {
        let f = fixture();
        let now = now_ms();
        let info = AccountInfoRequest {
            from_bank_code: "Bank B".into(),
            account_number: "A-1".into(),
        };
        let mut env = f
            .sender
            .seal(&info, "Bank A", EncryptionMethod::Ed25519, HashMethod::Sha256, now)
            .unwrap();
        env.signature = Some("00".repeat(64));
        assert_eq!(
            f.guard.authorize_at::<AccountInfoRequest>(&env, now).unwrap_err(),
            GuardError::SignatureInvalid
        );
    }

    #[test]
    fn test_replayed_envelope_rejected() {
        let f = fixture();
        let now = now_ms();
        let env = seal(&f, &payload("Bank B"), now);
        assert!(f.guard.authorize_at::<TransactionPayload>(&env, now).is_ok());
        assert_eq!(
            f.guard.authorize_at::<TransactionPayload>(&env, now + 1).unwrap_err(),
            GuardError::Replayed
        );
    }

    #[test]
    fn test_replay_with_recased_digest_rejected() {
        let f = fixture();
        let now = now_ms();
        let env = seal(&f, &payload("Bank B"), now);
        let v = f.guard.authorize_at::<TransactionPayload>(&env, now).unwrap();
        assert_eq!(v.integrity, env.integrity.to_ascii_lowercase());

        let mut upper = env.clone();
        upper.integrity = env.integrity.to_ascii_uppercase();
        assert_ne!(upper.integrity, env.integrity);
        assert_eq!(
            f.guard.authorize_at::<TransactionPayload>(&upper, now + 1).unwrap_err(),
            GuardError::Replayed
        );
    }

    #[test]
    fn test_garbage_ciphertext_rejected() {
        let f = fixture();
        let now = now_ms();
        let mut env = seal(&f, &payload("Bank B"), now);
        env.encrypted_payload = "AAAA".into();
        assert_eq!(
            f.guard.authorize_at::<TransactionPayload>(&env, now).unwrap_err(),
            GuardError::DecryptionFailed
        );
    }
}
