//! Partner envelope format and the operations that produce and check it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::CryptoError;
use super::methods::{EncryptionMethod, HashMethod};
use super::{digest, ed25519_scheme, rsa_scheme};
use crate::config::Secret;
use crate::keys::{KeyRegistry, PrivateKey, PublicKey};

/// Header exactly as it travels; method tags are parsed separately so an
/// unknown tag surfaces as `UnsupportedMethod` instead of a JSON error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WireHeader {
    pub hash_method: String,
    pub encryption_method: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub hash_method: HashMethod,
    pub encryption_method: EncryptionMethod,
    pub timestamp: i64,
}

impl WireHeader {
    pub fn parse(&self) -> Result<EnvelopeHeader, CryptoError> {
        Ok(EnvelopeHeader {
            hash_method: self.hash_method.parse()?,
            encryption_method: self.encryption_method.parse()?,
            timestamp: self.timestamp,
        })
    }
}

impl From<EnvelopeHeader> for WireHeader {
    fn from(h: EnvelopeHeader) -> Self {
        WireHeader {
            hash_method: h.hash_method.to_string(),
            encryption_method: h.encryption_method.to_string(),
            timestamp: h.timestamp,
        }
    }
}

impl EnvelopeHeader {
    /// Bytes covered by both the integrity digest and the signature:
    /// `"<hash>|<encryption>|<timestamp>\n" || plaintext`.
    pub fn signing_input(&self, plaintext: &[u8]) -> Vec<u8> {
        let prefix = format!(
            "{}|{}|{}\n",
            self.hash_method, self.encryption_method, self.timestamp
        );
        let mut out = Vec::with_capacity(prefix.len() + plaintext.len());
        out.extend_from_slice(prefix.as_bytes());
        out.extend_from_slice(plaintext);
        out
    }
}

/// Request and response body exchanged between banks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartnerEnvelope {
    pub header: WireHeader,
    pub encrypted_payload: String,
    pub integrity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Encrypt, digest and sign on behalf of this bank.
pub struct CryptoEnvelope {
    keys: Arc<KeyRegistry>,
    integrity_secret: Secret,
}

impl CryptoEnvelope {
    pub fn new(keys: Arc<KeyRegistry>, integrity_secret: Secret) -> Self {
        Self {
            keys,
            integrity_secret,
        }
    }

    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    /// Encrypt for a registered partner; result is base64.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        recipient_bank_code: &str,
        method: EncryptionMethod,
    ) -> Result<String, CryptoError> {
        let raw = match self.keys.public_key(recipient_bank_code, method)? {
            PublicKey::Rsa(k) => rsa_scheme::encrypt(k, plaintext)?,
            PublicKey::Ed25519(k) => ed25519_scheme::encrypt(k, plaintext)?,
        };
        Ok(BASE64.encode(raw))
    }

    /// Decrypt a base64 ciphertext addressed to this bank.
    pub fn decrypt(&self, ciphertext: &str, method: EncryptionMethod) -> Result<Vec<u8>, CryptoError> {
        let raw = BASE64
            .decode(ciphertext.trim())
            .map_err(|_| CryptoError::DecryptionFailed)?;
        match self.keys.own_private_key(method)? {
            PrivateKey::Rsa(k) => rsa_scheme::decrypt(k, &raw),
            PrivateKey::Ed25519(k) => ed25519_scheme::decrypt(k, &raw),
        }
    }

    pub fn hash(&self, data: &[u8], method: HashMethod) -> String {
        digest::hash(method, data, self.integrity_secret.expose().as_bytes())
    }

    pub fn verify_hash(&self, data: &[u8], method: HashMethod, digest_hex: &str) -> bool {
        digest::verify_hash(
            method,
            data,
            self.integrity_secret.expose().as_bytes(),
            digest_hex,
        )
    }

    /// Sign with this bank's private key; result is hex.
    pub fn sign(&self, data: &[u8], method: EncryptionMethod) -> Result<String, CryptoError> {
        let raw = match self.keys.own_private_key(method)? {
            PrivateKey::Rsa(k) => rsa_scheme::sign(k, data)?,
            PrivateKey::Ed25519(k) => ed25519_scheme::sign(k, data),
        };
        Ok(hex::encode(raw))
    }

    /// Unknown bank, missing key and malformed hex all verify as `false`.
    pub fn verify_signature(
        &self,
        data: &[u8],
        signature_hex: &str,
        bank_code: &str,
        method: EncryptionMethod,
    ) -> bool {
        let Ok(signature) = hex::decode(signature_hex.trim()) else {
            return false;
        };
        match self.keys.public_key(bank_code, method) {
            Ok(PublicKey::Rsa(k)) => rsa_scheme::verify(k, data, &signature),
            Ok(PublicKey::Ed25519(k)) => ed25519_scheme::verify(k, data, &signature),
            Err(_) => false,
        }
    }

    /// Build an envelope for `recipient`: digest, sign, then encrypt.
    pub fn seal<T: Serialize>(
        &self,
        payload: &T,
        recipient: &str,
        method: EncryptionMethod,
        hash_method: HashMethod,
        timestamp: i64,
    ) -> Result<PartnerEnvelope, CryptoError> {
        let header = EnvelopeHeader {
            hash_method,
            encryption_method: method,
            timestamp,
        };
        let plaintext = serde_json::to_vec(payload).map_err(|_| CryptoError::EncryptionFailed)?;
        let input = header.signing_input(&plaintext);

        let integrity = self.hash(&input, hash_method);
        let signature = self.sign(&input, method)?;
        let encrypted_payload = self.encrypt(&plaintext, recipient, method)?;

        Ok(PartnerEnvelope {
            header: header.into(),
            encrypted_payload,
            integrity,
            signature: Some(signature),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rsa_scheme::test_keys;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    /// Two envelopes that know each other's public keys.
    fn ed_pair() -> (CryptoEnvelope, CryptoEnvelope) {
        let a = SigningKey::generate(&mut OsRng);
        let b = SigningKey::generate(&mut OsRng);
        let secret = Secret::new("shared-secret");
        let reg_a = KeyRegistry::builder("Bank A")
            .own_key(PrivateKey::Ed25519(a.clone()))
            .partner_key("Bank B", PublicKey::Ed25519(b.verifying_key()))
            .build();
        let reg_b = KeyRegistry::builder("Bank B")
            .own_key(PrivateKey::Ed25519(b))
            .partner_key("Bank A", PublicKey::Ed25519(a.verifying_key()))
            .build();
        (
            CryptoEnvelope::new(Arc::new(reg_a), secret.clone()),
            CryptoEnvelope::new(Arc::new(reg_b), secret),
        )
    }

    fn rsa_pair() -> (CryptoEnvelope, CryptoEnvelope) {
        let (a, b) = test_keys::pair();
        let secret = Secret::new("shared-secret");
        let reg_a = KeyRegistry::builder("Bank A")
            .own_key(PrivateKey::Rsa(Box::new(a.clone())))
            .partner_key("Bank B", PrivateKey::Rsa(Box::new(b.clone())).public_key())
            .build();
        let reg_b = KeyRegistry::builder("Bank B")
            .own_key(PrivateKey::Rsa(Box::new(b.clone())))
            .partner_key("Bank A", PrivateKey::Rsa(Box::new(a.clone())).public_key())
            .build();
        (
            CryptoEnvelope::new(Arc::new(reg_a), secret.clone()),
            CryptoEnvelope::new(Arc::new(reg_b), secret),
        )
    }

    #[test]
    fn test_encrypt_decrypt_across_banks() {
        for (a, b, method) in [
            {
                let (a, b) = ed_pair();
                (a, b, EncryptionMethod::Ed25519)
            },
            {
                let (a, b) = rsa_pair();
                (a, b, EncryptionMethod::Rsa)
            },
        ] {
            let ct = a.encrypt(b"{\"amount\":\"100\"}", "Bank B", method).unwrap();
            assert_eq!(b.decrypt(&ct, method).unwrap(), b"{\"amount\":\"100\"}");
            // sender cannot read what it sent
            assert!(a.decrypt(&ct, method).is_err());
        }
    }

    #[test]
    fn test_encrypt_for_unregistered_bank() {
        let (a, _) = ed_pair();
        assert_eq!(
            a.encrypt(b"x", "Bank Z", EncryptionMethod::Ed25519),
            Err(CryptoError::UnknownBank("Bank Z".into()))
        );
    }

    #[test]
    fn test_decrypt_rejects_bad_base64() {
        let (_, b) = ed_pair();
        assert_eq!(
            b.decrypt("***", EncryptionMethod::Ed25519),
            Err(CryptoError::DecryptionFailed)
        );
    }

    #[test]
    fn test_signature_verifies_only_against_sender() {
        let (a, b) = rsa_pair();
        let sig = a.sign(b"data", EncryptionMethod::Rsa).unwrap();
        assert!(b.verify_signature(b"data", &sig, "Bank A", EncryptionMethod::Rsa));
        assert!(!b.verify_signature(b"datA", &sig, "Bank A", EncryptionMethod::Rsa));
        assert!(!b.verify_signature(b"data", &sig, "Bank C", EncryptionMethod::Rsa));
        assert!(!b.verify_signature(b"data", "zz", "Bank A", EncryptionMethod::Rsa));
    }

    #[test]
    fn test_seal_produces_verifiable_envelope() {
        let (a, b) = ed_pair();
        let payload = serde_json::json!({"fromBankCode": "Bank A", "amount": "10"});
        let env = a
            .seal(&payload, "Bank B", EncryptionMethod::Ed25519, HashMethod::Sha256, 1234)
            .unwrap();

        let header = env.header.parse().unwrap();
        let plaintext = b.decrypt(&env.encrypted_payload, header.encryption_method).unwrap();
        let input = header.signing_input(&plaintext);
        assert!(b.verify_hash(&input, header.hash_method, &env.integrity));
        assert!(b.verify_signature(
            &input,
            env.signature.as_deref().unwrap(),
            "Bank A",
            header.encryption_method
        ));

        // the header is covered too
        let moved = EnvelopeHeader {
            timestamp: 1235,
            ..header
        };
        assert!(!b.verify_hash(&moved.signing_input(&plaintext), header.hash_method, &env.integrity));
    }

    #[test]
    fn test_wire_header_unknown_method() {
        let wire = WireHeader {
            hash_method: "SHA256".into(),
            encryption_method: "PGP".into(),
            timestamp: 0,
        };
        assert_eq!(
            wire.parse(),
            Err(CryptoError::UnsupportedMethod("PGP".into()))
        );
        let json = serde_json::to_value(&wire).unwrap();
        assert!(json.get("hashMethod").is_some());
        assert!(json.get("encryptionMethod").is_some());
    }
}
