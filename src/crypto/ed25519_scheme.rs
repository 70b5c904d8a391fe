//! Ed25519 signatures plus an X25519 sealed box derived from the same key.
//!
//! Ciphertext layout: `ephemeral_x25519_pub(32) || nonce || aes_gcm(body)`.
//! The symmetric key is SHA-256 over a domain tag, the shared secret, the
//! ephemeral public key and the recipient public key.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use x25519_dalek::{EphemeralSecret, PublicKey as X25519Public, StaticSecret};

use super::aead;
use super::error::CryptoError;

const SEALED_BOX_TAG: &[u8] = b"interbank-sealed-box-v1";
const X25519_LEN: usize = 32;

fn derive_key(shared: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> [u8; aead::KEY_LEN] {
    Sha256::new()
        .chain_update(SEALED_BOX_TAG)
        .chain_update(shared)
        .chain_update(ephemeral)
        .chain_update(recipient)
        .finalize()
        .into()
}

pub fn encrypt(recipient: &VerifyingKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let recipient_x = X25519Public::from(recipient.to_montgomery().to_bytes());
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_pub = X25519Public::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(&recipient_x);
    if !shared.was_contributory() {
        return Err(CryptoError::EncryptionFailed);
    }
    let key = derive_key(shared.as_bytes(), ephemeral_pub.as_bytes(), recipient_x.as_bytes());
    let body = aead::seal(&key, plaintext, ephemeral_pub.as_bytes())?;

    let mut out = Vec::with_capacity(X25519_LEN + body.len());
    out.extend_from_slice(ephemeral_pub.as_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn decrypt(own: &SigningKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < X25519_LEN {
        return Err(CryptoError::DecryptionFailed);
    }
    let (eph_bytes, body) = data.split_at(X25519_LEN);
    let eph_arr: [u8; X25519_LEN] = eph_bytes
        .try_into()
        .map_err(|_| CryptoError::DecryptionFailed)?;
    let ephemeral_pub = X25519Public::from(eph_arr);

    let secret = StaticSecret::from(own.to_scalar_bytes());
    let own_pub = X25519Public::from(&secret);
    let shared = secret.diffie_hellman(&ephemeral_pub);
    if !shared.was_contributory() {
        return Err(CryptoError::DecryptionFailed);
    }
    let key = derive_key(shared.as_bytes(), ephemeral_pub.as_bytes(), own_pub.as_bytes());
    aead::open(&key, body, ephemeral_pub.as_bytes())
}

pub fn sign(own: &SigningKey, data: &[u8]) -> Vec<u8> {
    own.sign(data).to_bytes().to_vec()
}

/// Verify an Ed25519 signature. Wrong lengths are a failed verification.
pub fn verify(public: &VerifyingKey, data: &[u8], signature: &[u8]) -> bool {
    let sig_bytes: [u8; 64] = match signature.try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let sig = Signature::from_bytes(&sig_bytes);
    public.verify(data, &sig).is_ok()
}

fn decode_32(hex_str: &str, what: &str) -> Result<[u8; 32], CryptoError> {
    let bytes = hex::decode(hex_str.trim())
        .map_err(|e| CryptoError::InvalidKey(format!("{}: {}", what, e)))?;
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey(format!("{}: expected 32 bytes", what)))
}

/// Private keys are the hex-encoded 32-byte seed.
pub fn parse_private_hex(hex_str: &str) -> Result<SigningKey, CryptoError> {
    Ok(SigningKey::from_bytes(&decode_32(hex_str, "ed25519 private key")?))
}

pub fn parse_public_hex(hex_str: &str) -> Result<VerifyingKey, CryptoError> {
    VerifyingKey::from_bytes(&decode_32(hex_str, "ed25519 public key")?)
        .map_err(|e| CryptoError::InvalidKey(format!("ed25519 public key: {}", e)))
}
