//! RSA hybrid scheme.
//!
//! Ciphertext layout: `wrapped_len(u16 BE) || RSA-OAEP(SHA-256)(aes_key) || nonce || aes_gcm(body)`.
//! The wrapped key is also the AAD of the symmetric layer.

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use super::aead;
use super::error::CryptoError;

pub fn encrypt(recipient: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let key = aead::random_key();
    let wrapped = recipient
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &key)
        .map_err(|_| CryptoError::EncryptionFailed)?;
    let wrapped_len = u16::try_from(wrapped.len()).map_err(|_| CryptoError::EncryptionFailed)?;

    let body = aead::seal(&key, plaintext, &wrapped)?;

    let mut out = Vec::with_capacity(2 + wrapped.len() + body.len());
    out.extend_from_slice(&wrapped_len.to_be_bytes());
    out.extend_from_slice(&wrapped);
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn decrypt(own: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < 2 {
        return Err(CryptoError::DecryptionFailed);
    }
    let wrapped_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    let rest = &data[2..];
    if rest.len() < wrapped_len {
        return Err(CryptoError::DecryptionFailed);
    }
    let (wrapped, body) = rest.split_at(wrapped_len);

    let key_bytes = own
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    let key: [u8; aead::KEY_LEN] = key_bytes
        .try_into()
        .map_err(|_| CryptoError::DecryptionFailed)?;

    aead::open(&key, body, wrapped)
}

/// PKCS#1 v1.5 signature over SHA-256 of `data`.
pub fn sign(own: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let signer = SigningKey::<Sha256>::new(own.clone());
    let sig = signer
        .try_sign(data)
        .map_err(|_| CryptoError::SigningFailed)?;
    Ok(sig.to_vec())
}

pub fn verify(public: &RsaPublicKey, data: &[u8], signature: &[u8]) -> bool {
    let Ok(sig) = Signature::try_from(signature) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(public.clone())
        .verify(data, &sig)
        .is_ok()
}

/// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`).
pub fn parse_private_pem(pem: &str) -> Result<RsaPrivateKey, CryptoError> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::InvalidKey(format!("rsa private key: {}", e)))
}

/// Accepts SPKI (`BEGIN PUBLIC KEY`) or PKCS#1 (`BEGIN RSA PUBLIC KEY`).
pub fn parse_public_pem(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::InvalidKey(format!("rsa public key: {}", e)))
}
