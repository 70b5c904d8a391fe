//! Closed sets of algorithm identifiers carried in envelope headers.
//!
//! Parsing is case-insensitive and fails closed: a tag outside the set is an
//! error, never a fallback to some default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::CryptoError;

/// Asymmetric scheme used for payload encryption and signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(i16)]
pub enum EncryptionMethod {
    /// RSA-OAEP(SHA-256) key wrap + AES-256-GCM, PKCS#1 v1.5 SHA-256 signatures
    Rsa = 1,
    /// X25519 sealed box + AES-256-GCM, Ed25519 signatures
    Ed25519 = 2,
}

impl EncryptionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::Ed25519 => "ED25519",
        }
    }
}

impl FromStr for EncryptionMethod {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RSA" => Ok(Self::Rsa),
            "ED25519" => Ok(Self::Ed25519),
            _ => Err(CryptoError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for EncryptionMethod {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EncryptionMethod> for String {
    fn from(m: EncryptionMethod) -> Self {
        m.as_str().to_string()
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyed digest algorithm for the integrity field (HMAC construction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashMethod {
    Sha256,
    Sha512,
}

impl HashMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

impl FromStr for HashMethod {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "").as_str() {
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(CryptoError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for HashMethod {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HashMethod> for String {
    fn from(m: HashMethod) -> Self {
        m.as_str().to_string()
    }
}

impl fmt::Display for HashMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
