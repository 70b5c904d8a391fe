use thiserror::Error;

/// Cryptographic failures. Messages stay vague; callers log context themselves.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("unknown bank: {0}")]
    UnknownBank(String),

    #[error("no key for {bank} using {method}")]
    KeyNotFound { bank: String, method: String },

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("signing failed")]
    SigningFailed,

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}

impl CryptoError {
    pub fn code(&self) -> &'static str {
        match self {
            CryptoError::UnsupportedMethod(_) => "UNSUPPORTED_METHOD",
            CryptoError::UnknownBank(_) => "UNKNOWN_BANK",
            CryptoError::KeyNotFound { .. } => "KEY_NOT_FOUND",
            CryptoError::EncryptionFailed => "ENCRYPTION_FAILED",
            CryptoError::DecryptionFailed => "DECRYPTION_FAILED",
            CryptoError::SigningFailed => "SIGNING_FAILED",
            CryptoError::InvalidKey(_) => "INVALID_KEY",
        }
    }
}
