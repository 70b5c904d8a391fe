//! Cryptographic primitives for the partner protocol.
//!
//! - [`methods`] - closed enums for encryption and hash tags
//! - [`digest`] - keyed integrity digest
//! - [`rsa_scheme`], [`ed25519_scheme`] - asymmetric schemes
//! - [`envelope`] - wire envelope and [`CryptoEnvelope`]
//! - [`freshness`] - timestamp window check

pub mod aead;
pub mod digest;
pub mod ed25519_scheme;
pub mod envelope;
pub mod error;
pub mod freshness;
pub mod methods;
pub mod rsa_scheme;

pub use envelope::{CryptoEnvelope, EnvelopeHeader, PartnerEnvelope, WireHeader};
pub use error::CryptoError;
pub use freshness::{is_fresh, is_fresh_at, now_ms};
pub use methods::{EncryptionMethod, HashMethod};
