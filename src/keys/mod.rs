//! Key registry.
//!
//! Holds this bank's private keys and every partner's public keys, keyed by
//! bank code and encryption method. Built once at startup and shared
//! read-only through `Arc<KeyRegistry>`.

use ed25519_dalek::{SigningKey, VerifyingKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::KeysConfig;
use crate::crypto::{CryptoError, EncryptionMethod, ed25519_scheme, rsa_scheme};

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to read key for {owner} ({method}): {reason}")]
    Source {
        owner: String,
        method: EncryptionMethod,
        reason: String,
    },

    #[error("invalid key for {owner} ({method}): {source}")]
    Invalid {
        owner: String,
        method: EncryptionMethod,
        #[source]
        source: CryptoError,
    },

    #[error("duplicate {method} key for {owner}")]
    Duplicate {
        owner: String,
        method: EncryptionMethod,
    },
}

#[derive(Clone)]
pub enum PrivateKey {
    Rsa(Box<RsaPrivateKey>),
    Ed25519(SigningKey),
}

impl PrivateKey {
    pub fn method(&self) -> EncryptionMethod {
        match self {
            PrivateKey::Rsa(_) => EncryptionMethod::Rsa,
            PrivateKey::Ed25519(_) => EncryptionMethod::Ed25519,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Rsa(k) => PublicKey::Rsa(Box::new(RsaPublicKey::from(k.as_ref()))),
            PrivateKey::Ed25519(k) => PublicKey::Ed25519(k.verifying_key()),
        }
    }

    pub fn parse(method: EncryptionMethod, material: &str) -> Result<Self, CryptoError> {
        match method {
            EncryptionMethod::Rsa => Ok(Self::Rsa(Box::new(rsa_scheme::parse_private_pem(material)?))),
            EncryptionMethod::Ed25519 => {
                Ok(Self::Ed25519(ed25519_scheme::parse_private_hex(material)?))
            }
        }
    }
}

// Never print key material
impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey({})", self.method())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublicKey {
    Rsa(Box<RsaPublicKey>),
    Ed25519(VerifyingKey),
}

impl PublicKey {
    pub fn method(&self) -> EncryptionMethod {
        match self {
            PublicKey::Rsa(_) => EncryptionMethod::Rsa,
            PublicKey::Ed25519(_) => EncryptionMethod::Ed25519,
        }
    }

    pub fn parse(method: EncryptionMethod, material: &str) -> Result<Self, CryptoError> {
        match method {
            EncryptionMethod::Rsa => Ok(Self::Rsa(Box::new(rsa_scheme::parse_public_pem(material)?))),
            EncryptionMethod::Ed25519 => {
                Ok(Self::Ed25519(ed25519_scheme::parse_public_hex(material)?))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyRegistry {
    own_bank_code: String,
    own: HashMap<EncryptionMethod, PrivateKey>,
    partners: HashMap<String, HashMap<EncryptionMethod, PublicKey>>,
}

impl KeyRegistry {
    pub fn builder(own_bank_code: impl Into<String>) -> KeyRegistryBuilder {
        KeyRegistryBuilder {
            registry: KeyRegistry {
                own_bank_code: own_bank_code.into(),
                own: HashMap::new(),
                partners: HashMap::new(),
            },
        }
    }

    /// Read and parse every configured key. Any failure aborts the load.
    pub fn load(own_bank_code: &str, config: &KeysConfig) -> Result<Self, KeyError> {
        let mut builder = Self::builder(own_bank_code);

        for own in &config.own {
            let material = own.private_key.read().map_err(|e| KeyError::Source {
                owner: own_bank_code.to_string(),
                method: own.method,
                reason: e.to_string(),
            })?;
            let key = PrivateKey::parse(own.method, &material).map_err(|source| KeyError::Invalid {
                owner: own_bank_code.to_string(),
                method: own.method,
                source,
            })?;
            builder = builder.try_own_key(key)?;
        }

        for partner in &config.partners {
            for entry in &partner.keys {
                let material = entry.public_key.read().map_err(|e| KeyError::Source {
                    owner: partner.code.clone(),
                    method: entry.method,
                    reason: e.to_string(),
                })?;
                let key = PublicKey::parse(entry.method, &material).map_err(|source| {
                    KeyError::Invalid {
                        owner: partner.code.clone(),
                        method: entry.method,
                        source,
                    }
                })?;
                builder = builder.try_partner_key(&partner.code, key)?;
            }
        }

        let registry = builder.build();
        tracing::info!(
            own_methods = ?registry.own.keys().collect::<Vec<_>>(),
            partners = registry.partners.len(),
            "Key registry loaded"
        );
        Ok(registry)
    }

    pub fn own_bank_code(&self) -> &str {
        &self.own_bank_code
    }

    pub fn is_registered(&self, bank_code: &str) -> bool {
        self.partners.contains_key(bank_code)
    }

    pub fn partner_codes(&self) -> impl Iterator<Item = &str> {
        self.partners.keys().map(String::as_str)
    }

    pub fn public_key(
        &self,
        bank_code: &str,
        method: EncryptionMethod,
    ) -> Result<&PublicKey, CryptoError> {
        let keys = self
            .partners
            .get(bank_code)
            .ok_or_else(|| CryptoError::UnknownBank(bank_code.to_string()))?;
        keys.get(&method).ok_or_else(|| CryptoError::KeyNotFound {
            bank: bank_code.to_string(),
            method: method.to_string(),
        })
    }

    pub fn own_private_key(&self, method: EncryptionMethod) -> Result<&PrivateKey, CryptoError> {
        self.own.get(&method).ok_or_else(|| CryptoError::KeyNotFound {
            bank: self.own_bank_code.clone(),
            method: method.to_string(),
        })
    }
}

pub struct KeyRegistryBuilder {
    registry: KeyRegistry,
}

impl KeyRegistryBuilder {
    pub fn try_own_key(mut self, key: PrivateKey) -> Result<Self, KeyError> {
        let method = key.method();
        if self.registry.own.insert(method, key).is_some() {
            return Err(KeyError::Duplicate {
                owner: self.registry.own_bank_code.clone(),
                method,
            });
        }
        Ok(self)
    }

    pub fn try_partner_key(mut self, bank_code: &str, key: PublicKey) -> Result<Self, KeyError> {
        let method = key.method();
        let keys = self
            .registry
            .partners
            .entry(bank_code.to_string())
            .or_default();
        if keys.insert(method, key).is_some() {
            return Err(KeyError::Duplicate {
                owner: bank_code.to_string(),
                method,
            });
        }
        Ok(self)
    }

    /// Infallible variant for assembling registries in code; later keys win.
    pub fn own_key(mut self, key: PrivateKey) -> Self {
        self.registry.own.insert(key.method(), key);
        self
    }

    pub fn partner_key(mut self, bank_code: &str, key: PublicKey) -> Self {
        self.registry
            .partners
            .entry(bank_code.to_string())
            .or_default()
            .insert(key.method(), key);
        self
    }

    pub fn build(self) -> KeyRegistry {
        self.registry
    }
}
