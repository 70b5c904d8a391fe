use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;

use crate::crypto::{EncryptionMethod, HashMethod};

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_INTEGRITY_SECRET: &str = "BANK_INTEGRITY_SECRET";
pub const ENV_OTP_SECRET: &str = "BANK_OTP_SECRET";
pub const ENV_JWT_SECRET: &str = "BANK_JWT_SECRET";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    /// Separate rolling file for security-relevant events (target `bank_audit`)
    #[serde(default = "default_audit_file")]
    pub audit_log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// Without a URL the service runs on in-memory stores
    #[serde(default)]
    pub postgres_url: Option<String>,
    pub bank: BankConfig,
    pub keys: KeysConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    /// Accounts opened at startup when running on in-memory stores
    #[serde(default)]
    pub seed_accounts: Vec<SeedAccount>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeedAccount {
    pub account_number: String,
    pub customer_id: i64,
    #[serde(default)]
    pub balance: rust_decimal::Decimal,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Identity of this bank in the partner network.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BankConfig {
    pub id: i64,
    pub code: String,
    #[serde(default)]
    pub name: String,
}

/// Where a key's material comes from: a file on disk or an environment variable.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct KeySource {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub env: Option<String>,
}

impl KeySource {
    pub fn read(&self) -> Result<String> {
        match (&self.path, &self.env) {
            (Some(path), _) => {
                fs::read_to_string(path).with_context(|| format!("reading key file {}", path))
            }
            (None, Some(var)) => {
                std::env::var(var).with_context(|| format!("reading key from env {}", var))
            }
            (None, None) => bail!("key source has neither path nor env"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OwnKeyConfig {
    pub method: EncryptionMethod,
    pub private_key: KeySource,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PartnerKeyConfig {
    pub method: EncryptionMethod,
    pub public_key: KeySource,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PartnerConfig {
    pub code: String,
    pub bank_id: i64,
    #[serde(default)]
    pub name: String,
    /// Base URL; outbound envelopes go to `{endpoint}/partner/transaction`
    #[serde(default)]
    pub endpoint: Option<String>,
    pub keys: Vec<PartnerKeyConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct KeysConfig {
    pub own: Vec<OwnKeyConfig>,
    #[serde(default)]
    pub partners: Vec<PartnerConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SecurityConfig {
    pub freshness_window_ms: i64,
    pub partner_timeout_ms: u64,
    pub inbound_timeout_ms: u64,
    pub default_encryption: EncryptionMethod,
    pub default_hash: HashMethod,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            freshness_window_ms: 30_000,
            partner_timeout_ms: 10_000,
            inbound_timeout_ms: 15_000,
            default_encryption: EncryptionMethod::Rsa,
            default_hash: HashMethod::Sha256,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OtpConfig {
    pub code_length: usize,
    pub expiry_secs: i64,
    pub purge_interval_secs: u64,
    /// Wrong codes tolerated before a challenge is burned
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            expiry_secs: 300,
            purge_interval_secs: 60,
            max_attempts: default_max_attempts(),
        }
    }
}

/// Shared secrets. Normally supplied through the environment, never committed.
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct SecretsConfig {
    #[serde(default)]
    pub integrity_secret: Option<Secret>,
    #[serde(default)]
    pub otp_secret: Option<Secret>,
    #[serde(default)]
    pub jwt_secret: Option<Secret>,
}

impl fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("integrity_secret", &self.integrity_secret)
            .field("otp_secret", &self.otp_secret)
            .field("jwt_secret", &self.jwt_secret)
            .finish()
    }
}

/// String whose `Debug` output never shows the value.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

fn default_audit_file() -> String {
    "audit.log".to_string()
}

impl AppConfig {
    /// Load `config/{env}.yaml`, then apply environment overrides and validate.
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config yaml")
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_DATABASE_URL) {
            self.postgres_url = Some(url);
        }
        if let Ok(v) = std::env::var(ENV_INTEGRITY_SECRET) {
            self.secrets.integrity_secret = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var(ENV_OTP_SECRET) {
            self.secrets.otp_secret = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var(ENV_JWT_SECRET) {
            self.secrets.jwt_secret = Some(Secret::new(v));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.keys.own.is_empty() {
            bail!("keys.own must contain at least one private key");
        }
        if !self
            .keys
            .own
            .iter()
            .any(|k| k.method == self.security.default_encryption)
        {
            bail!(
                "no own key for default encryption method {}",
                self.security.default_encryption
            );
        }
        if self.security.freshness_window_ms <= 0 {
            bail!("security.freshness_window_ms must be positive");
        }
        if self.security.partner_timeout_ms == 0 || self.security.inbound_timeout_ms == 0 {
            bail!("security timeouts must be positive");
        }
        if !(4..=10).contains(&self.otp.code_length) {
            bail!("otp.code_length must be between 4 and 10");
        }
        if self.otp.expiry_secs <= 0 {
            bail!("otp.expiry_secs must be positive");
        }
        if self.otp.max_attempts == 0 {
            bail!("otp.max_attempts must be at least 1");
        }
        for partner in &self.keys.partners {
            if partner.code == self.bank.code {
                bail!("partner {} uses this bank's own code", partner.code);
            }
            if partner.keys.is_empty() {
                bail!("partner {} has no public keys", partner.code);
            }
        }
        self.integrity_secret()?;
        self.otp_secret()?;
        self.jwt_secret()?;
        Ok(())
    }

    pub fn integrity_secret(&self) -> Result<&Secret> {
        non_empty(&self.secrets.integrity_secret, ENV_INTEGRITY_SECRET)
    }

    pub fn otp_secret(&self) -> Result<&Secret> {
        non_empty(&self.secrets.otp_secret, ENV_OTP_SECRET)
    }

    pub fn jwt_secret(&self) -> Result<&Secret> {
        non_empty(&self.secrets.jwt_secret, ENV_JWT_SECRET)
    }
}

fn non_empty<'a>(secret: &'a Option<Secret>, env: &str) -> Result<&'a Secret> {
    match secret {
        Some(s) if !s.expose().is_empty() => Ok(s),
        _ => bail!("missing secret: set {}", env),
    }
}
