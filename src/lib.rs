//! Inter-bank settlement node.
//!
//! One bank's side of a partner network: customer transfers and debt
//! payments gated by single-use OTP challenges, a fee-aware double-entry
//! ledger, and a signed, encrypted envelope protocol for moving money
//! between banks.
//!
//! # Modules
//!
//! - [`crypto`] - envelope sealing/opening, integrity digests, freshness
//! - [`keys`] - per-bank key registry
//! - [`partner`] - inbound guard pipeline, payload types, outbound transport
//! - [`ledger`] - account balances and atomic transaction commits
//! - [`settlement`] - inbound and outbound inter-bank transfers
//! - [`otp`] - one-time-password challenge tokens
//! - [`debts`] - debt reminders paid under OTP
//! - [`gateway`] - HTTP routes
//! - [`app`] - service wiring

pub mod app;
pub mod bank;
pub mod config;
pub mod crypto;
pub mod db;
pub mod debts;
pub mod gateway;
pub mod keys;
pub mod ledger;
pub mod logging;
pub mod otp;
pub mod partner;
pub mod settlement;
pub mod user_auth;

pub use config::AppConfig;
pub use crypto::{CryptoEnvelope, EncryptionMethod, HashMethod, PartnerEnvelope};
pub use keys::KeyRegistry;
pub use ledger::{LedgerEngine, Transaction, TransferSpec};
pub use settlement::SettlementService;
