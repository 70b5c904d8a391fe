//! Service wiring shared by the binary and the integration tests.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::bank::{BankDirectory, PgBankDirectory, StaticBankDirectory, banks_from_config};
use crate::config::AppConfig;
use crate::crypto::{CryptoEnvelope, now_ms};
use crate::db::Database;
use crate::debts::{DebtService, DebtStore, MemoryDebtStore, PgDebtStore};
use crate::gateway::state::AppState;
use crate::keys::KeyRegistry;
use crate::ledger::{LedgerEngine, LedgerStore, MemoryLedgerStore, PgLedgerStore};
use crate::otp::{LogDelivery, MemoryUsedTokens, OtpChallenge, OtpDelivery, OtpService, PgUsedTokens, UsedTokenStore};
use crate::partner::{InboundGuard, PartnerTransport};
use crate::settlement::{SettlementService, SettlementSettings};
use crate::user_auth::JwtVerifier;

/// Persistence backends for every stateful service.
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn LedgerStore>,
    pub banks: Arc<dyn BankDirectory>,
    pub used_tokens: Arc<dyn UsedTokenStore>,
    pub debts: Arc<dyn DebtStore>,
}

impl Stores {
    /// In-memory stores; configured seed accounts are opened.
    pub async fn in_memory(config: &AppConfig) -> Result<Self> {
        let ledger = Arc::new(MemoryLedgerStore::new());
        for seed in &config.seed_accounts {
            ledger
                .open_account(&seed.account_number, seed.customer_id, seed.balance)
                .await
                .with_context(|| format!("opening seed account {}", seed.account_number))?;
        }
        Ok(Self {
            ledger,
            banks: Arc::new(StaticBankDirectory::from_config(config)),
            used_tokens: Arc::new(MemoryUsedTokens::new()),
            debts: Arc::new(MemoryDebtStore::new()),
        })
    }

    /// PostgreSQL stores; configured banks are upserted so transactions can
    /// reference them.
    pub async fn postgres(db: &Database, config: &AppConfig) -> Result<Self> {
        let pool = db.pool().clone();
        let banks = PgBankDirectory::new(pool.clone());
        banks
            .sync(&banks_from_config(config))
            .await
            .context("synchronising bank directory")?;
        Ok(Self {
            ledger: Arc::new(PgLedgerStore::new(pool.clone())),
            banks: Arc::new(banks),
            used_tokens: Arc::new(PgUsedTokens::new(pool.clone())),
            debts: Arc::new(PgDebtStore::new(pool)),
        })
    }
}

/// Partner base URLs from config, keyed by bank code.
pub fn partner_endpoints(config: &AppConfig) -> HashMap<String, String> {
    config
        .keys
        .partners
        .iter()
        .filter_map(|p| p.endpoint.as_ref().map(|e| (p.code.clone(), e.clone())))
        .collect()
}

/// Build the shared gateway state.
pub fn assemble(
    config: &AppConfig,
    keys: Arc<KeyRegistry>,
    stores: Stores,
    transport: Arc<dyn PartnerTransport>,
    delivery: Arc<dyn OtpDelivery>,
    pg_db: Option<Arc<Database>>,
) -> Result<Arc<AppState>> {
    let security = &config.security;
    let crypto = Arc::new(CryptoEnvelope::new(keys, config.integrity_secret()?.clone()));
    let ledger = Arc::new(LedgerEngine::new(stores.ledger, config.bank.id));

    let settlement = Arc::new(SettlementService::new(
        crypto.clone(),
        ledger.clone(),
        stores.banks,
        transport,
        partner_endpoints(config),
        SettlementSettings {
            default_encryption: security.default_encryption,
            default_hash: security.default_hash,
            partner_timeout: Duration::from_millis(security.partner_timeout_ms),
            freshness_window_ms: security.freshness_window_ms,
        },
    ));

    let otp = Arc::new(OtpService::new(
        OtpChallenge::new(config.otp_secret()?.clone(), &config.otp, stores.used_tokens),
        delivery,
    ));
    let debts = Arc::new(DebtService::new(stores.debts, ledger.clone(), otp.clone()));
    let guard = Arc::new(InboundGuard::new(
        crypto,
        security.freshness_window_ms,
        Duration::from_millis(security.inbound_timeout_ms),
    ));

    Ok(Arc::new(AppState {
        own_bank_code: config.bank.code.clone(),
        ledger,
        settlement,
        otp,
        debts,
        auth: Arc::new(JwtVerifier::new(config.jwt_secret()?.clone())),
        guard,
        pg_db,
    }))
}

/// Default OTP delivery.
pub fn log_delivery() -> Arc<dyn OtpDelivery> {
    Arc::new(LogDelivery)
}

/// Periodically drop expired replay-cache entries and used OTP ids.
pub fn spawn_purge_task(state: Arc<AppState>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = now_ms();
            let replay = state.guard.replay_cache().purge_expired(now);
            match state.otp.purge_expired(now).await {
                Ok(otp) => {
                    if replay + otp > 0 {
                        tracing::debug!(replay, otp, "Purged expired entries");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to purge used OTP tokens"),
            }
        }
    })
}
