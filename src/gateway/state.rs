use std::sync::Arc;

use crate::db::Database;
use crate::debts::DebtService;
use crate::ledger::LedgerEngine;
use crate::otp::OtpService;
use crate::partner::InboundGuard;
use crate::settlement::SettlementService;
use crate::user_auth::JwtVerifier;

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    pub own_bank_code: String,
    pub ledger: Arc<LedgerEngine>,
    pub settlement: Arc<SettlementService>,
    pub otp: Arc<OtpService>,
    pub debts: Arc<DebtService>,
    pub auth: Arc<JwtVerifier>,
    /// Partner routes run behind this guard
    pub guard: Arc<InboundGuard>,
    /// PostgreSQL; `None` when running on in-memory stores
    pub pg_db: Option<Arc<Database>>,
}

impl AppState {
    /// `true` when the destination bank code names this bank (or is absent).
    pub fn is_local_bank(&self, bank_code: Option<&str>) -> bool {
        bank_code.is_none_or(|c| c == self.own_bank_code)
    }
}
