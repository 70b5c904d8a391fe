//! Debt reminders paid through an OTP-confirmed ledger transfer.

pub mod store;

pub use store::{DebtStore, MemoryDebtStore, PgDebtStore};

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::ledger::{LedgerEngine, LedgerError, Transaction, TransferSpec};
use crate::otp::{IssuedOtp, OtpError, OtpService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum DebtStatus {
    Pending = 1,
    Paid = 2,
    Cancelled = 3,
}

impl DebtStatus {
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Paid),
            3 => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Debt {
    pub debt_id: i64,
    pub creditor_account_number: String,
    pub debtor_account_number: String,
    pub amount: Decimal,
    pub message: String,
    pub status: DebtStatus,
    pub transaction_id: Option<i64>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DebtError {
    #[error("Debt not found: {0}")]
    NotFound(i64),

    #[error("Debt does not belong to this customer")]
    NotDebtor,

    #[error("Debt is not pending")]
    NotPending,

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl DebtError {
    pub fn code(&self) -> &'static str {
        match self {
            DebtError::NotFound(_) => "DEBT_NOT_FOUND",
            DebtError::NotDebtor => "FORBIDDEN",
            DebtError::NotPending => "DEBT_NOT_PENDING",
            DebtError::Otp(e) if e.is_internal() => "INTERNAL_ERROR",
            DebtError::Otp(_) => "OTP_INVALID",
            DebtError::Ledger(e) => e.code(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            DebtError::NotFound(_) => 404,
            DebtError::NotDebtor => 403,
            DebtError::NotPending => 409,
            DebtError::Otp(e) if e.is_internal() => 503,
            DebtError::Otp(_) => 400,
            DebtError::Ledger(e) => e.http_status(),
        }
    }
}

pub struct DebtService {
    store: Arc<dyn DebtStore>,
    ledger: Arc<LedgerEngine>,
    otp: Arc<OtpService>,
}

impl DebtService {
    pub fn new(store: Arc<dyn DebtStore>, ledger: Arc<LedgerEngine>, otp: Arc<OtpService>) -> Self {
        Self { store, ledger, otp }
    }

    pub fn store(&self) -> &Arc<dyn DebtStore> {
        &self.store
    }

    /// Load a pending debt whose debtor account belongs to `user_id`.
    async fn payable(&self, user_id: i64, debt_id: i64) -> Result<Debt, DebtError> {
        let debt = self.store.find(debt_id).await?.ok_or(DebtError::NotFound(debt_id))?;
        let debtor = self
            .ledger
            .find_account(&debt.debtor_account_number)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(debt.debtor_account_number.clone()))?;
        if debtor.customer_id != user_id {
            return Err(DebtError::NotDebtor);
        }
        if debt.status != DebtStatus::Pending {
            return Err(DebtError::NotPending);
        }
        Ok(debt)
    }

    pub async fn request_payment(&self, user_id: i64, debt_id: i64) -> Result<IssuedOtp, DebtError> {
        self.payable(user_id, debt_id).await?;
        Ok(self.otp.request(user_id, "debt-payment").await?)
    }

    pub async fn confirm_payment(
        &self,
        user_id: i64,
        debt_id: i64,
        code: &str,
        token: &str,
    ) -> Result<(Debt, Transaction), DebtError> {
        self.otp.verify(code, token, user_id).await?;
        let debt = self.payable(user_id, debt_id).await?;

        let own = self.ledger.own_bank_id();
        let spec = TransferSpec::transfer(
            own,
            debt.debtor_account_number.clone(),
            own,
            debt.creditor_account_number.clone(),
            debt.amount,
        )
        .with_message(debt.message.clone())
        .with_idempotency_key(format!("debt-{}", debt.debt_id));
        let transaction = self.ledger.apply_transaction(spec).await?;

        if !self.store.mark_paid(debt_id, transaction.transaction_id).await? {
            return Err(DebtError::NotPending);
        }
        tracing::info!(debt_id, transaction_id = transaction.transaction_id, "Debt paid");

        let paid = Debt {
            status: DebtStatus::Paid,
            transaction_id: Some(transaction.transaction_id),
            ..debt
        };
        Ok((paid, transaction))
    }
}
