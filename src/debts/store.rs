use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::atomic::{AtomicI64, Ordering};

use super::{Debt, DebtStatus};
use crate::db::SafeRow;
use crate::ledger::LedgerError;

#[async_trait]
pub trait DebtStore: Send + Sync {
    async fn create(
        &self,
        creditor_account_number: &str,
        debtor_account_number: &str,
        amount: Decimal,
        message: &str,
    ) -> Result<Debt, LedgerError>;

    async fn find(&self, debt_id: i64) -> Result<Option<Debt>, LedgerError>;

    /// Pending -> Paid. Returns `false` if the debt was not pending.
    async fn mark_paid(&self, debt_id: i64, transaction_id: i64) -> Result<bool, LedgerError>;
}

pub struct MemoryDebtStore {
    debts: DashMap<i64, Debt>,
    next_id: AtomicI64,
}

impl MemoryDebtStore {
    pub fn new() -> Self {
        Self {
            debts: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryDebtStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DebtStore for MemoryDebtStore {
    async fn create(
        &self,
        creditor_account_number: &str,
        debtor_account_number: &str,
        amount: Decimal,
        message: &str,
    ) -> Result<Debt, LedgerError> {
        let debt = Debt {
            debt_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            creditor_account_number: creditor_account_number.to_string(),
            debtor_account_number: debtor_account_number.to_string(),
            amount,
            message: message.to_string(),
            status: DebtStatus::Pending,
            transaction_id: None,
        };
        self.debts.insert(debt.debt_id, debt.clone());
        Ok(debt)
    }

    async fn find(&self, debt_id: i64) -> Result<Option<Debt>, LedgerError> {
        Ok(self.debts.get(&debt_id).map(|d| d.clone()))
    }

    async fn mark_paid(&self, debt_id: i64, transaction_id: i64) -> Result<bool, LedgerError> {
        match self.debts.get_mut(&debt_id) {
            Some(mut debt) if debt.status == DebtStatus::Pending => {
                debt.status = DebtStatus::Paid;
                debt.transaction_id = Some(transaction_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

pub struct PgDebtStore {
    pool: PgPool,
}

impl PgDebtStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_debt(row: &sqlx::postgres::PgRow) -> Option<Debt> {
        Some(Debt {
            debt_id: row.try_get_log("debt_id")?,
            creditor_account_number: row.try_get_log("creditor_account_number")?,
            debtor_account_number: row.try_get_log("debtor_account_number")?,
            amount: row.try_get_log("amount")?,
            message: row.try_get_log("message").unwrap_or_default(),
            status: DebtStatus::from_id(row.try_get_log("status")?)?,
            transaction_id: row.try_get_log("transaction_id")?,
        })
    }
}

const DEBT_COLUMNS: &str =
    "debt_id, creditor_account_number, debtor_account_number, amount, message, status, transaction_id";

#[async_trait]
impl DebtStore for PgDebtStore {
    async fn create(
        &self,
        creditor_account_number: &str,
        debtor_account_number: &str,
        amount: Decimal,
        message: &str,
    ) -> Result<Debt, LedgerError> {
        let sql = format!(
            "INSERT INTO debts (creditor_account_number, debtor_account_number, amount, message, status)
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            DEBT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(creditor_account_number)
            .bind(debtor_account_number)
            .bind(amount)
            .bind(message)
            .bind(DebtStatus::Pending.id())
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_debt(&row).ok_or_else(|| LedgerError::Storage("unreadable debt row".into()))
    }

    async fn find(&self, debt_id: i64) -> Result<Option<Debt>, LedgerError> {
        let sql = format!("SELECT {} FROM debts WHERE debt_id = $1", DEBT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(debt_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().and_then(Self::row_to_debt))
    }

    async fn mark_paid(&self, debt_id: i64, transaction_id: i64) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "UPDATE debts SET status = $1, transaction_id = $2, updated_at = NOW()
             WHERE debt_id = $3 AND status = $4",
        )
        .bind(DebtStatus::Paid.id())
        .bind(transaction_id)
        .bind(debt_id)
        .bind(DebtStatus::Pending.id())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
