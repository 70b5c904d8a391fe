//! Read-only directory of known banks.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;

use crate::config::AppConfig;
use crate::db::SafeRow;
use crate::ledger::LedgerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bank {
    pub bank_id: i64,
    pub bank_code: String,
    pub bank_name: String,
}

#[async_trait]
pub trait BankDirectory: Send + Sync {
    async fn by_code(&self, bank_code: &str) -> Result<Option<Bank>, LedgerError>;
    async fn by_id(&self, bank_id: i64) -> Result<Option<Bank>, LedgerError>;
}

/// Directory fixed at construction, used without a database.
pub struct StaticBankDirectory {
    by_code: HashMap<String, Bank>,
}

impl StaticBankDirectory {
    pub fn new(banks: impl IntoIterator<Item = Bank>) -> Self {
        Self {
            by_code: banks.into_iter().map(|b| (b.bank_code.clone(), b)).collect(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(banks_from_config(config))
    }
}

/// This bank plus every configured partner.
pub fn banks_from_config(config: &AppConfig) -> Vec<Bank> {
    let mut banks = vec![Bank {
        bank_id: config.bank.id,
        bank_code: config.bank.code.clone(),
        bank_name: config.bank.name.clone(),
    }];
    banks.extend(config.keys.partners.iter().map(|p| Bank {
        bank_id: p.bank_id,
        bank_code: p.code.clone(),
        bank_name: p.name.clone(),
    }));
    banks
}

#[async_trait]
impl BankDirectory for StaticBankDirectory {
    async fn by_code(&self, bank_code: &str) -> Result<Option<Bank>, LedgerError> {
        Ok(self.by_code.get(bank_code).cloned())
    }

    async fn by_id(&self, bank_id: i64) -> Result<Option<Bank>, LedgerError> {
        Ok(self.by_code.values().find(|b| b.bank_id == bank_id).cloned())
    }
}

pub struct PgBankDirectory {
    pool: PgPool,
}

impl PgBankDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Make sure every configured bank has a row (transactions reference them).
    pub async fn sync(&self, banks: &[Bank]) -> Result<(), sqlx::Error> {
        for bank in banks {
            sqlx::query(
                "INSERT INTO banks (bank_id, bank_code, bank_name) VALUES ($1, $2, $3)
                 ON CONFLICT (bank_id) DO UPDATE SET bank_code = EXCLUDED.bank_code, bank_name = EXCLUDED.bank_name",
            )
            .bind(bank.bank_id)
            .bind(&bank.bank_code)
            .bind(&bank.bank_name)
            .execute(&self.pool)
            .await?;
        }
        tracing::info!(count = banks.len(), "Bank directory synchronised");
        Ok(())
    }

    fn row_to_bank(row: &sqlx::postgres::PgRow) -> Option<Bank> {
        Some(Bank {
            bank_id: row.try_get_log("bank_id")?,
            bank_code: row.try_get_log("bank_code")?,
            bank_name: row.try_get_log("bank_name").unwrap_or_default(),
        })
    }
}

#[async_trait]
impl BankDirectory for PgBankDirectory {
    async fn by_code(&self, bank_code: &str) -> Result<Option<Bank>, LedgerError> {
        let row = sqlx::query("SELECT bank_id, bank_code, bank_name FROM banks WHERE bank_code = $1")
            .bind(bank_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().and_then(Self::row_to_bank))
    }

    async fn by_id(&self, bank_id: i64) -> Result<Option<Bank>, LedgerError> {
        let row = sqlx::query("SELECT bank_id, bank_code, bank_name FROM banks WHERE bank_id = $1")
            .bind(bank_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().and_then(Self::row_to_bank))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory_lookup() {
        let dir = StaticBankDirectory::new([
            Bank {
                bank_id: 1,
                bank_code: "Bank A".into(),
                bank_name: "Alpha".into(),
            },
            Bank {
                bank_id: 2,
                bank_code: "Bank B".into(),
                bank_name: "Beta".into(),
            },
        ]);
        assert_eq!(dir.by_code("Bank B").await.unwrap().unwrap().bank_id, 2);
        assert_eq!(dir.by_id(1).await.unwrap().unwrap().bank_code, "Bank A");
        assert!(dir.by_code("Bank C").await.unwrap().is_none());
        assert!(dir.by_id(9).await.unwrap().is_none());
    }
}
