use async_trait::async_trait;
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{Account, BalanceDelta, Transaction, TransferSpec};

/// Persistence seam for the ledger.
///
/// `commit` is the only mutating operation on balances: it applies every
/// delta and inserts the transaction row as one atomic unit, or does nothing.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_account(&self, account_number: &str) -> Result<Option<Account>, LedgerError>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>, LedgerError>;

    /// Apply `deltas` and record `spec`.
    ///
    /// Contract:
    /// - every referenced account must exist, else `AccountNotFound`
    /// - no balance may end below zero, else `InsufficientBalance`
    /// - a transfer whose idempotency key is already recorded returns the
    ///   existing row and changes nothing
    async fn commit(
        &self,
        deltas: &[BalanceDelta],
        spec: &TransferSpec,
    ) -> Result<Transaction, LedgerError>;

    async fn open_account(
        &self,
        account_number: &str,
        customer_id: i64,
        initial_balance: Decimal,
    ) -> Result<Account, LedgerError>;
}
