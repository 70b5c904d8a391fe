//! In-process ledger store.
//!
//! Each account sits behind its own async mutex. `commit` locks the touched
//! accounts in account-number order, so overlapping commits serialize and
//! disjoint ones run in parallel.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;

use super::error::LedgerError;
use super::store::LedgerStore;
use super::types::{Account, BalanceDelta, Transaction, TransferSpec};

pub struct MemoryLedgerStore {
    accounts: DashMap<String, Arc<Mutex<Account>>>,
    transactions: DashMap<i64, Transaction>,
    by_key: DashMap<String, i64>,
    next_account_id: AtomicI64,
    next_transaction_id: AtomicI64,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            transactions: DashMap::new(),
            by_key: DashMap::new(),
            next_account_id: AtomicI64::new(1),
            next_transaction_id: AtomicI64::new(1),
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        let mut all: Vec<Transaction> = self.transactions.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|t| t.transaction_id);
        all
    }

    pub async fn total_balance(&self) -> Decimal {
        let handles: Vec<Arc<Mutex<Account>>> =
            self.accounts.iter().map(|e| e.value().clone()).collect();
        let mut total = Decimal::ZERO;
        for h in handles {
            total += h.lock().await.balance;
        }
        total
    }

    fn record(&self, spec: &TransferSpec) -> Transaction {
        Transaction {
            transaction_id: self.next_transaction_id.fetch_add(1, Ordering::Relaxed),
            from_bank_id: spec.from_bank_id,
            from_account_number: spec.from_account_number.clone(),
            to_bank_id: spec.to_bank_id,
            to_account_number: spec.to_account_number.clone(),
            transaction_type: spec.transaction_type,
            amount: spec.amount,
            message: spec.message.clone(),
            fee_payer: spec.fee_payer,
            fee_amount: spec.fee_amount,
            request_signature: spec.request_signature.clone(),
            response_signature: spec.response_signature.clone(),
            idempotency_key: spec.idempotency_key.clone(),
            created_at: Utc::now(),
        }
    }

    fn existing(&self, transaction_id: i64) -> Result<Transaction, LedgerError> {
        self.transactions
            .get(&transaction_id)
            .map(|t| t.value().clone())
            .ok_or_else(|| LedgerError::Storage(format!("missing transaction {}", transaction_id)))
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn find_account(&self, account_number: &str) -> Result<Option<Account>, LedgerError> {
        let handle = self.accounts.get(account_number).map(|e| e.value().clone());
        match handle {
            Some(h) => Ok(Some(h.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>, LedgerError> {
        let id = self.by_key.get(key).map(|e| *e.value());
        id.map(|id| self.existing(id)).transpose()
    }

    async fn commit(
        &self,
        deltas: &[BalanceDelta],
        spec: &TransferSpec,
    ) -> Result<Transaction, LedgerError> {
        let mut ordered: Vec<&BalanceDelta> = deltas.iter().collect();
        ordered.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        if ordered
            .windows(2)
            .any(|w| w[0].account_number == w[1].account_number)
        {
            return Err(LedgerError::SameAccount);
        }

        let mut handles = Vec::with_capacity(ordered.len());
        for d in &ordered {
            let h = self
                .accounts
                .get(&d.account_number)
                .map(|e| e.value().clone())
                .ok_or_else(|| LedgerError::AccountNotFound(d.account_number.clone()))?;
            handles.push(h);
        }

        let mut guards = Vec::with_capacity(handles.len());
        for h in &handles {
            guards.push(h.lock().await);
        }

        // From here on nothing awaits, so holding the key shard is fine
        let key_slot = match spec.idempotency_key.as_ref() {
            Some(key) => match self.by_key.entry(key.clone()) {
                Entry::Occupied(e) => {
                    tracing::info!(idempotency_key = %key, "Idempotent replay, returning recorded transaction");
                    return self.existing(*e.get());
                }
                Entry::Vacant(v) => Some(v),
            },
            None => None,
        };

        let mut new_balances = Vec::with_capacity(guards.len());
        for (d, g) in ordered.iter().zip(guards.iter()) {
            let next = g.balance.checked_add(d.delta).ok_or(LedgerError::Overflow)?;
            if next < Decimal::ZERO {
                return Err(LedgerError::InsufficientBalance(d.account_number.clone()));
            }
            new_balances.push(next);
        }

        for (g, balance) in guards.iter_mut().zip(new_balances) {
            g.balance = balance;
        }

        let transaction = self.record(spec);
        if let Some(slot) = key_slot {
            slot.insert(transaction.transaction_id);
        }
        self.transactions
            .insert(transaction.transaction_id, transaction.clone());
        Ok(transaction)
    }

    async fn open_account(
        &self,
        account_number: &str,
        customer_id: i64,
        initial_balance: Decimal,
    ) -> Result<Account, LedgerError> {
        if initial_balance < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        match self.accounts.entry(account_number.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::InvalidTransaction(format!(
                "account {} already exists",
                account_number
            ))),
            Entry::Vacant(v) => {
                let account = Account {
                    account_id: self.next_account_id.fetch_add(1, Ordering::Relaxed),
                    account_number: account_number.to_string(),
                    customer_id,
                    balance: initial_balance,
                };
                v.insert(Arc::new(Mutex::new(account.clone())));
                Ok(account)
            }
        }
    }
}
