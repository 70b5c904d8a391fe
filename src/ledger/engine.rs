//! Fee-aware balance mutation.
//!
//! | case                          | source delta          | destination delta       |
//! |-------------------------------|-----------------------|-------------------------|
//! | deposit                       | -                     | +amount                 |
//! | transfer, source pays fee     | -(amount + fee)       | +amount                 |
//! | transfer, destination pays    | -amount               | +(amount - fee)         |
//!
//! Only sides whose bank is this bank get a delta. The fee leaves both
//! accounts.

use rust_decimal::Decimal;
use std::sync::Arc;

use super::error::LedgerError;
use super::store::LedgerStore;
use super::types::{Account, BalanceDelta, FeePayer, Transaction, TransactionType, TransferSpec};

pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
    own_bank_id: i64,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>, own_bank_id: i64) -> Self {
        Self { store, own_bank_id }
    }

    pub fn own_bank_id(&self) -> i64 {
        self.own_bank_id
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub async fn find_account(&self, account_number: &str) -> Result<Option<Account>, LedgerError> {
        self.store.find_account(account_number).await
    }

    /// Compute the balance deltas for `spec` without touching storage.
    pub fn plan(&self, spec: &TransferSpec) -> Result<Vec<BalanceDelta>, LedgerError> {
        if spec.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if spec.fee_amount < Decimal::ZERO {
            return Err(LedgerError::InvalidFee);
        }

        let dest_local = spec.to_bank_id == self.own_bank_id;

        match spec.transaction_type {
            TransactionType::Deposit => {
                if !dest_local {
                    return Err(LedgerError::InvalidTransaction(
                        "deposit destination must be a local account".into(),
                    ));
                }
                if spec.fee_amount != Decimal::ZERO {
                    return Err(LedgerError::InvalidTransaction(
                        "deposits do not carry a fee".into(),
                    ));
                }
                Ok(vec![BalanceDelta {
                    account_number: spec.to_account_number.clone(),
                    delta: spec.amount,
                }])
            }
            TransactionType::Transfer => {
                let from_account = spec.from_account_number.as_ref().ok_or_else(|| {
                    LedgerError::InvalidTransaction("transfer needs a source account".into())
                })?;
                let source_local = spec.from_bank_id == self.own_bank_id;

                if !source_local && !dest_local {
                    return Err(LedgerError::InvalidTransaction(
                        "neither side belongs to this bank".into(),
                    ));
                }
                if spec.from_bank_id == spec.to_bank_id && *from_account == spec.to_account_number {
                    return Err(LedgerError::SameAccount);
                }

                let (debit, credit) = match spec.fee_payer {
                    FeePayer::Source => (
                        spec.amount
                            .checked_add(spec.fee_amount)
                            .ok_or(LedgerError::Overflow)?,
                        spec.amount,
                    ),
                    FeePayer::Destination => {
                        if spec.fee_amount > spec.amount {
                            return Err(LedgerError::FeeExceedsAmount);
                        }
                        (spec.amount, spec.amount - spec.fee_amount)
                    }
                };

                let mut deltas = Vec::with_capacity(2);
                if source_local {
                    deltas.push(BalanceDelta {
                        account_number: from_account.clone(),
                        delta: -debit,
                    });
                }
                if dest_local {
                    deltas.push(BalanceDelta {
                        account_number: spec.to_account_number.clone(),
                        delta: credit,
                    });
                }
                Ok(deltas)
            }
        }
    }

    /// Read-only check that `spec` would currently apply.
    pub async fn preflight(&self, spec: &TransferSpec) -> Result<(), LedgerError> {
        for d in self.plan(spec)? {
            let account = self
                .store
                .find_account(&d.account_number)
                .await?
                .ok_or_else(|| LedgerError::AccountNotFound(d.account_number.clone()))?;
            let next = account.balance.checked_add(d.delta).ok_or(LedgerError::Overflow)?;
            if next < Decimal::ZERO {
                return Err(LedgerError::InsufficientBalance(d.account_number));
            }
        }
        Ok(())
    }

    /// Apply `spec` atomically and return the persisted transaction.
    pub async fn apply_transaction(&self, spec: TransferSpec) -> Result<Transaction, LedgerError> {
        let deltas = self.plan(&spec)?;
        let committed = self.store.commit(&deltas, &spec).await;
        match committed {
            Ok(tx) if !tx.matches(&spec) => {
                let key = spec.idempotency_key.unwrap_or_default();
                tracing::warn!(
                    idempotency_key = %key,
                    recorded = tx.transaction_id,
                    "Idempotency key reused for a different transaction"
                );
                Err(LedgerError::IdempotencyConflict(key))
            }
            Ok(tx) => {
                tracing::info!(
                    transaction_id = tx.transaction_id,
                    kind = ?tx.transaction_type,
                    from = ?tx.from_account_number,
                    to = %tx.to_account_number,
                    amount = %tx.amount,
                    fee = %tx.fee_amount,
                    "Ledger transaction applied"
                );
                Ok(tx)
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::error!(error = %e, "Ledger storage failure");
                } else {
                    tracing::warn!(code = e.code(), error = %e, "Ledger transaction rejected");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedgerStore;
    use proptest::prelude::*;

    const OWN: i64 = 1;
    const PARTNER: i64 = 2;

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    async fn engine_with(accounts: &[(&str, i64)]) -> (LedgerEngine, Arc<MemoryLedgerStore>) {
        let store = Arc::new(MemoryLedgerStore::new());
        for (i, (number, balance)) in accounts.iter().enumerate() {
            store
                .open_account(number, i as i64 + 1, dec(*balance))
                .await
                .unwrap();
        }
        (LedgerEngine::new(store.clone(), OWN), store)
    }

    async fn balance(store: &MemoryLedgerStore, number: &str) -> Decimal {
        store.find_account(number).await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn test_deposit_credits_destination() {
        let (engine, store) = engine_with(&[("X", 50)]).await;
        let tx = engine
            .apply_transaction(TransferSpec::deposit(OWN, "X", dec(100)))
            .await
            .unwrap();
        assert_eq!(tx.transaction_type, TransactionType::Deposit);
        assert_eq!(tx.from_account_number, None);
        assert_eq!(balance(&store, "X").await, dec(150));
    }

    #[tokio::test]
    async fn test_transfer_source_pays_fee() {
        let (engine, store) = engine_with(&[("A", 200), ("B", 0)]).await;
        let spec = TransferSpec::transfer(OWN, "A", OWN, "B", dec(100)).with_fee(dec(10), FeePayer::Source);
        engine.apply_transaction(spec).await.unwrap();
        assert_eq!(balance(&store, "A").await, dec(90));
        assert_eq!(balance(&store, "B").await, dec(100));
    }

    #[tokio::test]
    async fn test_transfer_destination_pays_fee() {
        let (engine, store) = engine_with(&[("A", 200), ("B", 0)]).await;
        let spec = TransferSpec::transfer(OWN, "A", OWN, "B", dec(100))
            .with_fee(dec(10), FeePayer::Destination);
        engine.apply_transaction(spec).await.unwrap();
        assert_eq!(balance(&store, "A").await, dec(100));
        assert_eq!(balance(&store, "B").await, dec(90));
    }

    #[tokio::test]
    async fn test_insufficient_balance_changes_nothing() {
        let (engine, store) = engine_with(&[("A", 50), ("B", 0)]).await;
        let spec = TransferSpec::transfer(OWN, "A", OWN, "B", dec(100));
        let err = engine.apply_transaction(spec).await.unwrap_err();
        assert_eq!(err, LedgerError::InsufficientBalance("A".into()));
        assert_eq!(balance(&store, "A").await, dec(50));
        assert_eq!(balance(&store, "B").await, dec(0));
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_fee_pushes_over_balance() {
        let (engine, _) = engine_with(&[("A", 100), ("B", 0)]).await;
        let spec = TransferSpec::transfer(OWN, "A", OWN, "B", dec(100)).with_fee(dec(1), FeePayer::Source);
        assert!(matches!(
            engine.apply_transaction(spec).await,
            Err(LedgerError::InsufficientBalance(_))
        ));
    }

    #[tokio::test]
    async fn test_outbound_only_debits_local_source() {
        let (engine, store) = engine_with(&[("A", 200)]).await;
        let spec = TransferSpec::transfer(OWN, "A", PARTNER, "REMOTE-1", dec(100))
            .with_fee(dec(5), FeePayer::Source);
        let tx = engine.apply_transaction(spec).await.unwrap();
        assert_eq!(tx.to_bank_id, PARTNER);
        assert_eq!(balance(&store, "A").await, dec(95));
    }

    #[tokio::test]
    async fn test_inbound_only_credits_local_destination() {
        let (engine, store) = engine_with(&[("B", 0)]).await;
        let spec = TransferSpec::transfer(PARTNER, "REMOTE-1", OWN, "B", dec(100))
            .with_fee(dec(3), FeePayer::Destination);
        engine.apply_transaction(spec).await.unwrap();
        assert_eq!(balance(&store, "B").await, dec(97));
    }

    #[tokio::test]
    async fn test_inbound_source_pays_credits_full_amount() {
        let (engine, store) = engine_with(&[("B", 0)]).await;
        let spec = TransferSpec::transfer(PARTNER, "REMOTE-1", OWN, "B", dec(100))
            .with_fee(dec(3), FeePayer::Source);
        engine.apply_transaction(spec).await.unwrap();
        assert_eq!(balance(&store, "B").await, dec(100));
    }

    #[tokio::test]
    async fn test_missing_destination() {
        let (engine, store) = engine_with(&[("A", 100)]).await;
        let spec = TransferSpec::transfer(OWN, "A", OWN, "NOPE", dec(10));
        assert_eq!(
            engine.apply_transaction(spec).await,
            Err(LedgerError::AccountNotFound("NOPE".into()))
        );
        assert_eq!(balance(&store, "A").await, dec(100));
    }

    #[tokio::test]
    async fn test_idempotent_replay_returns_recorded_transaction() {
        let (engine, store) = engine_with(&[("A", 100), ("B", 0)]).await;
        let spec = TransferSpec::transfer(OWN, "A", OWN, "B", dec(30)).with_idempotency_key("k-1");
        let first = engine.apply_transaction(spec.clone()).await.unwrap();
        let again = engine.apply_transaction(spec).await.unwrap();
        assert_eq!(again.transaction_id, first.transaction_id);
        assert_eq!(balance(&store, "A").await, dec(70));
        assert_eq!(store.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_reused_key_for_different_transfer_conflicts() {
        let (engine, store) = engine_with(&[("A", 100), ("B", 0), ("C", 0)]).await;
        let first = TransferSpec::transfer(OWN, "A", OWN, "B", dec(30)).with_idempotency_key("k-1");
        engine.apply_transaction(first).await.unwrap();

        let other = TransferSpec::transfer(OWN, "A", OWN, "C", dec(50)).with_idempotency_key("k-1");
        assert_eq!(
            engine.apply_transaction(other).await,
            Err(LedgerError::IdempotencyConflict("k-1".into()))
        );
        assert_eq!(balance(&store, "A").await, dec(70));
        assert_eq!(balance(&store, "C").await, dec(0));
        assert_eq!(store.transaction_count(), 1);
    }

    #[test]
    fn test_plan_validation() {
        let engine = LedgerEngine::new(Arc::new(MemoryLedgerStore::new()), OWN);

        let zero = TransferSpec::transfer(OWN, "A", OWN, "B", dec(0));
        assert_eq!(engine.plan(&zero), Err(LedgerError::InvalidAmount));

        let negative_fee =
            TransferSpec::transfer(OWN, "A", OWN, "B", dec(10)).with_fee(dec(-1), FeePayer::Source);
        assert_eq!(engine.plan(&negative_fee), Err(LedgerError::InvalidFee));

        let same = TransferSpec::transfer(OWN, "A", OWN, "A", dec(10));
        assert_eq!(engine.plan(&same), Err(LedgerError::SameAccount));

        let remote = TransferSpec::transfer(PARTNER, "A", 3, "B", dec(10));
        assert!(matches!(
            engine.plan(&remote),
            Err(LedgerError::InvalidTransaction(_))
        ));

        let big_fee = TransferSpec::transfer(OWN, "A", OWN, "B", dec(10))
            .with_fee(dec(11), FeePayer::Destination);
        assert_eq!(engine.plan(&big_fee), Err(LedgerError::FeeExceedsAmount));

        let remote_deposit = TransferSpec::deposit(PARTNER, "B", dec(10));
        assert!(engine.plan(&remote_deposit).is_err());

        let fee_deposit = TransferSpec::deposit(OWN, "B", dec(10)).with_fee(dec(1), FeePayer::Source);
        assert!(engine.plan(&fee_deposit).is_err());
    }

    #[tokio::test]
    async fn test_preflight_is_read_only() {
        let (engine, store) = engine_with(&[("A", 100), ("B", 0)]).await;
        let ok = TransferSpec::transfer(OWN, "A", OWN, "B", dec(60));
        engine.preflight(&ok).await.unwrap();
        let too_much = TransferSpec::transfer(OWN, "A", OWN, "B", dec(160));
        assert!(engine.preflight(&too_much).await.is_err());
        assert_eq!(balance(&store, "A").await, dec(100));
        assert_eq!(store.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_transfers_never_overdraw() {
        let (engine, store) = engine_with(&[("A", 100), ("B", 100), ("C", 100)]).await;
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for i in 0..60 {
            let engine = engine.clone();
            let (from, to) = match i % 3 {
                0 => ("A", "B"),
                1 => ("B", "C"),
                _ => ("C", "A"),
            };
            handles.push(tokio::spawn(async move {
                let spec = TransferSpec::transfer(OWN, from, OWN, to, dec(15))
                    .with_fee(dec(1), FeePayer::Source);
                engine.apply_transaction(spec).await
            }));
        }
        let results = futures::future::join_all(handles).await;
        let applied = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count() as i64;

        for acct in ["A", "B", "C"] {
            assert!(balance(&store, acct).await >= Decimal::ZERO);
        }
        // each applied transfer burns exactly its fee
        assert_eq!(store.total_balance().await, dec(300 - applied));
        assert_eq!(store.transaction_count() as i64, applied);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_balances_never_negative_and_fees_conserved(
            ops in proptest::collection::vec((0usize..3, 0usize..3, 1i64..80, 0i64..10, any::<bool>()), 1..40)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (engine, store) = engine_with(&[("A", 100), ("B", 100), ("C", 100)]).await;
                let names = ["A", "B", "C"];
                let mut burned = Decimal::ZERO;

                for (from, to, amount, fee, source_pays) in ops {
                    let payer = if source_pays { FeePayer::Source } else { FeePayer::Destination };
                    let spec = TransferSpec::transfer(OWN, names[from], OWN, names[to], dec(amount))
                        .with_fee(dec(fee), payer);
                    if engine.apply_transaction(spec).await.is_ok() {
                        burned += dec(fee);
                    }
                    for n in names {
                        prop_assert!(balance(&store, n).await >= Decimal::ZERO);
                    }
                }
                prop_assert_eq!(store.total_balance().await + burned, dec(300));
                Ok(())
            })?;
        }
    }
}
