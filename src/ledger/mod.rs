//! Ledger engine: fee-aware, atomic balance mutation.

pub mod engine;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod types;

pub use engine::LedgerEngine;
pub use error::LedgerError;
pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use store::LedgerStore;
pub use types::{Account, BalanceDelta, FeePayer, Transaction, TransactionType, TransferSpec};
