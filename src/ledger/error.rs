use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Insufficient balance in account {0}")]
    InsufficientBalance(String),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Fee must not be negative")]
    InvalidFee,

    #[error("Fee exceeds the transferred amount")]
    FeeExceedsAmount,

    #[error("Source and destination account cannot be the same")]
    SameAccount,

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Amount would cause overflow")]
    Overflow,

    #[error("Idempotency key {0} already used for a different transaction")]
    IdempotencyConflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::InsufficientBalance(_) => "INSUFFICIENT_BALANCE",
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::InvalidFee => "INVALID_FEE",
            LedgerError::FeeExceedsAmount => "FEE_EXCEEDS_AMOUNT",
            LedgerError::SameAccount => "SAME_ACCOUNT",
            LedgerError::InvalidTransaction(_) => "INVALID_TRANSACTION",
            LedgerError::Overflow => "OVERFLOW",
            LedgerError::IdempotencyConflict(_) => "IDEMPOTENCY_CONFLICT",
            LedgerError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::InvalidAmount
            | LedgerError::InvalidFee
            | LedgerError::FeeExceedsAmount
            | LedgerError::SameAccount
            | LedgerError::InvalidTransaction(_)
            | LedgerError::Overflow => 400,
            LedgerError::IdempotencyConflict(_) => 409,
            LedgerError::AccountNotFound(_) | LedgerError::InsufficientBalance(_) => 422,
            LedgerError::Storage(_) => 503,
        }
    }

    /// Safe to retry with the same idempotency key.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Storage(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}
