//! Customer-facing response envelope, its DTOs and numeric error codes.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::debts::{Debt, DebtStatus};
use crate::ledger::{FeePayer, Transaction, TransactionType};

/// `{code, msg, data}` body for every customer route.
///
/// `code` is [`error_codes::SUCCESS`] with `data` present, or an error code
/// with `data` omitted.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpTokenResponse {
    pub otp_token: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub transaction_id: i64,
    pub transaction_type: TransactionType,
    pub from_bank_id: i64,
    pub from_account_number: Option<String>,
    pub to_bank_id: i64,
    pub to_account_number: String,
    pub amount: Decimal,
    pub fee_amount: Decimal,
    pub fee_payer: FeePayer,
    pub message: String,
    pub created_at: String,
}

impl From<Transaction> for TransactionView {
    fn from(t: Transaction) -> Self {
        Self {
            transaction_id: t.transaction_id,
            transaction_type: t.transaction_type,
            from_bank_id: t.from_bank_id,
            from_account_number: t.from_account_number,
            to_bank_id: t.to_bank_id,
            to_account_number: t.to_account_number,
            amount: t.amount,
            fee_amount: t.fee_amount,
            fee_payer: t.fee_payer,
            message: t.message,
            created_at: t.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DebtPaymentView {
    pub debt_id: i64,
    pub status: DebtStatus,
    pub transaction: TransactionView,
}

impl DebtPaymentView {
    pub fn new(debt: Debt, transaction: Transaction) -> Self {
        Self {
            debt_id: debt.debt_id,
            status: debt.status,
            transaction: transaction.into(),
        }
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const ACCOUNT_NOT_FOUND: i32 = 1004;
    pub const OTP_INVALID: i32 = 1005;
    pub const UNKNOWN_BANK: i32 = 1006;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;
    pub const FORBIDDEN: i32 = 2003;

    // Resource errors (4xxx)
    pub const DEBT_NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4009;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
    pub const REMOTE_UNREACHABLE: i32 = 5002;
    pub const REMOTE_REJECTED: i32 = 5003;
}
