pub mod debts;
pub mod deposits;
pub mod health;
pub mod partner;
pub mod transactions;

pub use debts::{confirm_debt_payment, request_debt_otp};
pub use deposits::create_deposit;
pub use health::health_check;
pub use partner::{partner_account_info, partner_transaction};
pub use transactions::{request_otp, verify_otp};

use super::types::ApiError;
use crate::user_auth::Claims;

/// Customer id of the authenticated caller.
fn user_id(claims: &Claims) -> Result<i64, ApiError> {
    claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid token subject"))
}
