//! Gateway types module
//!
//! - [`response`]: `ApiResponse<T>`, error codes and response DTOs
//! - [`error`]: `ApiError` and the mapping from domain errors

pub mod error;
pub mod response;

pub use error::{ApiError, ApiResult, OTP_INVALID_MESSAGE, ok};
pub use response::{ApiResponse, DebtPaymentView, OtpTokenResponse, TransactionView, error_codes};
