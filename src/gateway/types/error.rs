//! Customer-facing error mapping.
//!
//! Ledger errors keep their precise message. OTP failures collapse to one
//! message. Internal and storage failures never carry detail.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::response::{ApiResponse, error_codes};
use crate::debts::DebtError;
use crate::ledger::LedgerError;
use crate::otp::OtpError;
use crate::settlement::SettlementError;

pub const OTP_INVALID_MESSAGE: &str = "invalid or expired code";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, error_codes::FORBIDDEN, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, msg)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            "internal error",
        )
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }

    pub fn otp_invalid() -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::OTP_INVALID, OTP_INVALID_MESSAGE)
    }

    pub fn into_err<T>(self) -> Result<T, Self> {
        Err(self)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.code, self.msg))).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
        match e {
            LedgerError::Storage(_) => Self::service_unavailable("storage unavailable"),
            LedgerError::AccountNotFound(_) => Self::new(status, error_codes::ACCOUNT_NOT_FOUND, e.to_string()),
            LedgerError::InsufficientBalance(_) => {
                Self::new(status, error_codes::INSUFFICIENT_BALANCE, e.to_string())
            }
            // Stored keys are namespaced; do not echo them back
            LedgerError::IdempotencyConflict(_) => Self::new(
                status,
                error_codes::CONFLICT,
                "idempotency key already used for a different transaction",
            ),
            _ => Self::new(status, error_codes::INVALID_PARAMETER, e.to_string()),
        }
    }
}

impl From<OtpError> for ApiError {
    fn from(e: OtpError) -> Self {
        if e.is_internal() {
            Self::service_unavailable("OTP service unavailable")
        } else {
            Self::otp_invalid()
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(e: SettlementError) -> Self {
        let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
        match e {
            SettlementError::Ledger(inner) => inner.into(),
            SettlementError::UnknownBank(_) | SettlementError::NoEndpoint(_) => {
                Self::new(status, error_codes::UNKNOWN_BANK, e.to_string())
            }
            SettlementError::RemoteUnreachable(_) => Self::new(
                status,
                error_codes::REMOTE_UNREACHABLE,
                "partner bank unreachable, transfer not executed",
            ),
            SettlementError::RemoteSignatureInvalid | SettlementError::RemoteRejected { .. } => Self::new(
                status,
                error_codes::REMOTE_REJECTED,
                "partner bank did not confirm the transfer",
            ),
            SettlementError::Crypto(_) | SettlementError::Internal(_) => Self::internal(),
        }
    }
}

impl From<DebtError> for ApiError {
    fn from(e: DebtError) -> Self {
        match e {
            DebtError::Otp(inner) => inner.into(),
            DebtError::Ledger(inner) => inner.into(),
            DebtError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, error_codes::DEBT_NOT_FOUND, e.to_string()),
            DebtError::NotDebtor => Self::forbidden(e.to_string()),
            DebtError::NotPending => Self::new(StatusCode::CONFLICT, error_codes::CONFLICT, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_reasons_collapse() {
        for e in [OtpError::AlreadyUsed, OtpError::Expired, OtpError::InvalidCode, OtpError::WrongUser] {
            assert_eq!(ApiError::from(e), ApiError::otp_invalid());
        }
        assert_eq!(
            ApiError::from(OtpError::Storage("down".into())).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_ledger_errors_are_precise() {
        let e = ApiError::from(LedgerError::InsufficientBalance("A-1".into()));
        assert_eq!(e.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(e.code, error_codes::INSUFFICIENT_BALANCE);
        assert!(e.msg.contains("A-1"));
    }

    #[test]
    fn test_idempotency_conflict_is_409() {
        let e = ApiError::from(SettlementError::Ledger(LedgerError::IdempotencyConflict(
            "cust:10:order-1".into(),
        )));
        assert_eq!(e.status, StatusCode::CONFLICT);
        assert_eq!(e.code, error_codes::CONFLICT);
        assert!(!e.msg.contains("cust:10"));
    }

    #[test]
    fn test_storage_detail_hidden() {
        let e = ApiError::from(LedgerError::Storage("connection reset by 10.0.0.3".into()));
        assert_eq!(e.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!e.msg.contains("10.0.0.3"));
    }

    #[test]
    fn test_remote_failures() {
        let e = ApiError::from(SettlementError::RemoteUnreachable("timeout".into()));
        assert_eq!(e.status, StatusCode::GATEWAY_TIMEOUT);
        let e = ApiError::from(SettlementError::RemoteSignatureInvalid);
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);
    }
}
