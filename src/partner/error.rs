//! Inbound guard errors.
//!
//! Every rejection reaches the partner as the same opaque body; the precise
//! reason only goes to the audit log.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("envelope could not be parsed")]
    MalformedEnvelope,

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("payload could not be decrypted")]
    DecryptionFailed,

    #[error("decrypted payload could not be parsed")]
    MalformedPayload,

    #[error("bank not registered: {0}")]
    UnknownBank(String),

    #[error("timestamp {0} outside freshness window")]
    StaleRequest(i64),

    #[error("envelope already processed")]
    Replayed,

    #[error("integrity digest mismatch")]
    IntegrityMismatch,

    #[error("signature missing")]
    SignatureMissing,

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("request timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GuardError {
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::MalformedEnvelope => "MALFORMED_ENVELOPE",
            GuardError::UnsupportedMethod(_) => "UNSUPPORTED_METHOD",
            GuardError::DecryptionFailed => "DECRYPTION_FAILED",
            GuardError::MalformedPayload => "MALFORMED_PAYLOAD",
            GuardError::UnknownBank(_) => "UNKNOWN_BANK",
            GuardError::StaleRequest(_) | GuardError::Replayed => "STALE_REQUEST",
            GuardError::IntegrityMismatch => "INTEGRITY_MISMATCH",
            GuardError::SignatureMissing | GuardError::SignatureInvalid => "SIGNATURE_INVALID",
            GuardError::Timeout => "TIMEOUT",
            GuardError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            GuardError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            GuardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::FORBIDDEN,
        }
    }
}

/// JSON body for every partner-facing failure.
#[derive(Debug, Serialize)]
pub struct PartnerErrorResponse {
    pub code: i32,
    pub error: &'static str,
    pub message: &'static str,
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let body = match self {
            GuardError::Timeout => PartnerErrorResponse {
                code: 5040,
                error: "TIMEOUT",
                message: "request timed out",
            },
            GuardError::Internal(_) => PartnerErrorResponse {
                code: 5000,
                error: "INTERNAL_ERROR",
                message: "internal error",
            },
            _ => PartnerErrorResponse {
                code: 4030,
                error: "REQUEST_REJECTED",
                message: "request rejected",
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(GuardError::Replayed.code(), "STALE_REQUEST");
        assert_eq!(GuardError::StaleRequest(1).code(), "STALE_REQUEST");
        assert_eq!(GuardError::SignatureMissing.code(), "SIGNATURE_INVALID");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(
            GuardError::IntegrityMismatch.http_status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(GuardError::Timeout.http_status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_rejections_are_indistinguishable() {
        let mut bodies = Vec::new();
        for err in [
            GuardError::UnknownBank("Bank Z".into()),
            GuardError::IntegrityMismatch,
            GuardError::SignatureInvalid,
            GuardError::StaleRequest(0),
        ] {
            let resp = err.into_response();
            assert_eq!(resp.status(), StatusCode::FORBIDDEN);
            let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
                .await
                .unwrap();
            bodies.push(bytes);
        }
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    }
}
