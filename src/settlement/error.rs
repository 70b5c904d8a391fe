use thiserror::Error;

use crate::crypto::CryptoError;
use crate::ledger::LedgerError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Unknown bank: {0}")]
    UnknownBank(String),

    #[error("No endpoint configured for bank {0}")]
    NoEndpoint(String),

    #[error("Partner unreachable: {0}")]
    RemoteUnreachable(String),

    #[error("Partner response failed verification")]
    RemoteSignatureInvalid,

    #[error("Partner rejected transfer ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SettlementError {
    pub fn code(&self) -> &'static str {
        match self {
            SettlementError::UnknownBank(_) => "UNKNOWN_BANK",
            SettlementError::NoEndpoint(_) => "NO_ENDPOINT",
            SettlementError::RemoteUnreachable(_) => "REMOTE_UNREACHABLE",
            SettlementError::RemoteSignatureInvalid => "REMOTE_SIGNATURE_INVALID",
            SettlementError::RemoteRejected { .. } => "REMOTE_REJECTED",
            SettlementError::Ledger(e) => e.code(),
            SettlementError::Crypto(_) | SettlementError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            SettlementError::UnknownBank(_) | SettlementError::NoEndpoint(_) => 400,
            SettlementError::RemoteUnreachable(_) => 504,
            SettlementError::RemoteSignatureInvalid | SettlementError::RemoteRejected { .. } => 502,
            SettlementError::Ledger(e) => e.http_status(),
            SettlementError::Crypto(_) | SettlementError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_keep_their_code() {
        let e: SettlementError = LedgerError::InsufficientBalance("A-1".into()).into();
        assert_eq!(e.code(), "INSUFFICIENT_BALANCE");
        assert_eq!(e.http_status(), 422);
    }

    #[test]
    fn test_remote_failures() {
        assert_eq!(SettlementError::RemoteUnreachable("timeout".into()).http_status(), 504);
        assert_eq!(SettlementError::RemoteSignatureInvalid.http_status(), 502);
        assert_eq!(
            SettlementError::RemoteRejected {
                status: 422,
                message: "no".into()
            }
            .code(),
            "REMOTE_REJECTED"
        );
    }
}
