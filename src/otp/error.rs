use thiserror::Error;

/// Why a challenge failed. Callers show every variant as the same
/// "invalid or expired code"; the variant itself is for the audit log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OtpError {
    #[error("token malformed or signature invalid")]
    Malformed,

    #[error("token issued to another user")]
    WrongUser,

    #[error("challenge already used")]
    AlreadyUsed,

    #[error("challenge expired")]
    Expired,

    #[error("code does not match")]
    InvalidCode,

    #[error("token store unavailable: {0}")]
    Storage(String),

    #[error("token could not be issued: {0}")]
    Issue(String),
}

impl OtpError {
    pub fn reason(&self) -> &'static str {
        match self {
            OtpError::Malformed => "MALFORMED",
            OtpError::WrongUser => "WRONG_USER",
            OtpError::AlreadyUsed => "ALREADY_USED",
            OtpError::Expired => "EXPIRED",
            OtpError::InvalidCode => "INVALID_CODE",
            OtpError::Storage(_) => "STORAGE",
            OtpError::Issue(_) => "ISSUE",
        }
    }

    /// Infrastructure failures are not the user's fault and are reported as such.
    pub fn is_internal(&self) -> bool {
        matches!(self, OtpError::Storage(_) | OtpError::Issue(_))
    }
}

impl From<sqlx::Error> for OtpError {
    fn from(e: sqlx::Error) -> Self {
        OtpError::Storage(e.to_string())
    }
}
