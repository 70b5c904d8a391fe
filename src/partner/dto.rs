//! Decrypted payloads carried inside partner envelopes.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ledger::FeePayer;

/// Whether an endpoint accepts envelopes without a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    Required,
    /// Integrity digest alone is enough; a signature, if sent, is still checked
    IntegrityOnly,
}

/// A payload type accepted by the inbound guard.
///
/// The sender's bank code travels inside the encrypted payload, so the
/// guard learns who to verify against only after decryption.
pub trait PartnerPayload: DeserializeOwned + Clone + Send + Sync + 'static {
    const SIGNATURE_POLICY: SignaturePolicy = SignaturePolicy::Required;

    fn sender_bank_code(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    pub from_bank_code: String,
    pub from_account_number: String,
    pub to_bank_account_number: String,
    pub amount: Decimal,
    #[serde(default)]
    pub message: String,
    pub fee_payer: FeePayer,
    #[serde(default)]
    pub fee_amount: Decimal,
    /// Sender-chosen key; the receiving ledger applies each key at most once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl PartnerPayload for TransactionPayload {
    fn sender_bank_code(&self) -> &str {
        &self.from_bank_code
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfoRequest {
    #[serde(alias = "bankCode")]
    pub from_bank_code: String,
    pub account_number: String,
}

impl PartnerPayload for AccountInfoRequest {
    const SIGNATURE_POLICY: SignaturePolicy = SignaturePolicy::IntegrityOnly;

    fn sender_bank_code(&self) -> &str {
        &self.from_bank_code
    }
}

/// Response payload for `/partner/transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub status_code: u16,
    pub message: String,
    pub timestamp: i64,
    /// Echo of the request's idempotency key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl StatusPayload {
    pub const SUCCESS_MESSAGE: &'static str = "Transaction successful";

    pub fn success(reference: Option<String>, timestamp: i64) -> Self {
        Self {
            status_code: 200,
            message: Self::SUCCESS_MESSAGE.to_string(),
            timestamp,
            reference,
        }
    }

    pub fn failure(
        status_code: u16,
        message: impl Into<String>,
        reference: Option<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            status_code,
            message: message.into(),
            timestamp,
            reference,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Response payload for `/partner/get-account-info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub bank_code: String,
    pub account_number: String,
    pub customer_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_payload_wire_format() {
        let json = r#"{
            "fromBankCode": "Bank B",
            "fromAccountNumber": "B-001",
            "toBankAccountNumber": "A-001",
            "amount": 100.5,
            "message": "rent",
            "feePayer": "receiver",
            "feeAmount": 2
        }"#;
        let p: TransactionPayload = serde_json::from_str(json).unwrap();
        assert_eq!(p.amount, Decimal::new(1005, 1));
        assert_eq!(p.fee_payer, FeePayer::Destination);
        assert_eq!(p.fee_amount, Decimal::from(2));
        assert_eq!(p.idempotency_key, None);
        assert_eq!(p.sender_bank_code(), "Bank B");
    }

    #[test]
    fn test_policies() {
        assert_eq!(TransactionPayload::SIGNATURE_POLICY, SignaturePolicy::Required);
        assert_eq!(
            AccountInfoRequest::SIGNATURE_POLICY,
            SignaturePolicy::IntegrityOnly
        );
    }

    #[test]
    fn test_account_info_request_accepts_bank_code_alias() {
        let p: AccountInfoRequest =
            serde_json::from_str(r#"{"bankCode":"Bank B","accountNumber":"A-1"}"#).unwrap();
        assert_eq!(p.from_bank_code, "Bank B");
    }

    #[test]
    fn test_status_payload_success() {
        let s = StatusPayload {
            status_code: 200,
            message: StatusPayload::SUCCESS_MESSAGE.into(),
            timestamp: 1,
            reference: Some("k-7".into()),
        };
        assert!(s.is_success());
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["reference"], "k-7");
    }
}
