use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Transaction type. Stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum TransactionType {
    Deposit = 1,
    Transfer = 2,
}

impl TransactionType {
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::Deposit),
            2 => Some(Self::Transfer),
            _ => None,
        }
    }
}

/// Who bears the fee. Wire names follow the partner protocol
/// (`sender` / `receiver`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum FeePayer {
    #[serde(rename = "sender", alias = "source", alias = "from")]
    Source = 1,
    #[serde(rename = "receiver", alias = "destination", alias = "to")]
    Destination = 2,
}

impl FeePayer {
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::Source),
            2 => Some(Self::Destination),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub account_id: i64,
    pub account_number: String,
    pub customer_id: i64,
    pub balance: Decimal,
}

/// Immutable record of one applied ledger operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub transaction_id: i64,
    pub from_bank_id: i64,
    pub from_account_number: Option<String>,
    pub to_bank_id: i64,
    pub to_account_number: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub message: String,
    pub fee_payer: FeePayer,
    pub fee_amount: Decimal,
    pub request_signature: Option<String>,
    pub response_signature: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Same money movement as `spec`. Message and signatures are not compared.
    pub fn matches(&self, spec: &TransferSpec) -> bool {
        self.transaction_type == spec.transaction_type
            && self.from_bank_id == spec.from_bank_id
            && self.from_account_number == spec.from_account_number
            && self.to_bank_id == spec.to_bank_id
            && self.to_account_number == spec.to_account_number
            && self.amount == spec.amount
            && self.fee_payer == spec.fee_payer
            && self.fee_amount == spec.fee_amount
    }
}

/// Input to `LedgerEngine::apply_transaction`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSpec {
    pub transaction_type: TransactionType,
    pub from_bank_id: i64,
    pub from_account_number: Option<String>,
    pub to_bank_id: i64,
    pub to_account_number: String,
    pub amount: Decimal,
    pub message: String,
    pub fee_payer: FeePayer,
    pub fee_amount: Decimal,
    pub request_signature: Option<String>,
    pub response_signature: Option<String>,
    pub idempotency_key: Option<String>,
}

impl TransferSpec {
    pub fn deposit(bank_id: i64, to_account_number: impl Into<String>, amount: Decimal) -> Self {
        Self {
            transaction_type: TransactionType::Deposit,
            from_bank_id: bank_id,
            from_account_number: None,
            to_bank_id: bank_id,
            to_account_number: to_account_number.into(),
            amount,
            message: String::new(),
            fee_payer: FeePayer::Source,
            fee_amount: Decimal::ZERO,
            request_signature: None,
            response_signature: None,
            idempotency_key: None,
        }
    }

    pub fn transfer(
        from_bank_id: i64,
        from_account_number: impl Into<String>,
        to_bank_id: i64,
        to_account_number: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            transaction_type: TransactionType::Transfer,
            from_bank_id,
            from_account_number: Some(from_account_number.into()),
            to_bank_id,
            to_account_number: to_account_number.into(),
            amount,
            message: String::new(),
            fee_payer: FeePayer::Source,
            fee_amount: Decimal::ZERO,
            request_signature: None,
            response_signature: None,
            idempotency_key: None,
        }
    }

    pub fn with_fee(mut self, fee_amount: Decimal, fee_payer: FeePayer) -> Self {
        self.fee_amount = fee_amount;
        self.fee_payer = fee_payer;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_signatures(mut self, request: Option<String>, response: Option<String>) -> Self {
        self.request_signature = request;
        self.response_signature = response;
        self
    }
}

/// Signed change to one local account balance. Negative means debit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    pub account_number: String,
    pub delta: Decimal,
}
