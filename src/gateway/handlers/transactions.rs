//! OTP-gated customer transfers.
//!
//! POST /transactions/request_otp  -> {otpToken, message}
//! POST /transactions/verify_otp   -> executes the transfer

use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, OtpTokenResponse, TransactionView, ok};
use super::user_id;
use crate::ledger::{FeePayer, TransferSpec};
use crate::settlement::OutboundTransfer;
use crate::user_auth::Claims;

pub const OTP_SENT_MESSAGE: &str = "OTP sent";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_account_number: String,
    /// Absent or this bank's code means an internal transfer
    #[serde(default)]
    pub to_bank_code: Option<String>,
    pub to_account_number: String,
    pub amount: Decimal,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_fee_payer")]
    pub fee_payer: FeePayer,
    #[serde(default)]
    pub fee_amount: Decimal,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

fn default_fee_payer() -> FeePayer {
    FeePayer::Source
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub otp: String,
    pub otp_token: String,
    pub transaction: TransferRequest,
}

/// Customer-chosen keys live in their own namespace, apart from system keys
/// such as `debt-{id}` and from other customers' keys.
pub fn customer_key(user_id: i64, key: &str) -> String {
    format!("cust:{}:{}", user_id, key)
}

pub async fn request_otp(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<OtpTokenResponse> {
    let user = user_id(&claims)?;
    let issued = state.otp.request(user, "transfer").await?;
    ok(OtpTokenResponse {
        otp_token: issued.token,
        message: OTP_SENT_MESSAGE.to_string(),
    })
}

pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<VerifyOtpRequest>,
) -> ApiResult<TransactionView> {
    let user = user_id(&claims)?;
    let tx = req.transaction;

    let source = state
        .ledger
        .find_account(&tx.from_account_number)
        .await?
        .filter(|a| a.customer_id == user)
        .ok_or_else(|| ApiError::forbidden("source account does not belong to this customer"))?;

    state.otp.verify(&req.otp, &req.otp_token, user).await?;

    let idempotency_key = tx.idempotency_key.map(|k| customer_key(user, &k));
    let to_bank = tx.to_bank_code.as_deref().filter(|c| !c.is_empty());
    let transaction = if state.is_local_bank(to_bank) {
        let own = state.ledger.own_bank_id();
        let mut spec = TransferSpec::transfer(own, source.account_number, own, tx.to_account_number, tx.amount)
            .with_fee(tx.fee_amount, tx.fee_payer)
            .with_message(tx.message);
        if let Some(key) = idempotency_key {
            spec = spec.with_idempotency_key(key);
        }
        state.ledger.apply_transaction(spec).await?
    } else {
        let result = state
            .settlement
            .initiate_outbound(OutboundTransfer {
                from_account_number: source.account_number,
                to_bank_code: to_bank.unwrap_or_default().to_string(),
                to_account_number: tx.to_account_number,
                amount: tx.amount,
                message: tx.message,
                fee_payer: tx.fee_payer,
                fee_amount: tx.fee_amount,
                idempotency_key,
            })
            .await?;
        result.transaction
    };

    tracing::info!(
        user_id = user,
        transaction_id = transaction.transaction_id,
        "Customer transfer executed"
    );
    ok(transaction.into())
}
