use std::sync::Arc;

use axum::{Extension, Json, extract::State};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, TransactionView, ok};
use crate::ledger::TransferSpec;
use crate::user_auth::Claims;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub account_number: String,
    pub amount: Decimal,
    #[serde(default)]
    pub message: String,
}

/// POST /staff/deposits
///
/// Staff-only cash deposit into a local account.
pub async fn create_deposit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<TransactionView> {
    if !claims.is_staff() {
        return ApiError::forbidden("staff role required").into_err();
    }

    let spec = TransferSpec::deposit(state.ledger.own_bank_id(), req.account_number, req.amount)
        .with_message(req.message);
    let transaction = state.ledger.apply_transaction(spec).await?;
    tracing::info!(
        staff = %claims.sub,
        transaction_id = transaction.transaction_id,
        "Deposit recorded"
    );
    ok(transaction.into())
}
