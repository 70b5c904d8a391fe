//! Partner-bank endpoints. Both run behind `partner_guard`, so handlers only
//! see payloads that already passed every check.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResponse, error_codes};
use crate::ledger::LedgerError;
use crate::partner::{AccountInfoRequest, TransactionPayload, Verified};
use crate::settlement::SettlementError;

/// POST /partner/transaction
///
/// Always answers with a signed envelope; business rejections carry their
/// status inside it and in the HTTP status.
pub async fn partner_transaction(
    State(state): State<Arc<AppState>>,
    Extension(request): Extension<Verified<TransactionPayload>>,
) -> Response {
    match state.settlement.handle_inbound(request).await {
        Ok(outcome) => {
            let status = StatusCode::from_u16(outcome.status.status_code).unwrap_or(StatusCode::BAD_REQUEST);
            (status, Json(outcome.response)).into_response()
        }
        Err(e) => {
            tracing::error!(code = e.code(), error = %e, "Inbound settlement failed");
            partner_failure(e).into_response()
        }
    }
}

/// POST /partner/get-account-info
pub async fn partner_account_info(
    State(state): State<Arc<AppState>>,
    Extension(request): Extension<Verified<AccountInfoRequest>>,
) -> Response {
    match state.settlement.account_info(request).await {
        Ok(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
        Err(SettlementError::Ledger(LedgerError::AccountNotFound(_))) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(
                error_codes::ACCOUNT_NOT_FOUND,
                "account not found",
            )),
        )
            .into_response(),
        Err(e) => partner_failure(e).into_response(),
    }
}

fn partner_failure(e: SettlementError) -> ApiError {
    match e {
        SettlementError::Ledger(LedgerError::Storage(_)) => ApiError::service_unavailable("temporarily unavailable"),
        _ => ApiError::internal(),
    }
}
