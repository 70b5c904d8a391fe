use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;

use super::super::state::AppState;
use super::super::types::{ApiResult, DebtPaymentView, OtpTokenResponse, ok};
use super::transactions::OTP_SENT_MESSAGE;
use super::user_id;
use crate::user_auth::Claims;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub otp: String,
    pub otp_token: String,
}

/// POST /debts/{debt_id}/request_otp
pub async fn request_debt_otp(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(debt_id): Path<i64>,
) -> ApiResult<OtpTokenResponse> {
    let user = user_id(&claims)?;
    let issued = state.debts.request_payment(user, debt_id).await?;
    ok(OtpTokenResponse {
        otp_token: issued.token,
        message: OTP_SENT_MESSAGE.to_string(),
    })
}

/// POST /debts/{debt_id}/confirm_payment
pub async fn confirm_debt_payment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(debt_id): Path<i64>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> ApiResult<DebtPaymentView> {
    let user = user_id(&claims)?;
    let (debt, transaction) = state
        .debts
        .confirm_payment(user, debt_id, &req.otp, &req.otp_token)
        .await?;
    ok(DebtPaymentView::new(debt, transaction))
}
