//! Health check handler

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use super::super::state::AppState;
use super::super::types::{ApiResponse, error_codes};
use crate::crypto::now_ms;

/// Health check response data
#[derive(serde::Serialize)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds
    pub timestamp_ms: i64,
    pub bank_code: String,
    pub version: &'static str,
}

/// GET /api/v1/health
///
/// 200 with bank code and build version, or 503 when the configured
/// database does not answer. In-memory mode is always healthy.
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let ping = match &state.pg_db {
        Some(db) => db.health_check().await,
        None => Ok(()),
    };
    if let Err(e) = ping {
        tracing::error!(error = %e, "Health check: PostgreSQL ping failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse {
                code: error_codes::SERVICE_UNAVAILABLE,
                msg: "database unavailable".to_string(),
                data: None,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ApiResponse::success(HealthResponse {
            timestamp_ms: now_ms(),
            bank_code: state.own_bank_code.clone(),
            version: env!("GIT_HASH"),
        })),
    )
}
