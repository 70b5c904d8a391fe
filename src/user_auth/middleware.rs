use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResponse, error_codes};

type Rejection = (StatusCode, Json<ApiResponse<()>>);

fn reject(code: i32, msg: &str) -> Rejection {
    (StatusCode::UNAUTHORIZED, Json(ApiResponse::<()>::error(code, msg)))
}

/// Require `Authorization: Bearer <jwt>` and expose the verified [`Claims`]
/// to handlers as an extension.
///
/// [`Claims`]: super::Claims
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Rejection> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| reject(error_codes::MISSING_AUTH, "Missing Authorization header"))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| reject(error_codes::AUTH_FAILED, "Invalid token format"))?;

    // Subjects must be numeric customer ids
    let claims = state
        .auth
        .verify_token(token)
        .ok()
        .filter(|c| c.user_id().is_some())
        .ok_or_else(|| reject(error_codes::AUTH_FAILED, "Invalid or expired token"))?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
