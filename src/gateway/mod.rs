pub mod handlers;
pub mod state;
pub mod types;

use axum::{Router, middleware::from_fn_with_state, routing::{get, post}};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::partner::{AccountInfoRequest, TransactionPayload, partner_guard};
use state::AppState;

/// Assemble every route.
///
/// - `/partner/*`: envelope-guarded, no bearer token
/// - `/transactions/*`, `/debts/*`, `/staff/*`: bearer token required
/// - `/api/v1/health`: public
pub fn build_router(state: Arc<AppState>) -> Router {
    let partner_routes = Router::new()
        .route(
            "/transaction",
            post(handlers::partner_transaction).layer(from_fn_with_state(
                state.guard.clone(),
                partner_guard::<TransactionPayload>,
            )),
        )
        .route(
            "/get-account-info",
            post(handlers::partner_account_info).layer(from_fn_with_state(
                state.guard.clone(),
                partner_guard::<AccountInfoRequest>,
            )),
        );

    let customer_routes = Router::new()
        .route("/transactions/request_otp", post(handlers::request_otp))
        .route("/transactions/verify_otp", post(handlers::verify_otp))
        .route("/debts/{debt_id}/request_otp", post(handlers::request_debt_otp))
        .route(
            "/debts/{debt_id}/confirm_payment",
            post(handlers::confirm_debt_payment),
        )
        .route("/staff/deposits", post(handlers::create_deposit))
        .layer(from_fn_with_state(
            state.clone(),
            crate::user_auth::jwt_auth_middleware,
        ));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/partner", partner_routes)
        .merge(customer_routes)
        .with_state(state)
}

/// Start HTTP Gateway server
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("Partner API: /partner/transaction, /partner/get-account-info");
    axum::serve(listener, app).await?;
    Ok(())
}
