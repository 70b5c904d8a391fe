//! Inter-bank settlement node
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌────────────┐    ┌──────────┐
//! │ Customer │───▶│ Gateway  │───▶│ Settlement │───▶│ Partner  │
//! │  (JWT)   │    │  (OTP)   │    │  (Ledger)  │    │  (Envl)  │
//! └──────────┘    └──────────┘    └────────────┘    └──────────┘
//! ```
//!
//! Usage: `interbank_settlement [--env dev] [--port 8080]`

use std::sync::Arc;
use std::time::Duration;

use interbank_settlement::app::{self, Stores};
use interbank_settlement::config::AppConfig;
use interbank_settlement::db::Database;
use interbank_settlement::gateway;
use interbank_settlement::keys::KeyRegistry;
use interbank_settlement::logging::init_logging;
use interbank_settlement::partner::HttpPartnerTransport;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn main() {
    let env = get_env();
    let mut app_config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guards = init_logging(&app_config);

    tracing::info!(
        "Starting bank {} ({}) in {} mode, build {}",
        app_config.bank.code,
        app_config.bank.name,
        env,
        env!("GIT_HASH")
    );

    // Unusable key material is fatal before anything listens
    let keys = match KeyRegistry::load(&app_config.bank.code, &app_config.keys) {
        Ok(k) => Arc::new(k),
        Err(e) => {
            tracing::error!("Key registry failed to load: {}", e);
            eprintln!("❌ Key registry failed to load: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        partners = keys.partner_codes().count(),
        "Key registry loaded"
    );

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("❌ Failed to start tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(serve(app_config, keys)) {
        tracing::error!("Gateway stopped: {:#}", e);
        eprintln!("❌ Gateway stopped: {:#}", e);
        std::process::exit(1);
    }
}

async fn serve(config: AppConfig, keys: Arc<KeyRegistry>) -> anyhow::Result<()> {
    let (stores, pg_db) = match &config.postgres_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL...");
            let db = Database::connect(url).await?;
            db.migrate().await?;
            tracing::info!("✅ PostgreSQL connected, migrations applied");
            let stores = Stores::postgres(&db, &config).await?;
            (stores, Some(Arc::new(db)))
        }
        None => {
            tracing::warn!("postgres_url not set, using in-memory stores (state is lost on restart)");
            (Stores::in_memory(&config).await?, None)
        }
    };

    let transport = Arc::new(HttpPartnerTransport::new(Duration::from_millis(
        config.security.partner_timeout_ms,
    ))?);
    let state = app::assemble(&config, keys, stores, transport, app::log_delivery(), pg_db)?;

    app::spawn_purge_task(
        state.clone(),
        Duration::from_secs(config.otp.purge_interval_secs.max(1)),
    );

    gateway::run_server(&config.gateway.host, config.gateway.port, state).await
}
