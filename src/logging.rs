use crate::config::AppConfig;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::filter::{Targets, filter_fn};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Target for security-relevant events: guard rejections, OTP failures,
/// settlement outcomes. Routed to its own file in addition to the main log.
pub const AUDIT_TARGET: &str = "bank_audit";

/// Keeps both non-blocking writers alive; drop flushes pending lines.
pub struct LogGuards {
    _main: WorkerGuard,
    _audit: WorkerGuard,
}

fn appender(config: &AppConfig, file: &str) -> RollingFileAppender {
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, file),
        _ => tracing_appender::rolling::never(&config.log_dir, file),
    }
}

pub fn init_logging(config: &AppConfig) -> LogGuards {
    let (main_writer, main_guard) = tracing_appender::non_blocking(appender(config, &config.log_file));
    let (audit_writer, audit_guard) =
        tracing_appender::non_blocking(appender(config, &config.audit_log_file));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    // Audit events are kept at INFO and above regardless of RUST_LOG
    let audit_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_writer(audit_writer)
        .with_ansi(false)
        .with_filter(Targets::new().with_target(AUDIT_TARGET, Level::INFO));

    let registry = tracing_subscriber::registry().with(audit_layer);

    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(main_writer)
            .with_ansi(false)
            .with_filter(filter);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(main_writer)
            .with_ansi(false);
        let stdout_layer = fmt::layer()
            .with_target(false)
            .with_ansi(true)
            .with_filter(filter_fn(|meta| meta.target() != AUDIT_TARGET));
        registry
            .with(file_layer.and_then(stdout_layer).with_filter(filter))
            .init();
    }

    LogGuards {
        _main: main_guard,
        _audit: audit_guard,
    }
}
