use crate::config::log_dir;
use crate::error::AppError;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "sources-admin.log";

/// Builds the filter from `RUST_LOG`, falling back to the configured directive.
pub fn build_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Routes tracing output to a daily rolling file so the terminal UI owns
/// stdout. Keep the guard alive until exit to flush buffered lines.
pub fn init(fallback_filter: &str) -> Result<WorkerGuard, AppError> {
    let dir = log_dir()?;
    fs::create_dir_all(&dir)?;

    let file_appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(build_filter(fallback_filter))
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("logging already initialised: {e}")))?;

    Ok(guard)
}
