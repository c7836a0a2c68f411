use std::path::Path;

use tracing_appender::non_blocking;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::AppError;

/// Initializes logging to stdout and a daily-rotated file under `log_dir`.
///
/// The filter defaults to `cita_bot=info` and can be overridden with `RUST_LOG`.
pub fn setup_logging(log_dir: &Path) -> Result<(), AppError> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("cita-bot")
        .filename_suffix("log")
        .max_log_files(7)
        .build(log_dir)
        .map_err(|e| AppError::ConfigurationError { msg: format!("Failed to create file appender: {e}") })?;

    let (non_blocking_appender, _guard) = non_blocking(file_appender);
    // The guard must live for the whole process or buffered lines are lost.
    std::mem::forget(_guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cita_bot=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking_appender).with_ansi(false))
        .init();

    Ok(())
}
