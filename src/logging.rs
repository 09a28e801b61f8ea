//! Logging setup for stageline
//!
//! Logs go to the console and to daily-rotated files in the platform data directory:
//!
//! - `stageline.<date>.log`: everything at or above the active filter
//! - `error.<date>.log`: warnings and errors only
//!
//! The default filter is `info`, or `debug` with `--verbose`; `RUST_LOG` overrides both.
//!
//! ```no_run
//! stageline::logging::init(false).expect("Failed to initialize logging");
//! tracing::info!(stage = "Extract", "Starting stage");
//! ```

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Gets the log directory path based on platform conventions
///
/// Returns:
/// - Windows: `%APPDATA%/stageline/logs`
/// - macOS: `~/Library/Application Support/stageline/logs`
/// - Linux: `~/.local/share/stageline/logs`
///
/// # Errors
///
/// Returns error if the data directory is unknown or cannot be created
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;

    let log_dir = base_dir.join("stageline").join("logs");

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }

    Ok(log_dir)
}

/// Initializes console and file logging. Call once, at startup.
///
/// # Errors
///
/// Returns error if log directory cannot be created or file appenders fail
pub fn init(verbose: bool) -> Result<()> {
    let log_dir = get_log_dir()?;

    let all_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("stageline")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create all-logs file appender")?;

    let error_logs_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("error")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create error-logs file appender")?;

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Failed to create env filter")?;

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact();

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("A global subscriber is already installed")?;

    tracing::debug!(log_dir = %log_dir.display(), "Logging initialized");

    Ok(())
}

/// Gets the path to today's log file
///
/// # Errors
///
/// Same as [`get_log_dir`].
pub fn get_current_log_path() -> Result<PathBuf> {
    let log_dir = get_log_dir()?;
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    Ok(log_dir.join(format!("stageline.{today}.log")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_log_dir() {
        let log_dir = get_log_dir().expect("Failed to get log dir");
        assert!(log_dir.ends_with("stageline/logs") || log_dir.ends_with("stageline\\logs"));
    }

    #[test]
    fn test_current_log_path_is_dated() {
        let path = get_current_log_path().expect("Failed to get log path");
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert!(name.starts_with("stageline.") && name.ends_with(".log"), "{name}");
    }
}
