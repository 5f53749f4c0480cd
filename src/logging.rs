//! Logging setup for tabml
//!
//! Console output plus a daily-rotated log file in the platform data directory.
//! Pipeline code only uses `tracing` macros; nothing here is required for the
//! library to work, so embedders can install their own subscriber instead.
//!
//! ```no_run
//! tabml::logging::init().expect("Failed to initialize logging");
//! tracing::info!("ready");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Gets the log directory path based on platform conventions
///
/// Returns:
/// - Windows: `%APPDATA%/tabml/logs`
/// - macOS: `~/Library/Application Support/tabml/logs`
/// - Linux: `~/.local/share/tabml/logs`
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    let log_dir = base_dir.join("tabml").join("logs");

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }

    Ok(log_dir)
}

/// Initializes logging into the default log directory.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or a subscriber is
/// already installed.
pub fn init() -> Result<()> {
    init_in(&get_log_dir()?)
}

/// Initializes logging with console output and a rolling `tabml.<date>.log`
/// file in `log_dir`. Level defaults to INFO, `RUST_LOG` overrides it.
pub fn init_in(log_dir: &Path) -> Result<()> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix("tabml")
        .filename_suffix("log")
        .build(log_dir)
        .context("Failed to create log file appender")?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(file_appender)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!("Logging initialized, log directory: {}", log_dir.display());
    Ok(())
}

/// Gets the path to today's log file
pub fn get_current_log_path() -> Result<PathBuf> {
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    Ok(get_log_dir()?.join(format!("tabml.{today}.log")))
}
