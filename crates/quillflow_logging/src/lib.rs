//! Shared logging utilities for Quillflow binaries.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "quillflow=info,quillflow_engine=info,quillflow_gen=info";

/// Logging configuration shared by Quillflow binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Also append logs to a file under the Quillflow home directory.
    pub log_to_file: bool,
}

/// Initialize tracing with stderr output and an optional append-only
/// log file.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let base_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if config.verbose {
                EnvFilter::new("debug")
            } else {
                EnvFilter::new(DEFAULT_LOG_FILTER)
            }
        })
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(base_filter());

    if config.log_to_file {
        let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
        let path = log_dir.join(format!("{}.log", config.app_name));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_filter(base_filter()),
            )
            .init();
    } else {
        tracing_subscriber::registry().with(stderr_layer).init();
    }

    Ok(())
}

/// Get the Quillflow home directory: ~/.quillflow
pub fn quillflow_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("QUILLFLOW_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".quillflow")
}

/// Get the logs directory: ~/.quillflow/logs
pub fn logs_dir() -> PathBuf {
    quillflow_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}
