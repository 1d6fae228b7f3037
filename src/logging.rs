//! Logging setup.
//!
//! Progress goes to stderr. Unless disabled, every run also writes a
//! timestamped log file to `<data_dir>/logs/`; files older than the
//! retention period are removed at startup.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{Config, DEFAULT_LOG_LEVEL};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error, off).
    pub level: String,
    /// Log retention period in hours.
    pub retention_hours: u32,
    /// Directory for log files.
    pub log_dir: PathBuf,
    /// Write a log file in addition to stderr.
    pub file_output: bool,
}

impl LogConfig {
    /// Builds the logging configuration from the updater config.
    #[must_use]
    pub fn from_config(config: &Config, data_dir: &Path) -> Self {
        Self {
            level: Self::parse_level(&config.log_level),
            retention_hours: config.log_retention_hours,
            log_dir: log_directory(data_dir),
            file_output: true,
        }
    }

    /// Normalizes a log level name.
    #[must_use]
    pub fn parse_level(value: &str) -> String {
        match value.trim().to_lowercase().as_str() {
            "trace" => "trace".to_string(),
            "debug" => "debug".to_string(),
            "info" => "info".to_string(),
            "warn" | "warning" => "warn".to_string(),
            "error" => "error".to_string(),
            "off" | "none" | "disabled" => "off".to_string(),
            _ => DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Returns the log directory inside `data_dir`.
#[must_use]
pub fn log_directory(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// Returns a fresh log file path in `log_dir`.
#[must_use]
pub fn new_log_path(log_dir: &Path) -> PathBuf {
    let now = chrono::Local::now();
    log_dir.join(format!("modupdater_{}.log", now.format("%Y-%m-%d_%H-%M-%S")))
}

/// Deletes `.log` files in `log_dir` older than `retention_hours`.
pub fn cleanup_old_logs(log_dir: &Path, retention_hours: u32) -> io::Result<u32> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let retention = Duration::from_secs(u64::from(retention_hours) * 3600);
    let now = SystemTime::now();
    let mut deleted = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }

        let expired = fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > retention);

        if expired && fs::remove_file(&path).is_ok() {
            deleted += 1;
        }
    }

    Ok(deleted)
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level. Returns the log file path
/// when file output is enabled.
pub fn init(config: &LogConfig) -> io::Result<Option<PathBuf>> {
    if config.level == "off" {
        return Ok(None);
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time();

    let mut deleted = 0;
    let (file_layer, log_path) = if config.file_output {
        fs::create_dir_all(&config.log_dir)?;
        deleted = cleanup_old_logs(&config.log_dir, config.retention_hours)?;

        let log_path = new_log_path(&config.log_dir);
        let log_file = File::create(&log_path)?;
        let layer = fmt::layer()
            .with_writer(log_file.with_max_level(tracing::Level::TRACE))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(false);
        (Some(layer), Some(log_path))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = &log_path {
        tracing::debug!("[LOG] Log file: {}", path.display());
        tracing::debug!("[LOG] Log retention: {} hours", config.retention_hours);
    }
    if deleted > 0 {
        tracing::debug!("[LOG] Cleaned up {} old log file(s)", deleted);
    }

    Ok(log_path)
}
