//! File logging for termdir.
//!
//! Each run writes one timestamped file under `<data_dir>/logs/`.
//! Files older than the retention window are removed at startup.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default log retention in hours.
pub const DEFAULT_LOG_RETENTION_HOURS: u32 = 24;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Prefix of every log file name.
const LOG_FILE_PREFIX: &str = "termdir_";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Log retention period in hours.
    pub retention_hours: u32,
    /// Log level (trace, debug, info, warn, error, off).
    pub level: String,
    /// Whether logging is enabled.
    pub enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            retention_hours: DEFAULT_LOG_RETENTION_HOURS,
            level: DEFAULT_LOG_LEVEL.to_string(),
            enabled: true,
        }
    }
}

impl LogConfig {
    /// Normalizes a log level; unknown values fall back to the default.
    #[must_use]
    pub fn parse_level(value: &str) -> String {
        let level = match value.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" | "warning" => "warn",
            "error" => "error",
            "off" | "none" | "disabled" => "off",
            _ => DEFAULT_LOG_LEVEL,
        };
        level.to_string()
    }

    /// Parses retention hours from string.
    #[must_use]
    pub fn parse_retention(value: &str) -> u32 {
        value.parse().unwrap_or(DEFAULT_LOG_RETENTION_HOURS)
    }

    /// Returns true if nothing should be logged.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        !self.enabled || self.level == "off"
    }
}

/// Returns a fresh log file path inside `log_dir`.
#[must_use]
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    let now = chrono::Local::now();
    let filename = format!("{LOG_FILE_PREFIX}{}.log", now.format("%Y-%m-%d_%H-%M-%S"));
    log_dir.join(filename)
}

/// Removes `.log` files in `log_dir` older than `retention_hours`.
///
/// Returns the number of files removed. A missing directory removes nothing.
///
/// # Errors
/// Returns error if directory cannot be read.
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

        let age = fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());

        if age.is_some_and(|age| age > retention) && fs::remove_file(&path).is_ok() {
            deleted += 1;
        }
    }

    Ok(deleted)
}

/// Initializes the global subscriber, writing to a new file in `log_dir`.
///
/// `RUST_LOG` overrides the configured level. Returns the log file path,
/// or `None` when logging is disabled.
///
/// # Errors
/// Returns error if the directory or file cannot be created.
pub fn init(config: &LogConfig, log_dir: &Path) -> io::Result<Option<PathBuf>> {
    if config.is_disabled() {
        return Ok(None);
    }

    fs::create_dir_all(log_dir)?;
    let deleted = cleanup_old_logs(log_dir, config.retention_hours)?;

    let log_path = log_file_path(log_dir);
    let log_file = File::create(&log_path)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false);

    // A subscriber may already be installed (tests, embedding).
    if tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        return Ok(None);
    }

    tracing::info!("termdir logging initialized");
    tracing::info!("Log file: {}", log_path.display());
    tracing::info!("Log level: {}", config.level);
    if deleted > 0 {
        tracing::info!("Cleaned up {} old log file(s)", deleted);
    }

    Ok(Some(log_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.retention_hours, DEFAULT_LOG_RETENTION_HOURS);
        assert_eq!(config.level, DEFAULT_LOG_LEVEL);
        assert!(!config.is_disabled());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(LogConfig::parse_level("DEBUG"), "debug");
        assert_eq!(LogConfig::parse_level("warning"), "warn");
        assert_eq!(LogConfig::parse_level("none"), "off");
        assert_eq!(LogConfig::parse_level("loud"), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_parse_retention() {
        assert_eq!(LogConfig::parse_retention("48"), 48);
        assert_eq!(
            LogConfig::parse_retention("-1"),
            DEFAULT_LOG_RETENTION_HOURS
        );
    }

    #[test]
    fn test_disabled_init_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LogConfig {
            level: "off".to_string(),
            ..LogConfig::default()
        };

        assert_eq!(init(&config, &log_dir).unwrap(), None);
        assert!(!log_dir.exists());
    }

    #[test]
    fn test_cleanup_keeps_fresh_logs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("termdir_a.log"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        assert_eq!(cleanup_old_logs(dir.path(), 24).unwrap(), 0);
        assert!(dir.path().join("termdir_a.log").exists());
    }

    #[test]
    fn test_cleanup_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(&dir.path().join("nope"), 1).unwrap(), 0);
    }

    #[test]
    fn test_log_file_path_prefix() {
        let path = log_file_path(Path::new("/tmp/logs"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(LOG_FILE_PREFIX));
        assert!(name.ends_with(".log"));
    }
}
