//! Configuration module for termdir.
//!
//! Handles loading and parsing the .termdirrc configuration file.

pub mod paths;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::directory::KeyType;
use crate::logging::LogConfig;

/// Default .termdirrc file content with all settings documented.
const DEFAULT_RC: &str = r#"# termdir Configuration File
# ==========================
# This file is read on startup.
# Lines starting with '#' are comments.
#
# Storage
# -------
# Directory holding the saved hosts and keys.
# Defaults to the platform's application-support directory.
# data_dir = ~/.local/share/termdir
#
# Known hosts file. Defaults to <data_dir>/known_hosts.
# known_hosts = ~/.local/share/termdir/known_hosts

# Key Generation
# --------------
# Key type for new keys: rsa, rsa:<bits>, ecdsa, enclave
# (enclave needs a secure element; the CLI falls back to software ecdsa)
# default_key_type = ecdsa
#
# RSA modulus size when default_key_type = rsa
# default_rsa_bits = 4096

# Logging Configuration
# ---------------------
# Logs are stored in <data_dir>/logs/ with automatic cleanup.
#
# log_enabled = true       # Enable/disable file logging (true/false)
# log_level = info         # Log level: trace, debug, info, warn, error, off
# log_retention = 24       # Hours to keep log files (default: 24)
"#;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for hosts and keys; `None` when the platform has none.
    pub data_dir: Option<PathBuf>,
    /// Explicit known-hosts path.
    pub known_hosts: Option<PathBuf>,
    /// Key type for new keys.
    pub default_key_type: KeyType,
    /// Path to config file.
    pub config_path: PathBuf,
    /// Logging configuration.
    pub log_config: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: paths::data_dir(),
            known_hosts: None,
            default_key_type: KeyType::Ecdsa { in_enclave: false },
            config_path: Self::default_config_path(),
            log_config: LogConfig::default(),
        }
    }
}

impl Config {
    /// Returns the default config file path (~/.termdirrc).
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".termdirrc")
    }

    /// Loads configuration from the default path, creating it if it doesn't exist.
    ///
    /// # Errors
    /// Returns error if config cannot be read.
    pub fn load() -> io::Result<Self> {
        let path = Self::default_config_path();
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    ///
    /// # Errors
    /// Returns error if config cannot be read.
    pub fn load_from(path: &Path) -> io::Result<Self> {
        // Create default config if it doesn't exist
        if !path.exists() {
            Self::create_default_config(path)?;
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self {
            config_path: path.to_path_buf(),
            ..Self::default()
        };
        config.parse(&content);
        Ok(config)
    }

    /// Creates the default config file.
    fn create_default_config(path: &Path) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_RC.as_bytes())?;
        Ok(())
    }

    /// Parses the config file content.
    pub fn parse(&mut self, content: &str) {
        let mut rsa_bits = None;

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse key = value
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                // Remove inline comments
                let value = value.split('#').next().unwrap_or(value).trim();

                if key == "default_rsa_bits" {
                    rsa_bits = value.parse::<u32>().ok().filter(|bits| *bits > 0);
                } else {
                    self.apply_setting(key, value);
                }
            }
        }

        if let (Some(bits), KeyType::Rsa { .. }) = (rsa_bits, self.default_key_type) {
            self.default_key_type = KeyType::Rsa { bits };
        }
    }

    /// Applies a single setting.
    fn apply_setting(&mut self, key: &str, value: &str) {
        match key {
            "data_dir" if !value.is_empty() => {
                self.data_dir = Some(paths::expand_home(value));
            }
            "known_hosts" if !value.is_empty() => {
                self.known_hosts = Some(paths::expand_home(value));
            }
            "default_key_type" => {
                if let Some(key_type) = KeyType::parse(value) {
                    self.default_key_type = key_type;
                }
            }
            "log_level" => {
                self.log_config.level = LogConfig::parse_level(value);
            }
            "log_retention" | "log_retention_hours" => {
                self.log_config.retention_hours = LogConfig::parse_retention(value);
            }
            "log_enabled" | "logging" => {
                self.log_config.enabled = parse_bool(value);
            }
            _ => {}
        }
    }

    /// Directory for the host and key blobs.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Known-hosts path: the explicit setting, else `<data_dir>/known_hosts`.
    #[must_use]
    pub fn known_hosts_path(&self) -> PathBuf {
        match &self.known_hosts {
            Some(path) => path.clone(),
            None => paths::known_hosts_path_in(self.data_dir.as_deref()),
        }
    }

    /// Directory for log files.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

/// Lenient boolean parsing.
fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "yes" | "1" | "on")
}
