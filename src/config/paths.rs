//! Per-user storage locations.
//!
//! Everything lives in the platform's application-support directory:
//! - macOS: `~/Library/Application Support/termdir`
//! - Linux: `~/.local/share/termdir`
//! - Windows: `%APPDATA%\termdir`

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Directory name under the platform data directory.
pub const APP_DIR_NAME: &str = "termdir";

/// File name of the trust store.
pub const KNOWN_HOSTS_FILE: &str = "known_hosts";

/// Returns the application-support directory, if the platform has one.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME))
}

/// Returns `<dir>/known_hosts`, creating `dir` if needed.
///
/// Without a directory the bare relative name is used. Failure to create
/// the directory is not an error here; writing the file will fail later
/// and be logged there.
#[must_use]
pub fn known_hosts_path_in(dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) => {
            if let Err(e) = fs::create_dir_all(dir) {
                debug!("Could not create {}: {}", dir.display(), e);
            }
            dir.join(KNOWN_HOSTS_FILE)
        }
        None => PathBuf::from(KNOWN_HOSTS_FILE),
    }
}

/// Expands a leading `~` to the home directory.
#[must_use]
pub fn expand_home(value: &str) -> PathBuf {
    if value == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(value));
    }
    match (value.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(value),
    }
}
