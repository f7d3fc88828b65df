//! Saved connection profiles.
//!
//! A [`Host`] is everything needed to open a session: where to connect,
//! how to authenticate, what to run on login, and how the session looks.
//! A handful of fields (theme, background, backspace behavior) can be
//! changed while a session is live; see [`Host::runtime_settings_differ`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Background value meaning "use whatever the settings say".
pub const INHERITED_BACKGROUND: &str = "default";

/// How a host authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Username and password.
    #[default]
    Password,
    /// Public key, referenced by [`Host::ssh_key`].
    Key,
}

impl AuthMethod {
    /// Returns the display name for this method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Key => "key",
        }
    }
}

/// A saved connection profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
    /// Stable identity.
    pub id: Uuid,
    /// Display name, also the upsert key when saving.
    pub alias: String,
    /// Hostname or IP address.
    pub hostname: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Authentication method.
    pub auth: AuthMethod,
    /// Login user.
    pub username: String,
    /// Plaintext password, if one was saved.
    pub password: Option<String>,
    /// Id of the [`Key`](super::Key) to authenticate with.
    ///
    /// This is a weak reference: the key may have been deleted since.
    pub ssh_key: Option<Uuid>,
    /// `NAME=value` assignments passed on connect.
    pub environment_variables: Vec<String>,
    /// Commands run after login.
    pub startup_scripts: Vec<String>,
    /// Guessed remote OS or shell.
    pub host_kind: String,
    /// Send `^H` instead of `DEL` for backspace.
    pub backspace_as_control_h: bool,
    /// Theme name, empty means the default theme.
    pub style: String,
    /// Background name: empty for a solid color, `"default"` to inherit.
    pub background: String,
    /// Last time a session was opened; `None` sorts before any timestamp.
    pub last_used: Option<DateTime<Utc>>,
}

impl Host {
    /// Creates a host with a fresh identity.
    #[must_use]
    pub fn new(alias: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the login user.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Uses password authentication with the given password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password;
        self.password = Some(password.into());
        self
    }

    /// Uses key authentication with the given key id.
    #[must_use]
    pub fn with_key(mut self, key_id: Uuid) -> Self {
        self.auth = AuthMethod::Key;
        self.ssh_key = Some(key_id);
        self
    }

    /// Sets the last-used timestamp.
    #[must_use]
    pub fn with_last_used(mut self, when: DateTime<Utc>) -> Self {
        self.last_used = Some(when);
        self
    }

    /// Returns true if this host authenticates with a key.
    #[must_use]
    pub fn uses_key(&self) -> bool {
        self.auth == AuthMethod::Key
    }

    /// One-line description for list views.
    #[must_use]
    pub fn summary(&self) -> String {
        let target = self.connection_string();
        if self.style.is_empty() {
            target
        } else {
            format!("{}, {}", target, self.style)
        }
    }

    /// Returns `host` or `host:port` when the port is not 22.
    #[must_use]
    pub fn connection_string(&self) -> String {
        if self.port == DEFAULT_SSH_PORT {
            self.hostname.clone()
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }

    /// Returns true if the theme falls back to the default.
    #[must_use]
    pub fn uses_default_style(&self) -> bool {
        self.style.is_empty()
    }

    /// Returns true if the background comes from the settings.
    #[must_use]
    pub fn inherits_background(&self) -> bool {
        self.background == INHERITED_BACKGROUND
    }

    /// Returns true if the background is a solid color.
    #[must_use]
    pub fn has_solid_background(&self) -> bool {
        self.background.is_empty()
    }

    /// Splits `environment_variables` into name/value pairs.
    ///
    /// Entries without `=` or with an empty name are skipped.
    pub fn environment(&self) -> impl Iterator<Item = (&str, &str)> {
        self.environment_variables
            .iter()
            .filter_map(|assignment| assignment.split_once('='))
            .filter(|(name, _)| !name.trim().is_empty())
            .map(|(name, value)| (name.trim(), value))
    }

    /// Returns true if any field a live session observes differs.
    #[must_use]
    pub fn runtime_settings_differ(&self, other: &Host) -> bool {
        self.style != other.style
            || self.background != other.background
            || self.backspace_as_control_h != other.backspace_as_control_h
    }
}

impl Default for Host {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            alias: String::new(),
            hostname: String::new(),
            port: DEFAULT_SSH_PORT,
            auth: AuthMethod::Password,
            username: String::new(),
            password: None,
            ssh_key: None,
            environment_variables: Vec::new(),
            startup_scripts: Vec::new(),
            host_kind: String::new(),
            backspace_as_control_h: false,
            style: String::new(),
            background: String::new(),
            last_used: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_defaults() {
        let host = Host::new("box", "box.example.com");

        assert_eq!(host.port, 22);
        assert_eq!(host.auth, AuthMethod::Password);
        assert!(host.ssh_key.is_none());
        assert!(host.last_used.is_none());
        assert!(host.uses_default_style());
        assert!(host.has_solid_background());
    }

    #[test]
    fn test_fresh_identity_per_host() {
        let a = Host::new("a", "a.example.com");
        let b = Host::new("a", "a.example.com");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_summary() {
        let mut host = Host::new("box", "box.example.com");
        assert_eq!(host.summary(), "box.example.com");

        host.style = "Solarized".to_string();
        assert_eq!(host.summary(), "box.example.com, Solarized");

        let host = host.with_port(2222);
        assert_eq!(host.summary(), "box.example.com:2222, Solarized");
    }

    #[test]
    fn test_connection_string() {
        let host = Host::new("box", "example.com");
        assert_eq!(host.connection_string(), "example.com");

        let host = host.with_port(2222);
        assert_eq!(host.connection_string(), "example.com:2222");
    }

    #[test]
    fn test_with_key_switches_auth() {
        let key_id = Uuid::new_v4();
        let host = Host::new("box", "example.com").with_key(key_id);

        assert!(host.uses_key());
        assert_eq!(host.ssh_key, Some(key_id));
    }

    #[test]
    fn test_environment_pairs() {
        let mut host = Host::new("box", "example.com");
        host.environment_variables = vec![
            "LANG=en_US.UTF-8".to_string(),
            "broken".to_string(),
            "=nameless".to_string(),
            "EMPTY=".to_string(),
        ];

        let pairs: Vec<_> = host.environment().collect();
        assert_eq!(pairs, vec![("LANG", "en_US.UTF-8"), ("EMPTY", "")]);
    }

    #[test]
    fn test_runtime_settings_differ() {
        let host = Host::new("box", "example.com");
        let mut other = host.clone();
        assert!(!host.runtime_settings_differ(&other));

        other.hostname = "elsewhere.com".to_string();
        assert!(!host.runtime_settings_differ(&other));

        other.background = INHERITED_BACKGROUND.to_string();
        assert!(host.runtime_settings_differ(&other));
        assert!(other.inherits_background());
    }

    #[test]
    fn test_deserialize_fills_missing_fields() {
        let json = r#"{"alias":"old","hostname":"old.example.com"}"#;
        let host: Host = serde_json::from_str(json).unwrap();

        assert_eq!(host.alias, "old");
        assert_eq!(host.port, 22);
        assert!(host.startup_scripts.is_empty());
    }
}
