//! SSH known-hosts trust store.
//!
//! The file is plain UTF-8 text, one entry per line:
//!
//! ```text
//! host key-type base64-key [rest...]
//! ```
//!
//! Lines with fewer than three whitespace-separated fields are skipped.
//! Entry ids are assigned on every load and are never written back.
//! Loading and saving are best-effort: failures are logged and the
//! in-memory entries stay as they were.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;


/// Maximum known-hosts file size we are willing to read (4MB).
const MAX_FILE_SIZE: u64 = 4 * 1024 * 1024;

/// Minimum number of fields in a usable line.
const MIN_FIELDS: usize = 3;

/// One trusted host key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownHostEntry {
    /// Identity for this process only.
    pub id: Uuid,
    /// Host pattern.
    pub host: String,
    /// Key type token, e.g. `ssh-ed25519`.
    pub key_type: String,
    /// Base64 key body.
    pub key: String,
    /// Any trailing fields joined by single spaces.
    pub rest: String,
}

impl KnownHostEntry {
    /// Creates an entry with a fresh id.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        key_type: impl Into<String>,
        key: impl Into<String>,
        rest: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            host: host.into(),
            key_type: key_type.into(),
            key: key.into(),
            rest: rest.into(),
        }
    }

    /// Parses one line, returning `None` if it has fewer than three fields.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < MIN_FIELDS {
            return None;
        }

        Some(Self::new(
            fields[0],
            fields[1],
            fields[2],
            fields[MIN_FIELDS..].join(" "),
        ))
    }

    /// Formats the entry as a line, without the trailing newline.
    ///
    /// An empty `rest` produces no trailing space.
    #[must_use]
    pub fn to_line(&self) -> String {
        if self.rest.is_empty() {
            format!("{} {} {}", self.host, self.key_type, self.key)
        } else {
            format!("{} {} {} {}", self.host, self.key_type, self.key, self.rest)
        }
    }
}

/// In-memory known-hosts set backed by a file.
#[derive(Debug, Clone)]
pub struct KnownHosts {
    /// Path to the known-hosts file.
    path: PathBuf,
    /// Entries in file order.
    entries: Vec<KnownHostEntry>,
}

impl KnownHosts {
    /// Creates an empty store backed by `path`.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            entries: Vec::new(),
        }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns all entries.
    #[must_use]
    pub fn entries(&self) -> &[KnownHostEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entries for a host pattern.
    pub fn lookup<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a KnownHostEntry> {
        self.entries.iter().filter(move |entry| entry.host == host)
    }

    /// Returns true if `host` is trusted with exactly this key.
    #[must_use]
    pub fn is_trusted(&self, host: &str, key_type: &str, key: &str) -> bool {
        self.lookup(host)
            .any(|entry| entry.key_type == key_type && entry.key == key)
    }

    /// Appends an entry and returns its id.
    pub fn append(&mut self, entry: KnownHostEntry) -> Uuid {
        let id = entry.id;
        self.entries.push(entry);
        id
    }

    /// Removes the entry with the given id.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Parses file content into entries, skipping short lines.
    #[must_use]
    pub fn parse(content: &str) -> Vec<KnownHostEntry> {
        content
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .filter_map(KnownHostEntry::parse_line)
            .collect()
    }

    /// Serializes all entries, one line each, newline terminated.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_line());
            out.push('\n');
        }
        out
    }

    /// Replaces the entries with the file's content.
    ///
    /// A missing, oversized or unreadable file leaves the entries untouched.
    pub fn load(&mut self) {
        match self.read_file() {
            Ok(content) => {
                self.entries = Self::parse(&content);
                debug!(
                    "Loaded {} known host(s) from {}",
                    self.entries.len(),
                    self.path.display()
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No known hosts file at {}", self.path.display());
            }
            Err(e) => {
                warn!(
                    "Could not read known hosts {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }

    /// Writes all entries to the file, replacing it atomically.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn save(&self) {
        if let Err(e) = self.write_file() {
            warn!(
                "Could not write known hosts {}: {}",
                self.path.display(),
                e
            );
        }
    }

    fn read_file(&self) -> io::Result<String> {
        let metadata = fs::metadata(&self.path)?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file too large (max {MAX_FILE_SIZE} bytes)"),
            ));
        }
        fs::read_to_string(&self.path)
    }

    fn write_file(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write to a sibling temp file, then rename over the target
        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(self.serialize().as_bytes())?;
            file.flush()?;
        }
        fs::rename(&temp_path, &self.path)?;

        debug!(
            "Saved {} known host(s) to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "example.com ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIxyz extra info";

    #[test]
    fn test_parse_line_fields() {
        let entry = KnownHostEntry::parse_line(LINE).unwrap();

        assert_eq!(entry.host, "example.com");
        assert_eq!(entry.key_type, "ssh-ed25519");
        assert_eq!(entry.key, "AAAAC3NzaC1lZDI1NTE5AAAAIxyz");
        assert_eq!(entry.rest, "extra info");
    }

    #[test]
    fn test_parse_line_collapses_whitespace() {
        let entry = KnownHostEntry::parse_line("  a\tb   c  d \t e ").unwrap();
        assert_eq!(entry.host, "a");
        assert_eq!(entry.rest, "d e");
    }

    #[test]
    fn test_parse_line_too_short() {
        assert!(KnownHostEntry::parse_line("example.com ssh-ed25519").is_none());
        assert!(KnownHostEntry::parse_line("").is_none());
    }

    #[test]
    fn test_to_line_without_rest() {
        let entry = KnownHostEntry::new("h", "ssh-rsa", "AAAA", "");
        assert_eq!(entry.to_line(), "h ssh-rsa AAAA");
    }

    #[test]
    fn test_parse_skips_blank_and_short_lines() {
        let content = format!("{LINE}\n\nonly two\n   \nh ssh-rsa AAAA\n");
        let entries = KnownHosts::parse(&content);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].host, "h");
        assert_eq!(entries[1].rest, "");
    }

    #[test]
    fn test_ids_are_fresh_per_parse() {
        let first = KnownHosts::parse(LINE);
        let second = KnownHosts::parse(LINE);
        assert_ne!(first[0].id, second[0].id);
    }

    #[test]
    fn test_append_lookup_remove() {
        let mut store = KnownHosts::with_path(PathBuf::from("unused"));
        let id = store.append(KnownHostEntry::new("a.com", "ssh-rsa", "AAAA", ""));
        store.append(KnownHostEntry::new("b.com", "ssh-rsa", "BBBB", ""));

        assert_eq!(store.lookup("a.com").count(), 1);
        assert!(store.is_trusted("b.com", "ssh-rsa", "BBBB"));
        assert!(!store.is_trusted("b.com", "ssh-rsa", "AAAA"));

        assert!(store.remove(id));
        assert!(!store.remove(id));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_load_missing_file_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = KnownHosts::with_path(dir.path().join("known_hosts"));
        store.append(KnownHostEntry::new("a.com", "ssh-rsa", "AAAA", ""));

        store.load();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("known_hosts");

        let mut store = KnownHosts::with_path(path.clone());
        store.append(KnownHostEntry::parse_line(LINE).unwrap());
        store.save();

        let mut reloaded = KnownHosts::with_path(path);
        reloaded.load();

        assert_eq!(reloaded.len(), 1);
        let entry = &reloaded.entries()[0];
        assert_eq!(entry.host, "example.com");
        assert_eq!(entry.rest, "extra info");
    }
}
