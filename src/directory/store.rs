//! The directory store.
//!
//! [`DirectoryStore`] owns the host list, the key list and the known-hosts
//! set for the life of the process. Every mutation goes through it so
//! that persistence and change notification follow the in-memory state.
//!
//! Hosts and keys are written as two independent JSON blobs. A blob that
//! is missing or does not decode leaves the built-in default for that
//! collection in place; the other collection is unaffected.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

use chrono::Utc;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::blob::{BlobError, BlobStore, FileBlobStore};
use super::host::Host;
use super::key::Key;
use super::known_hosts::{KnownHostEntry, KnownHosts};
use crate::config::Config;
use crate::keys::{HardwareKeyProvider, KeyEncoder, KeyGenError, KeyGenerator, KeyRequest};

/// Blob key for the host list.
pub const HOSTS_BLOB_KEY: &str = "hosts";

/// Blob key for the key list.
pub const KEYS_BLOB_KEY: &str = "keys";

/// Display name for a host whose key does not resolve.
pub const NO_KEY_DISPLAY_NAME: &str = "none";

/// Number of hosts returned by [`DirectoryStore::recent_indices`].
const RECENT_HOST_LIMIT: usize = 3;

/// Single owner of hosts, keys and known hosts.
#[derive(Debug)]
pub struct DirectoryStore {
    /// Saved hosts in display order.
    hosts: Vec<Host>,
    /// Saved keys in display order.
    keys: Vec<Key>,
    /// Trusted host keys.
    known_hosts: KnownHosts,
    /// Durable storage for hosts and keys.
    blobs: Box<dyn BlobStore>,
    /// Receivers of runtime-visible host changes.
    observers: Vec<Sender<Host>>,
}

impl DirectoryStore {
    /// Creates a store and restores whatever was persisted.
    ///
    /// Also loads the known-hosts file at `known_hosts_path`.
    pub fn new(blobs: Box<dyn BlobStore>, known_hosts_path: PathBuf) -> Self {
        let mut store = Self {
            hosts: Self::default_hosts(),
            keys: Self::default_keys(),
            known_hosts: KnownHosts::with_path(known_hosts_path),
            blobs,
            observers: Vec::new(),
        };

        if let Some(hosts) = store.restore::<Vec<Host>>(HOSTS_BLOB_KEY) {
            store.hosts = hosts;
        }
        if let Some(keys) = store.restore::<Vec<Key>>(KEYS_BLOB_KEY) {
            store.keys = keys;
        }
        store.known_hosts.load();

        debug!(
            "Directory opened: {} host(s), {} key(s), {} known host(s)",
            store.hosts.len(),
            store.keys.len(),
            store.known_hosts.len()
        );
        store
    }

    /// Opens the store described by `config`.
    pub fn open(config: &Config) -> Self {
        let blobs = FileBlobStore::with_dir(config.data_dir());
        Self::new(Box::new(blobs), config.known_hosts_path())
    }

    /// Built-in hosts used when nothing was persisted.
    fn default_hosts() -> Vec<Host> {
        Vec::new()
    }

    /// Built-in keys used when nothing was persisted.
    fn default_keys() -> Vec<Key> {
        Vec::new()
    }

    fn restore<T: DeserializeOwned>(&self, blob_key: &str) -> Option<T> {
        let data = match self.blobs.get(blob_key) {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!("No saved {} blob", blob_key);
                return None;
            }
            Err(e) => {
                warn!("Could not read {} blob: {}", blob_key, e);
                return None;
            }
        };

        match serde_json::from_slice(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Could not decode {} blob, keeping defaults: {}", blob_key, e);
                None
            }
        }
    }

    // ==================== Read access ====================

    /// Returns all hosts.
    #[must_use]
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Returns the trust store.
    #[must_use]
    pub fn known_hosts(&self) -> &KnownHosts {
        &self.known_hosts
    }

    /// Returns the host at `index`.
    #[must_use]
    pub fn host(&self, index: usize) -> Option<&Host> {
        self.hosts.get(index)
    }

    /// Returns the first host with this alias.
    #[must_use]
    pub fn host_by_alias(&self, alias: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.alias == alias)
    }

    /// Returns the key with this id.
    #[must_use]
    pub fn key(&self, id: Uuid) -> Option<&Key> {
        self.keys.iter().find(|k| k.id == id)
    }

    // ==================== Persistence ====================

    /// Writes hosts, keys and known hosts to durable storage.
    ///
    /// Each part is written independently; failures are logged.
    pub fn save_state(&mut self) {
        persist(self.blobs.as_mut(), HOSTS_BLOB_KEY, &self.hosts);
        persist(self.blobs.as_mut(), KEYS_BLOB_KEY, &self.keys);
        self.known_hosts.save();
    }

    // ==================== Hosts ====================

    /// Saves a host, replacing any host with the same alias in place.
    pub fn save_host(&mut self, host: Host) {
        let notify = match self.hosts.iter().position(|h| h.alias == host.alias) {
            Some(index) => {
                let changed = self.hosts[index].runtime_settings_differ(&host);
                self.hosts[index] = host.clone();
                changed
            }
            None => {
                self.hosts.push(host.clone());
                false
            }
        };

        self.save_state();
        if notify {
            self.notify(&host);
        }
    }

    /// Marks a host as used now and persists.
    pub fn used(&mut self, host: &Host) {
        if let Some(existing) = self.hosts.iter_mut().find(|h| h.id == host.id) {
            existing.last_used = Some(Utc::now());
            self.save_state();
        }
    }

    /// Returns true if any host has this alias.
    #[must_use]
    pub fn has_host(&self, alias: &str) -> bool {
        self.hosts.iter().any(|h| h.alias == alias)
    }

    /// Records the guessed remote kind for the host with this identity.
    pub fn update_guess(&mut self, host: &Host, guess: &str) {
        for existing in self.hosts.iter_mut().filter(|h| h.id == host.id) {
            existing.host_kind = guess.to_string();
        }
    }

    /// Removes the host with this identity and persists.
    pub fn remove_host(&mut self, id: Uuid) -> bool {
        let before = self.hosts.len();
        self.hosts.retain(|h| h.id != id);
        let removed = self.hosts.len() != before;
        if removed {
            self.save_state();
        }
        removed
    }

    /// Indices of the three most recently used hosts, newest first.
    ///
    /// Indices point into [`hosts`](Self::hosts) and stay valid until the
    /// host list is next mutated. Equal timestamps keep list order.
    #[must_use]
    pub fn recent_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.hosts.len()).collect();
        indices.sort_by(|&a, &b| self.hosts[b].last_used.cmp(&self.hosts[a].last_used));
        indices.truncate(RECENT_HOST_LIMIT);
        indices
    }

    /// Indices of hosts matching `query`, best match first.
    ///
    /// Matches against alias and hostname. An empty query returns every
    /// index in list order.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<usize> {
        let query = query.trim();
        if query.is_empty() {
            return (0..self.hosts.len()).collect();
        }

        let matcher = SkimMatcherV2::default();
        let mut matches: Vec<(usize, i64)> = self
            .hosts
            .iter()
            .enumerate()
            .filter_map(|(index, host)| {
                let search_text = format!("{} {}", host.alias, host.hostname);
                matcher
                    .fuzzy_match(&search_text, query)
                    .map(|score| (index, score))
            })
            .collect();

        // Sort by score descending
        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches.into_iter().map(|(index, _)| index).collect()
    }

    // ==================== Runtime-visible settings ====================

    /// Sets the theme of a host. Returns false if the host is unknown.
    pub fn set_theme(&mut self, id: Uuid, style: &str) -> bool {
        self.update_runtime(id, |host| host.style = style.to_string())
    }

    /// Sets the background of a host. Returns false if the host is unknown.
    pub fn set_background(&mut self, id: Uuid, background: &str) -> bool {
        self.update_runtime(id, |host| host.background = background.to_string())
    }

    /// Sets the backspace behavior of a host. Returns false if the host is unknown.
    pub fn set_backspace_as_control_h(&mut self, id: Uuid, enabled: bool) -> bool {
        self.update_runtime(id, |host| host.backspace_as_control_h = enabled)
    }

    fn update_runtime(&mut self, id: Uuid, apply: impl FnOnce(&mut Host)) -> bool {
        let Some(host) = self.hosts.iter_mut().find(|h| h.id == id) else {
            return false;
        };

        let before = host.clone();
        apply(host);
        if !host.runtime_settings_differ(&before) {
            return true;
        }

        let updated = host.clone();
        self.save_state();
        self.notify(&updated);
        true
    }

    /// Subscribes to runtime-visible host changes.
    ///
    /// The receiver gets the updated host whenever its theme, background
    /// or backspace behavior changes. Dropping it unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<Host> {
        let (tx, rx) = mpsc::channel();
        self.observers.push(tx);
        rx
    }

    fn notify(&mut self, host: &Host) {
        self.observers.retain(|tx| tx.send(host.clone()).is_ok());
    }

    // ==================== Keys ====================

    /// Saves a key, replacing any key with the same identity in place.
    pub fn save_key(&mut self, key: Key) {
        match self.keys.iter().position(|k| k.id == key.id) {
            Some(index) => self.keys[index] = key,
            None => self.keys.push(key),
        }
        self.save_state();
    }

    /// Removes the key with this identity and persists.
    ///
    /// Hosts that referenced it keep the dangling id.
    pub fn remove_key(&mut self, id: Uuid) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| k.id != id);
        let removed = self.keys.len() != before;
        if removed {
            self.save_state();
        }
        removed
    }

    /// Resolves a host's key reference.
    #[must_use]
    pub fn key_for_host(&self, host: &Host) -> Option<&Key> {
        let id = host.ssh_key?;
        self.key(id)
    }

    /// Returns true if the host's key reference resolves.
    #[must_use]
    pub fn host_has_valid_key(&self, host: &Host) -> bool {
        self.key_for_host(host).is_some()
    }

    /// Name of the host's key, or `"none"` if it does not resolve.
    #[must_use]
    pub fn ssh_display_name(&self, host: &Host) -> &str {
        self.key_for_host(host)
            .map_or(NO_KEY_DISPLAY_NAME, |key| key.name.as_str())
    }

    /// Generates a key and saves it.
    pub fn generate_key<E, H>(
        &mut self,
        generator: &KeyGenerator<E, H>,
        request: &KeyRequest,
    ) -> Result<Key, KeyGenError>
    where
        E: KeyEncoder,
        H: HardwareKeyProvider,
    {
        let key = generator.generate(request)?;
        self.save_key(key.clone());
        Ok(key)
    }

    // ==================== Known hosts ====================

    /// Trusts a host key and persists the trust store.
    pub fn trust_host_key(&mut self, entry: KnownHostEntry) -> Uuid {
        let id = self.known_hosts.append(entry);
        self.known_hosts.save();
        id
    }

    /// Forgets a known-hosts entry and persists the trust store.
    pub fn forget_known_host(&mut self, id: Uuid) -> bool {
        let removed = self.known_hosts.remove(id);
        if removed {
            self.known_hosts.save();
        }
        removed
    }

    /// Re-reads the known-hosts file.
    pub fn reload_known_hosts(&mut self) {
        self.known_hosts.load();
    }
}

/// Encodes `value` and stores it under `blob_key`, logging any failure.
fn persist<T: Serialize + ?Sized>(blobs: &mut dyn BlobStore, blob_key: &str, value: &T) {
    let data = match serde_json::to_vec(value) {
        Ok(data) => data,
        Err(e) => {
            warn!("Could not encode {} blob: {}", blob_key, e);
            return;
        }
    };

    match blobs.set(blob_key, &data) {
        Ok(()) => debug!("Saved {} blob ({} bytes)", blob_key, data.len()),
        Err(e @ BlobError::TooLarge) => {
            error!("Dropped {} blob ({} bytes): {}", blob_key, data.len(), e);
        }
        Err(e) => warn!("Could not write {} blob: {}", blob_key, e),
    }
}
