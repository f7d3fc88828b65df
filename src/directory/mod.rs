//! Host, key and known-hosts directory.
//!
//! Provides:
//! - Saved connection profiles ([`Host`])
//! - Cryptographic identities ([`Key`]), including hardware-backed ones
//! - The SSH trust store ([`KnownHosts`])
//! - [`DirectoryStore`], the single owner of all three, persisting hosts
//!   and keys through a [`BlobStore`]
//!
//! # Persistence
//!
//! Saving and loading are best-effort. Failures are logged and the
//! in-memory state stays authoritative for the rest of the process.

pub mod blob;
pub mod host;
pub mod key;
pub mod known_hosts;
pub mod store;

pub use blob::{BlobError, BlobStore, FileBlobStore, MemoryBlobStore};
pub use host::{AuthMethod, Host};
pub use key::{Key, KeyError, KeySecret, KeyType};
pub use known_hosts::{KnownHostEntry, KnownHosts};
pub use store::{DirectoryStore, HOSTS_BLOB_KEY, KEYS_BLOB_KEY, NO_KEY_DISPLAY_NAME};
