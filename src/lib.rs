//! termdir
//!
//! The credential and host directory of an SSH terminal client: saved
//! connection profiles, identities (software and hardware-backed keys),
//! and the known-hosts trust store.
//!
//! # Architecture
//!
//! - **Directory Module**: data model, trust store, blob persistence and
//!   the [`DirectoryStore`] that owns all of it
//! - **Keys Module**: key generation over pluggable encoder and secure
//!   element capabilities
//! - **Config Module**: `.termdirrc` parsing and storage paths
//! - **Logging Module**: file logging with retention
//!
//! # Usage
//!
//! ```no_run
//! use termdir::{Config, DirectoryStore, Host};
//!
//! let config = Config::load().unwrap_or_default();
//! let mut store = DirectoryStore::open(&config);
//! store.save_host(Host::new("web", "web.example.com").with_username("deploy"));
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::struct_excessive_bools)]

pub mod config;
pub mod directory;
pub mod keys;
pub mod logging;

// Re-export main types
pub use config::Config;
pub use directory::{
    AuthMethod, BlobStore, DirectoryStore, FileBlobStore, Host, Key, KeySecret, KeyType,
    KnownHostEntry, KnownHosts, MemoryBlobStore,
};
pub use keys::{KeyGenError, KeyGenerator, KeyRequest};
