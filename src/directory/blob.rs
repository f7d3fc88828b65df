//! Durable key-value blob storage.
//!
//! The directory persists each collection as an opaque blob under a fixed
//! key. [`FileBlobStore`] keeps one file per key; [`MemoryBlobStore`]
//! keeps them in a map and is handy for tests and throwaway sessions.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Maximum size of a single blob (64MB).
const MAX_BLOB_SIZE: u64 = 64 * 1024 * 1024;

/// File extension used for blob files.
const BLOB_EXTENSION: &str = "blob";

/// Errors that can occur during blob operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Blob too large.
    #[error("Blob too large (max {MAX_BLOB_SIZE} bytes)")]
    TooLarge,

    /// Key cannot be used as a file name.
    #[error("Invalid blob key: {0:?}")]
    InvalidKey(String),
}

/// Opaque key-value blob store.
pub trait BlobStore: fmt::Debug {
    /// Returns the blob stored under `key`, or `None` if there is none.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Stores `data` under `key`, replacing any previous blob.
    fn set(&mut self, key: &str, data: &[u8]) -> Result<(), BlobError>;
}

/// Blob store keeping one file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    /// Directory holding the blob files.
    dir: PathBuf,
}

impl FileBlobStore {
    /// Creates a store in `dir`.
    #[must_use]
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Returns the directory holding the blobs.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path used for `key`.
    pub fn blob_path(&self, key: &str) -> Result<PathBuf, BlobError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.{BLOB_EXTENSION}")))
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = self.blob_path(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let metadata = fs::metadata(&path)?;
        if metadata.len() > MAX_BLOB_SIZE {
            return Err(BlobError::TooLarge);
        }

        Ok(Some(fs::read(&path)?))
    }

    fn set(&mut self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let path = self.blob_path(key)?;
        if data.len() as u64 > MAX_BLOB_SIZE {
            return Err(BlobError::TooLarge);
        }

        fs::create_dir_all(&self.dir)?;

        // Write atomically (write to temp, then rename)
        let temp_path = path.with_extension("tmp");
        {
            let mut file = create_private(&temp_path)?;
            file.write_all(data)?;
            file.flush()?;
        }

        fs::rename(&temp_path, &path)?;
        Ok(())
    }
}

/// Opens `path` for writing, readable by the owner only.
///
/// Blobs hold passwords and private keys. A leftover temp file keeps its
/// old mode on open, so the mode is also set explicitly.
#[cfg(unix)]
fn create_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to restrict permissions on {}: {}", path.display(), e);
    }
    Ok(file)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> io::Result<fs::File> {
    fs::File::create(path)
}

/// Blob store held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        Ok(self.blobs.get(key).cloned())
    }

    fn set(&mut self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        self.blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}
