//! Secure element access.
//!
//! A [`HardwareKeyProvider`] creates key pairs whose private half never
//! leaves the provider. Callers only ever see the public half and an
//! opaque [`HardwareKeyProvider::Handle`] that can sign.
//!
//! Two providers ship here:
//! - [`NoHardware`]: for platforms without a secure element. Every
//!   generation fails and every lookup misses.
//! - [`MemoryEnclave`]: keeps confined keys inside the process.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use signature::Signer as _;
use ssh_key::private::{EcdsaKeypair, KeypairData};
use ssh_key::public::KeyData;
use ssh_key::rand_core::OsRng;
use ssh_key::{EcdsaCurve, PrivateKey, Signature};
use thiserror::Error;
use tracing::debug;

/// Errors from the secure element.
#[derive(Debug, Error)]
pub enum HardwareError {
    /// No secure element on this platform.
    #[error("No secure element available")]
    Unavailable,

    /// Tag is empty.
    #[error("Key tag must not be empty")]
    EmptyTag,

    /// A key already exists under this tag.
    #[error("Key tag already in use: {0}")]
    TagInUse(String),

    /// Key generation failed inside the secure element.
    #[error("Key generation failed: {0}")]
    Generation(#[from] ssh_key::Error),

    /// Signing failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Internal state is unusable.
    #[error("Secure element state poisoned")]
    Poisoned,
}

/// A secure element that confines private keys.
pub trait HardwareKeyProvider {
    /// Opaque signing handle for a confined key.
    type Handle;

    /// Creates a P-256 key pair addressable by `tag` and returns its
    /// public half.
    fn generate_confined(&self, tag: &str) -> Result<KeyData, HardwareError>;

    /// Returns true if a key exists under `tag`. Never fails.
    fn exists(&self, tag: &str) -> bool;

    /// Resolves `tag` to a signing handle.
    fn resolve_handle(&self, tag: &str) -> Option<Self::Handle>;

    /// Destroys the key under `tag`. Returns false if there was none.
    fn delete(&self, tag: &str) -> bool;
}

/// Provider for platforms without a secure element.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHardware;

impl HardwareKeyProvider for NoHardware {
    type Handle = EnclaveHandle;

    fn generate_confined(&self, _tag: &str) -> Result<KeyData, HardwareError> {
        Err(HardwareError::Unavailable)
    }

    fn exists(&self, _tag: &str) -> bool {
        false
    }

    fn resolve_handle(&self, _tag: &str) -> Option<Self::Handle> {
        None
    }

    fn delete(&self, _tag: &str) -> bool {
        false
    }
}

/// Signing handle for a confined key.
///
/// Exposes the public key and a signing operation, never the private bytes.
#[derive(Clone)]
pub struct EnclaveHandle {
    tag: String,
    key: PrivateKey,
}

impl EnclaveHandle {
    /// Returns the tag this handle was resolved from.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the public half.
    #[must_use]
    pub fn public_key(&self) -> &KeyData {
        self.key.public_key().key_data()
    }

    /// Signs `data` with the confined key.
    pub fn sign(&self, data: &[u8]) -> Result<Signature, HardwareError> {
        self.key
            .try_sign(data)
            .map_err(|e| HardwareError::Signing(e.to_string()))
    }
}

impl fmt::Debug for EnclaveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnclaveHandle")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// In-process secure element.
///
/// Keys are held for the lifetime of the value and cannot be exported.
#[derive(Default)]
pub struct MemoryEnclave {
    keys: Mutex<HashMap<String, PrivateKey>>,
}

impl MemoryEnclave {
    /// Creates an empty enclave.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of confined keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.lock().map(|keys| keys.len()).unwrap_or(0)
    }

    /// Returns true if no keys are confined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MemoryEnclave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEnclave")
            .field("keys", &self.len())
            .finish()
    }
}

impl HardwareKeyProvider for MemoryEnclave {
    type Handle = EnclaveHandle;

    fn generate_confined(&self, tag: &str) -> Result<KeyData, HardwareError> {
        if tag.is_empty() {
            return Err(HardwareError::EmptyTag);
        }

        let mut keys = self.keys.lock().map_err(|_| HardwareError::Poisoned)?;
        if keys.contains_key(tag) {
            return Err(HardwareError::TagInUse(tag.to_string()));
        }

        let pair = EcdsaKeypair::random(&mut OsRng, EcdsaCurve::NistP256)?;
        let key = PrivateKey::new(KeypairData::Ecdsa(pair), tag)?;
        let public = key.public_key().key_data().clone();

        keys.insert(tag.to_string(), key);
        debug!("Confined new key under tag {}", tag);
        Ok(public)
    }

    fn exists(&self, tag: &str) -> bool {
        self.keys
            .lock()
            .map(|keys| keys.contains_key(tag))
            .unwrap_or(false)
    }

    fn resolve_handle(&self, tag: &str) -> Option<Self::Handle> {
        let keys = self.keys.lock().ok()?;
        keys.get(tag).map(|key| EnclaveHandle {
            tag: tag.to_string(),
            key: key.clone(),
        })
    }

    fn delete(&self, tag: &str) -> bool {
        self.keys
            .lock()
            .map(|mut keys| keys.remove(tag).is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_hardware() {
        let provider = NoHardware;

        assert!(matches!(
            provider.generate_confined("tag"),
            Err(HardwareError::Unavailable)
        ));
        assert!(!provider.exists("tag"));
        assert!(provider.resolve_handle("tag").is_none());
        assert!(!provider.delete("tag"));
    }

    #[test]
    fn test_memory_enclave_generate_and_resolve() {
        let enclave = MemoryEnclave::new();
        let public = enclave.generate_confined("com.example.key").unwrap();

        assert!(enclave.exists("com.example.key"));
        assert!(!enclave.exists("other"));

        let handle = enclave.resolve_handle("com.example.key").unwrap();
        assert_eq!(handle.tag(), "com.example.key");
        assert_eq!(handle.public_key(), &public);
    }

    #[test]
    fn test_memory_enclave_rejects_duplicate_and_empty_tags() {
        let enclave = MemoryEnclave::new();
        enclave.generate_confined("t").unwrap();

        assert!(matches!(
            enclave.generate_confined("t"),
            Err(HardwareError::TagInUse(_))
        ));
        assert!(matches!(
            enclave.generate_confined(""),
            Err(HardwareError::EmptyTag)
        ));
        assert_eq!(enclave.len(), 1);
    }

    #[test]
    fn test_handle_signs() {
        let enclave = MemoryEnclave::new();
        enclave.generate_confined("signer").unwrap();
        let handle = enclave.resolve_handle("signer").unwrap();

        let signature = handle.sign(b"challenge").unwrap();
        assert!(!signature.as_bytes().is_empty());
    }

    #[test]
    fn test_delete() {
        let enclave = MemoryEnclave::new();
        enclave.generate_confined("gone").unwrap();

        assert!(enclave.delete("gone"));
        assert!(!enclave.exists("gone"));
        assert!(enclave.is_empty());
    }

    #[test]
    fn test_handle_debug_hides_key() {
        let enclave = MemoryEnclave::new();
        enclave.generate_confined("quiet").unwrap();
        let handle = enclave.resolve_handle("quiet").unwrap();

        let debug = format!("{:?}", handle);
        assert!(debug.contains("quiet"));
        assert!(!debug.contains("private"));
    }
}
