//! Key material to OpenSSH text and back.

use ssh_key::private::KeypairData;
use ssh_key::public::KeyData;
use ssh_key::rand_core::OsRng;
use ssh_key::{LineEnding, PrivateKey, PublicKey};
use thiserror::Error;

/// Errors from encoding key material.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The underlying SSH encoding failed.
    #[error("SSH encoding failed: {0}")]
    Ssh(#[from] ssh_key::Error),

    /// The encoder does not handle this material.
    #[error("Unsupported key material: {0}")]
    Unsupported(String),
}

/// Turns raw key material into transport text.
pub trait KeyEncoder {
    /// Encodes a public key as an `algorithm base64 comment` line.
    fn encode_public(&self, public: &KeyData, comment: &str) -> Result<String, EncodeError>;

    /// Encodes a key pair as private key text, encrypted when a non-empty
    /// passphrase is given.
    fn encode_private(
        &self,
        pair: &KeypairData,
        comment: &str,
        passphrase: Option<&str>,
    ) -> Result<String, EncodeError>;

    /// Parses an OpenSSH public key line back into key data.
    fn decode_public(&self, text: &str) -> Result<KeyData, EncodeError> {
        let key = PublicKey::from_openssh(text.trim())?;
        Ok(key.key_data().clone())
    }
}

/// OpenSSH formats: `authorized_keys` lines and `OPENSSH PRIVATE KEY` PEM.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSshEncoder;

impl OpenSshEncoder {
    /// Creates the encoder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl KeyEncoder for OpenSshEncoder {
    fn encode_public(&self, public: &KeyData, comment: &str) -> Result<String, EncodeError> {
        let key = PublicKey::new(public.clone(), comment);
        Ok(key.to_openssh()?)
    }

    fn encode_private(
        &self,
        pair: &KeypairData,
        comment: &str,
        passphrase: Option<&str>,
    ) -> Result<String, EncodeError> {
        let key = PrivateKey::new(pair.clone(), comment)?;
        let key = match passphrase.filter(|p| !p.is_empty()) {
            Some(passphrase) => key.encrypt(&mut OsRng, passphrase)?,
            None => key,
        };
        let pem = key.to_openssh(LineEnding::LF)?;
        Ok(pem.to_string())
    }
}
