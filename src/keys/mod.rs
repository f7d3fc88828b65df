//! Key generation.
//!
//! [`KeyGenerator`] turns a [`KeyRequest`] into a fully populated
//! [`Key`], using a [`KeyEncoder`] for text formats and a
//! [`HardwareKeyProvider`] for keys that must stay in a secure element.
//! Generation either yields a complete key or an error; a half-built key
//! never escapes.

pub mod encoder;
pub mod hardware;

pub use encoder::{EncodeError, KeyEncoder, OpenSshEncoder};
pub use hardware::{EnclaveHandle, HardwareError, HardwareKeyProvider, MemoryEnclave, NoHardware};

use ssh_key::EcdsaCurve;
use ssh_key::private::{EcdsaKeypair, KeypairData, RsaKeypair};
use ssh_key::public::KeyData;
use ssh_key::rand_core::OsRng;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::directory::{Key, KeyError, KeySecret, KeyType};

/// Errors from key generation.
#[derive(Debug, Error)]
pub enum KeyGenError {
    /// Creating the key pair failed.
    #[error("Key pair generation failed: {0}")]
    Generation(#[from] ssh_key::Error),

    /// Encoding the key failed.
    #[error("Key encoding failed: {0}")]
    Encoding(#[from] EncodeError),

    /// The secure element refused.
    #[error("Secure element error: {0}")]
    Hardware(#[from] HardwareError),

    /// The generated parts did not form a valid key.
    #[error("Invalid key: {0}")]
    Invalid(#[from] KeyError),
}

/// Parameters for a new key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRequest {
    /// Algorithm and storage.
    pub key_type: KeyType,
    /// Secure element tag, used only for hardware-backed keys.
    pub key_tag: String,
    /// Comment embedded in the public key; also the key's display name.
    pub comment: String,
    /// Passphrase for the private key text, software keys only.
    pub passphrase: Option<String>,
}

impl KeyRequest {
    /// Creates a request without tag or passphrase.
    #[must_use]
    pub fn new(key_type: KeyType, comment: impl Into<String>) -> Self {
        Self {
            key_type,
            key_tag: String::new(),
            comment: comment.into(),
            passphrase: None,
        }
    }

    /// Sets the secure element tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.key_tag = tag.into();
        self
    }

    /// Sets the passphrase.
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }
}

/// Produces [`Key`]s from [`KeyRequest`]s.
#[derive(Debug, Default)]
pub struct KeyGenerator<E = OpenSshEncoder, H = NoHardware> {
    encoder: E,
    hardware: H,
}

impl KeyGenerator {
    /// Generator with OpenSSH encoding and no secure element.
    #[must_use]
    pub fn software() -> Self {
        Self::default()
    }
}

impl<E: KeyEncoder, H: HardwareKeyProvider> KeyGenerator<E, H> {
    /// Creates a generator from its two capabilities.
    #[must_use]
    pub fn new(encoder: E, hardware: H) -> Self {
        Self { encoder, hardware }
    }

    /// Returns the encoder.
    #[must_use]
    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Returns the hardware provider.
    #[must_use]
    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Generates a new key.
    pub fn generate(&self, request: &KeyRequest) -> Result<Key, KeyGenError> {
        let result = match request.key_type {
            KeyType::Ecdsa { in_enclave: true } => self.generate_confined(request),
            KeyType::Ecdsa { in_enclave: false } => {
                let pair = EcdsaKeypair::random(&mut OsRng, EcdsaCurve::NistP256)?;
                self.generate_software(request, KeypairData::Ecdsa(pair))
            }
            KeyType::Rsa { bits } => {
                let pair = RsaKeypair::random(&mut OsRng, bits as usize)?;
                self.generate_software(request, KeypairData::Rsa(pair))
            }
        };

        match &result {
            Ok(key) => info!("Generated {} key {:?}", key.key_type(), key.name),
            Err(e) => warn!("Generating {} key failed: {}", request.key_type, e),
        }
        result
    }

    fn generate_confined(&self, request: &KeyRequest) -> Result<Key, KeyGenError> {
        let public = self.hardware.generate_confined(&request.key_tag)?;
        debug!("Confined key created under tag {}", request.key_tag);

        let result = self.describe_confined(request, &public);
        if result.is_err() && !self.hardware.delete(&request.key_tag) {
            warn!("Could not roll back confined key {}", request.key_tag);
        }
        result
    }

    /// Builds the [`Key`] record for a freshly confined key.
    fn describe_confined(&self, request: &KeyRequest, public: &KeyData) -> Result<Key, KeyGenError> {
        let public_text = self.encoder.encode_public(public, &request.comment)?;
        Ok(Key::new(
            Uuid::new_v4(),
            request.key_type,
            request.comment.clone(),
            KeySecret::EnclaveTag(request.key_tag.clone()),
            public_text,
        )?)
    }

    fn generate_software(
        &self,
        request: &KeyRequest,
        pair: KeypairData,
    ) -> Result<Key, KeyGenError> {
        let public = KeyData::try_from(&pair)?;
        let public_text = self.encoder.encode_public(&public, &request.comment)?;
        let private_text = self.encoder.encode_private(
            &pair,
            &request.comment,
            request.passphrase.as_deref(),
        )?;

        let key = Key::new(
            Uuid::new_v4(),
            request.key_type,
            request.comment.clone(),
            KeySecret::Encoded(private_text),
            public_text,
        )?;
        Ok(key.with_passphrase(request.passphrase.clone()))
    }

    /// Returns true if the secure element holds a key under `tag`.
    #[must_use]
    pub fn have_hardware_key(&self, tag: &str) -> bool {
        self.hardware.exists(tag)
    }

    /// Resolves a hardware-backed key to its signing handle.
    ///
    /// Returns `None` for software keys and for tags the provider does
    /// not know.
    #[must_use]
    pub fn key_handle(&self, key: &Key) -> Option<H::Handle> {
        let tag = key.secret().enclave_tag()?;
        if !key.is_hardware_backed() {
            return None;
        }
        self.hardware.resolve_handle(tag)
    }
}
