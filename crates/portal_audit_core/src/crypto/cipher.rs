//! Authenticated field encryption.
//!
//! Ciphertext is written as `enc1:` followed by base64 of `nonce || ciphertext || tag`,
//! so every stored value is printable and self-describing. A fresh random
//! nonce is drawn for every call, so encrypting the same plaintext twice
//! gives different output.

use super::key::CipherKey;
use crate::error::{CoreError, CoreResult};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Marker that starts every value produced by [`Cipher::encrypt`].
pub const CIPHERTEXT_PREFIX: &str = "enc1:";

/// Outcome of decrypting a stored value.
///
/// Decryption never fails outright. A value that cannot be decrypted is
/// handed back unchanged as [`Revealed::Unreadable`] so callers can tell
/// it apart from real plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revealed {
    /// The plaintext.
    Clear(String),
    /// The stored value, returned as-is because it could not be decrypted.
    Unreadable(String),
}

impl Revealed {
    /// Returns true if the value was decrypted.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear(_))
    }

    /// Returns the wrapped string, plaintext or not.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Clear(s) | Self::Unreadable(s) => s,
        }
    }

    /// Consumes the value and returns the wrapped string.
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Clear(s) | Self::Unreadable(s) => s,
        }
    }

    /// Returns the plaintext, or `None` if the value was unreadable.
    #[must_use]
    pub fn clear(&self) -> Option<&str> {
        match self {
            Self::Clear(s) => Some(s),
            Self::Unreadable(_) => None,
        }
    }
}

/// Encrypts and decrypts confidential fields.
///
/// Built once at startup and shared by reference. Without a key the cipher
/// is disabled: values pass through unchanged and a warning is logged when
/// it is built and again on first use.
pub struct Cipher {
    aead: Option<Aes256Gcm>,
    warned: AtomicBool,
}

impl Cipher {
    /// Creates an enabled cipher.
    #[must_use]
    pub fn new(key: &CipherKey) -> Self {
        Self {
            aead: Some(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))),
            warned: AtomicBool::new(false),
        }
    }

    /// Creates a pass-through cipher for deployments without a key.
    #[must_use]
    pub fn disabled() -> Self {
        warn!("no encryption key configured, confidential fields will be stored in clear text");
        Self {
            aead: None,
            warned: AtomicBool::new(false),
        }
    }

    /// Returns true if values are actually encrypted.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.aead.is_some()
    }

    /// Encrypts a value for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the AEAD primitive fails, which does not happen
    /// for inputs that fit in memory.
    pub fn encrypt(&self, plaintext: &str) -> CoreResult<String> {
        let Some(aead) = &self.aead else {
            self.note_disabled_use();
            return Ok(plaintext.to_string());
        };

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = aead
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CoreError::encryption_failed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(format!("{CIPHERTEXT_PREFIX}{}", STANDARD.encode(sealed)))
    }

    /// Decrypts a stored value.
    ///
    /// The empty string is returned as empty plaintext. Anything that is not
    /// well-formed ciphertext under this key is logged and returned as
    /// [`Revealed::Unreadable`]; the log line never contains the value.
    pub fn decrypt(&self, stored: &str) -> Revealed {
        if stored.is_empty() {
            return Revealed::Clear(String::new());
        }

        let Some(aead) = &self.aead else {
            self.note_disabled_use();
            return if stored.starts_with(CIPHERTEXT_PREFIX) {
                Revealed::Unreadable(stored.to_string())
            } else {
                Revealed::Clear(stored.to_string())
            };
        };

        match Self::open(aead, stored) {
            Ok(plaintext) => Revealed::Clear(plaintext),
            Err(reason) => {
                error!(reason, len = stored.len(), "failed to decrypt stored field");
                Revealed::Unreadable(stored.to_string())
            }
        }
    }

    fn open(aead: &Aes256Gcm, stored: &str) -> Result<String, &'static str> {
        let encoded = stored
            .strip_prefix(CIPHERTEXT_PREFIX)
            .ok_or("value is not ciphertext")?;
        let sealed = STANDARD.decode(encoded).map_err(|_| "malformed base64")?;
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err("ciphertext too short");
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = aead
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| "authentication failed")?;
        String::from_utf8(plaintext).map_err(|_| "plaintext is not UTF-8")
    }

    fn note_disabled_use(&self) {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!("encryption disabled, confidential field passed through unencrypted");
        }
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}
