//! Field encryption keys.

use crate::error::{CoreError, CoreResult};
use rand::RngCore;
use sha2::Sha256;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// PBKDF2 iteration count used unless configured otherwise.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Application-wide salt for deriving the field key from the secret.
pub const DEFAULT_KEY_SALT: &[u8] = b"portal-audit/field-key/v1";

/// Key for AES-256-GCM field encryption.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKey {
    bytes: [u8; KEY_SIZE],
}

impl CipherKey {
    /// Generates a new random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CoreError::key_derivation_failed(format!(
                "invalid key size: expected {KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    /// Derives a key from the application secret with PBKDF2-HMAC-SHA256.
    ///
    /// The same `(secret, salt, iterations)` always yields the same key, so
    /// every process sharing the secret can read every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is empty or `iterations` is zero.
    pub fn derive(secret: &[u8], salt: &[u8], iterations: u32) -> CoreResult<Self> {
        if secret.is_empty() {
            return Err(CoreError::key_derivation_failed("secret is empty"));
        }
        if iterations == 0 {
            return Err(CoreError::key_derivation_failed("iteration count is zero"));
        }
        if iterations < DEFAULT_KDF_ITERATIONS {
            warn!(
                iterations,
                recommended = DEFAULT_KDF_ITERATIONS,
                "deriving field key with a low PBKDF2 iteration count"
            );
        }

        let mut bytes = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, iterations, &mut bytes);
        Ok(Self { bytes })
    }

    /// Returns the key bytes. Do not log or persist the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
