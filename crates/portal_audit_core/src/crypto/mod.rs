//! Field encryption for the audit log.
//!
//! - AES-256-GCM authenticated encryption, fresh nonce per value
//! - Keys derived from the application secret with PBKDF2-HMAC-SHA256
//! - Keys are zeroized on drop
//! - Decryption fails open: unreadable values come back tagged, never as errors
//!
//! ## Usage
//!
//! ```
//! use portal_audit_core::crypto::{Cipher, CipherKey, Revealed};
//!
//! let key = CipherKey::derive(b"portal secret", b"salt", 1_000).unwrap();
//! let cipher = Cipher::new(&key);
//!
//! let sealed = cipher.encrypt("Maria").unwrap();
//! assert_eq!(cipher.decrypt(&sealed), Revealed::Clear("Maria".into()));
//! ```

mod cipher;
mod key;

pub use cipher::{Cipher, Revealed, CIPHERTEXT_PREFIX, NONCE_SIZE, TAG_SIZE};
pub use key::{CipherKey, DEFAULT_KDF_ITERATIONS, DEFAULT_KEY_SALT, KEY_SIZE};
pub use portal_audit_storage::fingerprint;
