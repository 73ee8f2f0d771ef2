//! Error types for the audit log core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in audit log operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Log store error.
    #[error("storage error: {0}")]
    Storage(#[from] portal_audit_storage::StorageError),

    /// A required input field was missing or empty.
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the field.
        field: String,
    },

    /// A search was requested on a field that does not exist.
    #[error("unknown search field: {name}")]
    UnknownField {
        /// The name that was given.
        name: String,
    },

    /// Encryption failed.
    #[error("encryption failed: {message}")]
    EncryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// Key derivation failed or was given unusable parameters.
    #[error("key derivation failed: {message}")]
    KeyDerivationFailed {
        /// Description of the failure.
        message: String,
    },

    /// Configuration is not usable.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// Every generated access id collided with an existing record.
    #[error("could not allocate a unique access id after {attempts} attempts")]
    AccessIdExhausted {
        /// How many ids were tried.
        attempts: u32,
    },
}

impl CoreError {
    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(name: impl Into<String>) -> Self {
        Self::UnknownField { name: name.into() }
    }

    /// Creates an encryption failed error.
    pub fn encryption_failed(message: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a key derivation failed error.
    pub fn key_derivation_failed(message: impl Into<String>) -> Self {
        Self::KeyDerivationFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
