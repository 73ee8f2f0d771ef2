//! # Portal Audit Core
//!
//! Encrypted access log for a captive portal.
//!
//! This crate provides:
//! - Field encryption with AES-256-GCM and PBKDF2-derived keys
//! - The record codec that decides which fields are encrypted, which stay
//!   in clear and which get a fingerprint
//! - [`AuditLog`], the query and aggregation layer shared by every
//!   [`LogStore`](portal_audit_storage::LogStore) backend
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use portal_audit_core::{AccessEvent, AuditLog, Cipher, CipherKey, Config, Visibility};
//! use portal_audit_storage::MemoryStore;
//!
//! let key = CipherKey::derive(b"portal secret", b"salt", 1_000).unwrap();
//! let log = AuditLog::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(Cipher::new(&key)),
//!     Config::default(),
//! )
//! .unwrap();
//!
//! log.append(&AccessEvent::new("Ana", "ana@example.org").with_ip("10.0.0.7")).unwrap();
//!
//! let stats = log.stats();
//! assert_eq!(stats.total_accesses, 1);
//! assert_eq!(stats.unique_ips, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod audit;
mod codec;
mod config;
pub mod crypto;
mod error;
mod event;
mod stats;

pub use audit::{AuditLog, ImportReport, SearchField};
pub use codec::{
    AccessRecord, ConfidentialValue, RecordCodec, SchemaVersion, Visibility, REDACTED,
};
pub use config::Config;
pub use crypto::{fingerprint, Cipher, CipherKey, Revealed, DEFAULT_KDF_ITERATIONS, DEFAULT_KEY_SALT};
pub use error::{CoreError, CoreResult};
pub use event::{AccessEvent, AccessId};
pub use stats::{AccessStats, AuditCounters, CountersSnapshot};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
