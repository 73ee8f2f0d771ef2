//! # Portal Audit Storage
//!
//! Log store trait and backends for the portal audit log.
//!
//! This crate is the lowest layer of the audit log. Stores persist
//! [`StoredRecord`]s whose confidential fields are already ciphertext; they
//! hold no key and never see plaintext names or emails.
//!
//! ## Design Principles
//!
//! - One entity type, append-only, no update or delete path
//! - Every backend answers the same [`LogStore`] trait so search and
//!   aggregation semantics cannot drift between them
//! - Reads never block on writers
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`FileStore`] - JSON array file, advisory lock + atomic rename
//! - [`SqliteStore`] - relational table with indexed fingerprint columns
//! - [`MemoryStore`] - for testing
//!
//! ## Example
//!
//! ```rust
//! use portal_audit_storage::{LogStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! assert!(store.list_recent(10).unwrap().is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod fingerprint;
mod lock;
mod memory;
mod record;
mod sqlite;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::{FileStore, DEFAULT_LOCK_TIMEOUT};
pub use fingerprint::{
    canonical_ip, canonical_mac, fingerprint, ip_fingerprint, mac_fingerprint,
};
pub use lock::{lock_path_for, FileLock};
pub use memory::MemoryStore;
pub use record::{
    most_recent_first, PlainField, Sealed, StoredRecord, Tally, TallyWindows,
    LEGACY_SCHEMA_VERSION,
};
pub use sqlite::SqliteStore;
pub use store::LogStore;
