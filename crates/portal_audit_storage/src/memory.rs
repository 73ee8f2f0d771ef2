//! In-memory log store for testing.

use crate::error::{StorageError, StorageResult};
use crate::record::{most_recent_first, StoredRecord};
use crate::store::LogStore;
use parking_lot::RwLock;

/// An in-memory log store.
///
/// Suitable for unit tests and for callers that need a throwaway log.
/// Nothing survives the process.
///
/// # Example
///
/// ```rust
/// use portal_audit_storage::{LogStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// assert_eq!(store.count().unwrap(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<StoredRecord>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything stored, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<StoredRecord> {
        self.records.read().clone()
    }
}

impl LogStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn append(&self, record: &StoredRecord) -> StorageResult<u64> {
        let mut records = self.records.write();
        if records.iter().any(|r| r.access_id == record.access_id) {
            return Err(StorageError::DuplicateAccessId(record.access_id.clone()));
        }
        let seq = records.len() as u64 + 1;
        let mut stored = record.clone();
        stored.seq = Some(seq);
        records.push(stored);
        Ok(seq)
    }

    fn list_recent(&self, limit: usize) -> StorageResult<Vec<StoredRecord>> {
        let mut records = self.records.read().clone();
        most_recent_first(&mut records, limit);
        Ok(records)
    }

    fn count(&self) -> StorageResult<u64> {
        Ok(self.records.read().len() as u64)
    }

    fn contains_access_id(&self, access_id: &str) -> StorageResult<bool> {
        Ok(self.records.read().iter().any(|r| r.access_id == access_id))
    }
}
