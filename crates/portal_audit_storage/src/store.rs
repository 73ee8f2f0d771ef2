//! Log store trait definition.

use crate::error::StorageResult;
use crate::record::{most_recent_first, PlainField, StoredRecord, Tally, TallyWindows};

/// An append-only store of access records.
///
/// Stores persist [`StoredRecord`]s exactly as given: encryption and
/// fingerprinting already happened in the record codec. Records are never
/// updated or deleted through this trait.
///
/// # Invariants
///
/// - `append` either makes the whole record visible to later reads or
///   nothing at all
/// - `access_id` is unique across the store; a duplicate is rejected with
///   [`StorageError::DuplicateAccessId`](crate::StorageError::DuplicateAccessId)
/// - reads return records most recent first by `(timestamp, seq)`
/// - reads never block on writers
///
/// # Implementors
///
/// - [`super::FileStore`] - JSON array file, lock + atomic rename
/// - [`super::SqliteStore`] - relational table
/// - [`super::MemoryStore`] - for tests
pub trait LogStore: Send + Sync {
    /// Short backend name for logs.
    fn kind(&self) -> &'static str;

    /// Appends a record and returns its sequence number.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be durably written. No
    /// partial record is visible afterwards.
    fn append(&self, record: &StoredRecord) -> StorageResult<u64>;

    /// Returns at most `limit` records, most recent first.
    ///
    /// An empty or missing store yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or database failure.
    fn list_recent(&self, limit: usize) -> StorageResult<Vec<StoredRecord>>;

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or database failure.
    fn count(&self) -> StorageResult<u64>;

    /// Returns true if a record with this access id exists.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or database failure.
    fn contains_access_id(&self, access_id: &str) -> StorageResult<bool>;

    /// Case-insensitive substring search on a plaintext column, most recent
    /// first, at most `limit` results. An empty term matches nothing.
    ///
    /// The default scans every record; backends with an engine override it.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or database failure.
    fn search_plain(
        &self,
        field: PlainField,
        term: &str,
        limit: usize,
    ) -> StorageResult<Vec<StoredRecord>> {
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let needle = term.to_ascii_lowercase();
        let mut hits: Vec<_> = self
            .list_recent(usize::MAX)?
            .into_iter()
            .filter(|r| field.matches(r, &needle))
            .collect();
        most_recent_first(&mut hits, limit);
        Ok(hits)
    }

    /// Computes aggregate counts from fingerprints and timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O or database failure.
    fn tally(&self, windows: &TallyWindows) -> StorageResult<Tally> {
        let records = self.list_recent(usize::MAX)?;
        Ok(Tally::from_records(&records, windows))
    }
}
