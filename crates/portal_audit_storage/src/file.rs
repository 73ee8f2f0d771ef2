//! JSON-file log store.

use crate::error::{StorageError, StorageResult};
use crate::lock::FileLock;
use crate::record::{most_recent_first, StoredRecord};
use crate::store::LogStore;
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Default time to wait for the writer lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// A log store backed by a single JSON file holding an array of records.
///
/// # Write path
///
/// `append` takes the exclusive advisory lock, reads the current array,
/// pushes the new record, writes the whole array to a temporary file in the
/// same directory, renames it over the target and fsyncs the directory so the
/// rename is durable. The lock is released when
/// the guard drops, on every exit path.
///
/// # Read path
///
/// Reads take no lock. Because writes swap the file atomically, a reader
/// sees either the previous array or the new one, never a mix.
///
/// # Recovery
///
/// A file that is not valid JSON, or not a JSON array, reads as empty and a
/// warning is logged. The next append replaces it with a fresh array, so the
/// unreadable contents are lost. Individual array entries that do not parse
/// as records are skipped on read but preserved on rewrite.
///
/// # Example
///
/// ```no_run
/// use portal_audit_storage::{FileStore, LogStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("data/access_log.json")).unwrap();
/// let latest = store.list_recent(20).unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    /// Opens a file store at `path`, creating parent directories if needed.
    ///
    /// The file itself is created by the first append.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// Sets how long `append` waits for the writer lock.
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the raw array entries.
    fn read_entries(&self) -> StorageResult<Vec<Value>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Array(entries)) => Ok(entries),
            Ok(other) => {
                warn!(
                    path = %self.path.display(),
                    found = json_kind(&other),
                    "log file is not a JSON array; treating as empty"
                );
                Ok(Vec::new())
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "log file is not valid JSON; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Reads and decodes every record, numbering them by array position.
    fn read_records(&self) -> StorageResult<Vec<StoredRecord>> {
        let entries = self.read_entries()?;
        let mut records = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<StoredRecord>(entry) {
                Ok(mut record) => {
                    record.seq = Some(index as u64 + 1);
                    if record.is_legacy() {
                        record.refresh_fingerprints();
                    }
                    records.push(record);
                }
                Err(err) => {
                    warn!(path = %self.path.display(), index, %err, "skipping unreadable log entry");
                }
            }
        }
        Ok(records)
    }

    /// Writes the array to a temp file beside the target and renames it
    /// into place. The temp file is removed if anything fails.
    fn write_atomic(&self, entries: &[Value]) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), entries)?;
        tmp.as_file_mut().write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;
        sync_directory(dir)?;

        debug!(path = %self.path.display(), entries = entries.len(), "log file replaced");
        Ok(())
    }
}

/// Fsyncs `dir` so a rename inside it survives a crash.
#[cfg(unix)]
fn sync_directory(dir: &Path) -> StorageResult<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

/// NTFS journals metadata; directories cannot be opened for fsync.
#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> StorageResult<()> {
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl LogStore for FileStore {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn append(&self, record: &StoredRecord) -> StorageResult<u64> {
        let _lock = FileLock::acquire(&self.path, self.lock_timeout)?;

        let mut entries = self.read_entries()?;
        let duplicate = entries.iter().any(|entry| {
            entry.get("access_id").and_then(Value::as_str) == Some(record.access_id.as_str())
        });
        if duplicate {
            return Err(StorageError::DuplicateAccessId(record.access_id.clone()));
        }

        entries.push(serde_json::to_value(record)?);
        self.write_atomic(&entries)?;

        Ok(entries.len() as u64)
    }

    fn list_recent(&self, limit: usize) -> StorageResult<Vec<StoredRecord>> {
        let mut records = self.read_records()?;
        most_recent_first(&mut records, limit);
        Ok(records)
    }

    fn count(&self) -> StorageResult<u64> {
        Ok(self.read_records()?.len() as u64)
    }

    fn contains_access_id(&self, access_id: &str) -> StorageResult<bool> {
        Ok(self
            .read_entries()?
            .iter()
            .any(|entry| entry.get("access_id").and_then(Value::as_str) == Some(access_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Sealed;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn record(id: &str, secs: i64) -> StoredRecord {
        StoredRecord {
            seq: None,
            schema_version: 2,
            access_id: id.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            name: Sealed::new("c2VhbGVk"),
            email: Sealed::new("c2VhbGVk"),
            phone: None,
            birth_date: None,
            ip: Some("10.0.0.1".into()),
            ip_fingerprint: None,
            mac: None,
            mac_fingerprint: None,
            user_agent: None,
        }
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("log.json")).unwrap();
        assert!(store.list_recent(10).unwrap().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn append_creates_json_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.json");
        let store = FileStore::open(&path).unwrap();

        assert_eq!(store.append(&record("a", 1)).unwrap(), 1);
        assert_eq!(store.append(&record("b", 2)).unwrap(), 2);

        let raw: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let entries = raw.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["access_id"], "b");
    }

    #[test]
    fn create_with_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("path").join("log.json");
        let store = FileStore::open(&path).unwrap();
        store.append(&record("a", 1)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn corrupt_file_reads_empty_then_accepts_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(&path, b"{not json at all").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.list_recent(10).unwrap().is_empty());

        store.append(&record("a", 1)).unwrap();
        let records = store.list_recent(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].access_id, "a");
    }

    #[test]
    fn non_array_reads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(&path, br#"{"access_id": "x"}"#).unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.list_recent(10).unwrap().is_empty());
    }

    #[test]
    fn unreadable_entries_survive_rewrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(&path, br#"[{"something": "else"}]"#).unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 0);
        store.append(&record("a", 1)).unwrap();

        let raw: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw.as_array().unwrap().len(), 2);
        assert_eq!(raw[0]["something"], "else");
    }

    #[test]
    fn duplicate_access_id_rejected() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("log.json")).unwrap();
        store.append(&record("same", 1)).unwrap();

        let err = store.append(&record("same", 2)).unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("log.json")).unwrap();
        for i in 0..5 {
            store.append(&record(&format!("r{i}"), i)).unwrap();
        }

        let mut names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["log.json", "log.json.lock"]);
    }

    #[test]
    fn append_times_out_while_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.json");
        let store = FileStore::open(&path)
            .unwrap()
            .with_lock_timeout(Duration::from_millis(50));

        let _held = FileLock::acquire(&path, Duration::from_secs(1)).unwrap();
        let err = store.append(&record("a", 1)).unwrap_err();
        assert!(matches!(err, StorageError::LockTimeout { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn sync_directory_accepts_store_dir() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("log.json")).unwrap();
        store.append(&record("a", 1)).unwrap();
        sync_directory(dir.path()).unwrap();
    }

    #[test]
    fn path_accessor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.json");
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.path(), path);
    }
}
