//! SQLite-backed log store.
//!
//! One `access_logs` table. Confidential columns are typed as [`Sealed`] at
//! the binding boundary, so only ciphertext produced by the record codec can
//! be written to them and reads hand back ciphertext for the codec to open.
//! Fingerprint columns are indexed for equality, and `(timestamp_us, id)`
//! carries a composite index for recency-ordered pagination.

use crate::error::{StorageError, StorageResult};
use crate::file::DEFAULT_LOCK_TIMEOUT;
use crate::record::{PlainField, Sealed, StoredRecord, Tally, TallyWindows};
use crate::store::LogStore;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, ToSql};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS access_logs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    schema_version  INTEGER NOT NULL,
    access_id       TEXT    NOT NULL UNIQUE,
    timestamp_us    INTEGER NOT NULL,
    name            TEXT    NOT NULL,
    email           TEXT    NOT NULL,
    phone           TEXT,
    birth_date      TEXT,
    ip              TEXT,
    ip_fingerprint  TEXT,
    mac             TEXT,
    mac_fingerprint TEXT,
    user_agent      TEXT
);
CREATE INDEX IF NOT EXISTS idx_access_logs_timestamp ON access_logs(timestamp_us);
CREATE INDEX IF NOT EXISTS idx_access_logs_timestamp_id ON access_logs(timestamp_us, id);
CREATE INDEX IF NOT EXISTS idx_access_logs_ip ON access_logs(ip);
CREATE INDEX IF NOT EXISTS idx_access_logs_mac ON access_logs(mac);
CREATE INDEX IF NOT EXISTS idx_access_logs_ip_fingerprint ON access_logs(ip_fingerprint);
CREATE INDEX IF NOT EXISTS idx_access_logs_mac_fingerprint ON access_logs(mac_fingerprint);
";

const SELECT_COLUMNS: &str = "id, schema_version, access_id, timestamp_us, name, email, phone, \
     birth_date, ip, ip_fingerprint, mac, mac_fingerprint, user_agent";

impl ToSql for Sealed {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Sealed {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        String::column_result(value).map(Sealed::new)
    }
}

/// A log store backed by a SQLite database.
///
/// Each append runs in its own transaction; a failed insert rolls back and
/// leaves no row behind. Concurrent writers from other processes are
/// serialized by SQLite itself, waiting up to the busy timeout.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates a database file and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "database opened");
        Self::init(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.busy_timeout(DEFAULT_LOCK_TIMEOUT)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Sets how long a writer waits for another connection's lock.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite rejects the setting.
    pub fn with_busy_timeout(self, timeout: Duration) -> StorageResult<Self> {
        self.conn.lock().busy_timeout(timeout)?;
        Ok(self)
    }

    fn query_records<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> StorageResult<Vec<StoredRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, row_to_record)?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let seq: i64 = row.get(0)?;
    let schema_version: u32 = row.get(1)?;
    let timestamp_us: i64 = row.get(3)?;
    let timestamp = DateTime::<Utc>::from_timestamp_micros(timestamp_us)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(3, timestamp_us))?;

    Ok(StoredRecord {
        seq: Some(seq as u64),
        schema_version,
        access_id: row.get(2)?,
        timestamp,
        name: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
        birth_date: row.get(7)?,
        ip: row.get(8)?,
        ip_fingerprint: row.get(9)?,
        mac: row.get(10)?,
        mac_fingerprint: row.get(11)?,
        user_agent: row.get(12)?,
    })
}

/// Escapes `%`, `_` and the escape character itself for a `LIKE` pattern.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn map_insert_error(err: rusqlite::Error, access_id: &str) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StorageError::DuplicateAccessId(access_id.to_string())
        }
        _ => StorageError::Database(err),
    }
}

impl LogStore for SqliteStore {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    fn append(&self, record: &StoredRecord) -> StorageResult<u64> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO access_logs (schema_version, access_id, timestamp_us, name, email, \
             phone, birth_date, ip, ip_fingerprint, mac, mac_fingerprint, user_agent) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.schema_version,
                record.access_id,
                record.timestamp.timestamp_micros(),
                record.name,
                record.email,
                record.phone,
                record.birth_date,
                record.ip,
                record.ip_fingerprint,
                record.mac,
                record.mac_fingerprint,
                record.user_agent,
            ],
        )
        .map_err(|e| map_insert_error(e, &record.access_id))?;
        let seq = tx.last_insert_rowid();
        tx.commit()?;

        debug!(seq, access_id = %record.access_id, "row inserted");
        Ok(seq as u64)
    }

    fn list_recent(&self, limit: usize) -> StorageResult<Vec<StoredRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM access_logs \
             ORDER BY timestamp_us DESC, id DESC LIMIT ?1"
        );
        self.query_records(&sql, params![clamp_limit(limit)])
    }

    fn count(&self) -> StorageResult<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM access_logs", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    fn contains_access_id(&self, access_id: &str) -> StorageResult<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM access_logs WHERE access_id = ?1",
                params![access_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn search_plain(
        &self,
        field: PlainField,
        term: &str,
        limit: usize,
    ) -> StorageResult<Vec<StoredRecord>> {
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM access_logs \
             WHERE {column} LIKE ?1 ESCAPE '\\' \
             ORDER BY timestamp_us DESC, id DESC LIMIT ?2",
            column = field.column()
        );
        self.query_records(&sql, params![like_pattern(term), clamp_limit(limit)])
    }

    fn tally(&self, windows: &TallyWindows) -> StorageResult<Tally> {
        let conn = self.conn.lock();
        let tally = conn.query_row(
            "SELECT COUNT(*), \
                    COUNT(DISTINCT ip_fingerprint), \
                    COUNT(DISTINCT mac_fingerprint), \
                    COALESCE(SUM(CASE WHEN timestamp_us >= ?1 THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN timestamp_us >= ?2 THEN 1 ELSE 0 END), 0) \
             FROM access_logs",
            params![
                windows.today_start.timestamp_micros(),
                windows.week_start.timestamp_micros()
            ],
            |row| {
                Ok(Tally {
                    total: row.get::<_, i64>(0)? as u64,
                    unique_ips: row.get::<_, i64>(1)? as u64,
                    unique_macs: row.get::<_, i64>(2)? as u64,
                    today: row.get::<_, i64>(3)? as u64,
                    this_week: row.get::<_, i64>(4)? as u64,
                })
            },
        )?;
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record(id: &str, secs: i64) -> StoredRecord {
        StoredRecord {
            seq: None,
            schema_version: 2,
            access_id: id.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            name: Sealed::new("bmFtZQ"),
            email: Sealed::new("ZW1haWw"),
            phone: None,
            birth_date: None,
            ip: Some("10.0.0.1".into()),
            ip_fingerprint: Some("f".repeat(64)),
            mac: None,
            mac_fingerprint: None,
            user_agent: Some("Mozilla/5.0 100%_real".into()),
        }
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("a%b_c\\"), "%a\\%b\\_c\\\\%");
    }

    #[test]
    fn round_trips_a_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut rec = record("a", 1_700_000_000);
        rec.timestamp = rec.timestamp + chrono::Duration::microseconds(42);
        rec.phone = Some(Sealed::new("cGhvbmU"));

        let seq = store.append(&rec).unwrap();
        let back = store.list_recent(1).unwrap().remove(0);

        rec.seq = Some(seq);
        assert_eq!(back, rec);
    }

    #[test]
    fn unique_access_id_enforced() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.append(&record("dup", 1)).unwrap();
        let err = store.append(&record("dup", 2)).unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.contains_access_id("dup").unwrap());
        assert!(!store.contains_access_id("other").unwrap());
    }

    #[test]
    fn wildcards_in_term_match_literally() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.append(&record("a", 1)).unwrap();

        let hits = store.search_plain(PlainField::UserAgent, "100%_", 10).unwrap();
        assert_eq!(hits.len(), 1);
        let misses = store.search_plain(PlainField::UserAgent, "1%0", 10).unwrap();
        assert!(misses.is_empty());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.append(&record("a", 1)).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
