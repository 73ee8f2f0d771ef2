//! The audit log: appends, listing, search and statistics over a log store.

use crate::codec::{AccessRecord, RecordCodec, Visibility};
use crate::config::Config;
use crate::crypto::{Cipher, Revealed};
use crate::error::{CoreError, CoreResult};
use crate::event::{AccessEvent, AccessId};
use crate::stats::{AccessStats, AuditCounters, CountersSnapshot};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use portal_audit_storage::{LogStore, PlainField, Sealed, StoredRecord, TallyWindows};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A field that can be searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    /// Visitor name (confidential).
    Name,
    /// Visitor email (confidential).
    Email,
    /// Phone number (confidential, v1 records only).
    Phone,
    /// Birth date (confidential, v1 records only).
    BirthDate,
    /// Source IP.
    Ip,
    /// MAC address.
    Mac,
    /// User agent.
    UserAgent,
}

impl SearchField {
    /// The plaintext column behind this field, if it has one.
    #[must_use]
    pub const fn plain(self) -> Option<PlainField> {
        match self {
            Self::Ip => Some(PlainField::Ip),
            Self::Mac => Some(PlainField::Mac),
            Self::UserAgent => Some(PlainField::UserAgent),
            Self::Name | Self::Email | Self::Phone | Self::BirthDate => None,
        }
    }

    /// Returns true if searching this field requires decryption.
    #[must_use]
    pub const fn is_confidential(self) -> bool {
        self.plain().is_none()
    }

    fn sealed_value(self, record: &StoredRecord) -> Option<&Sealed> {
        match self {
            Self::Name => Some(&record.name),
            Self::Email => Some(&record.email),
            Self::Phone => record.phone.as_ref(),
            Self::BirthDate => record.birth_date.as_ref(),
            Self::Ip | Self::Mac | Self::UserAgent => None,
        }
    }
}

impl FromStr for SearchField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "nome" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            "phone" | "telefone" => Ok(Self::Phone),
            "birth_date" | "data_nascimento" => Ok(Self::BirthDate),
            "ip" => Ok(Self::Ip),
            "mac" => Ok(Self::Mac),
            "user_agent" => Ok(Self::UserAgent),
            _ => Err(CoreError::unknown_field(s)),
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::BirthDate => "birth_date",
            Self::Ip => "ip",
            Self::Mac => "mac",
            Self::UserAgent => "user_agent",
        })
    }
}

/// Outcome of [`AuditLog::import_from`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Records copied.
    pub imported: u64,
    /// Records whose access id was already present.
    pub skipped: u64,
}

/// Encrypted access log over a pluggable [`LogStore`].
///
/// Every backend shares this layer, so encryption, search and aggregation
/// behave the same whichever store is configured. The cipher is fixed at
/// construction.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use portal_audit_core::{AccessEvent, AuditLog, Cipher, CipherKey, Config, Visibility};
/// use portal_audit_storage::MemoryStore;
///
/// let cipher = Arc::new(Cipher::new(&CipherKey::generate()));
/// let log = AuditLog::new(Arc::new(MemoryStore::new()), cipher, Config::default()).unwrap();
///
/// log.append(&AccessEvent::new("Ana", "ana@example.org").with_ip("10.0.0.7")).unwrap();
///
/// let hits = log.search_named("ana", "name", Visibility::Reveal).unwrap();
/// assert_eq!(hits.len(), 1);
/// ```
pub struct AuditLog {
    store: Arc<dyn LogStore>,
    codec: RecordCodec,
    config: Config,
    counters: AuditCounters,
}

impl AuditLog {
    /// Creates an audit log writing to `store` with `cipher`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the configuration is unusable.
    pub fn new(store: Arc<dyn LogStore>, cipher: Arc<Cipher>, config: Config) -> CoreResult<Self> {
        config.validate()?;
        debug!(
            backend = store.kind(),
            encrypted = cipher.is_enabled(),
            schema = %config.schema_version,
            "opened audit log"
        );
        Ok(Self {
            store,
            codec: RecordCodec::new(cipher, config.schema_version),
            config,
            counters: AuditCounters::new(),
        })
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &dyn LogStore {
        self.store.as_ref()
    }

    /// The record codec.
    #[must_use]
    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Operation counters for this instance.
    #[must_use]
    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    /// Encrypts and durably stores an event.
    ///
    /// A fresh access id is generated; if the store already holds it, a new
    /// one is tried, up to `access_id_retries` times.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be encoded or the store write
    /// fails. No partial record is visible afterwards.
    pub fn append(&self, event: &AccessEvent) -> CoreResult<AccessId> {
        let result = self.append_inner(event);
        match &result {
            Ok(id) => {
                self.counters.record_append();
                info!(access_id = %id, backend = self.store.kind(), "access recorded");
            }
            Err(e) => {
                self.counters.record_append_failure();
                error!(error = %e, backend = self.store.kind(), "failed to record access");
            }
        }
        result
    }

    /// Like [`append`](Self::append), reporting only success.
    pub fn try_append(&self, event: &AccessEvent) -> bool {
        self.append(event).is_ok()
    }

    fn append_inner(&self, event: &AccessEvent) -> CoreResult<AccessId> {
        let mut id = AccessId::generate_at(event.timestamp);
        let mut record = self.codec.to_storage(event, &id)?;

        for attempt in 1..=self.config.access_id_retries {
            match self.store.append(&record) {
                Ok(_) => return Ok(id),
                Err(e) if e.is_duplicate() => {
                    self.counters.record_id_collision();
                    warn!(access_id = %id, attempt, "access id already stored, regenerating");
                    id = AccessId::generate_at(event.timestamp);
                    record.access_id = id.as_str().to_string();
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CoreError::AccessIdExhausted {
            attempts: self.config.access_id_retries,
        })
    }

    /// Returns at most `limit` records, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list_recent(&self, limit: usize, visibility: Visibility) -> CoreResult<Vec<AccessRecord>> {
        let records = self.store.list_recent(limit)?;
        Ok(self.decode(records, visibility))
    }

    /// Substring search on one field, most recent first.
    ///
    /// Plaintext fields are matched by the store, case-insensitively, up to
    /// `plain_search_limit` results. Confidential fields are matched by
    /// decrypting the newest `confidential_scan_window` records; older
    /// records are not searched. An empty term returns nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn search(
        &self,
        term: &str,
        field: SearchField,
        visibility: Visibility,
    ) -> CoreResult<Vec<AccessRecord>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let hits = match field.plain() {
            Some(column) => {
                self.counters.record_plain_search();
                self.store
                    .search_plain(column, term, self.config.plain_search_limit)?
            }
            None => self.scan_confidential(term, field)?,
        };
        Ok(self.decode(hits, visibility))
    }

    /// Like [`search`](Self::search), with the field given by name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownField`] for an unrecognized field name.
    pub fn search_named(
        &self,
        term: &str,
        field: &str,
        visibility: Visibility,
    ) -> CoreResult<Vec<AccessRecord>> {
        self.search(term, field.parse()?, visibility)
    }

    fn scan_confidential(&self, term: &str, field: SearchField) -> CoreResult<Vec<StoredRecord>> {
        let window = self.config.confidential_scan_window;
        let needle = term.to_lowercase();
        let started = Instant::now();

        let records = self.store.list_recent(window)?;
        let scanned = records.len();
        let mut unreadable = 0u64;

        let hits: Vec<_> = records
            .into_iter()
            .filter(|record| {
                let Some(sealed) = field.sealed_value(record) else {
                    return false;
                };
                match self.codec.cipher().decrypt(sealed.as_str()) {
                    Revealed::Clear(plain) => plain.to_lowercase().contains(&needle),
                    // Values stored before encryption was enabled come back
                    // as they are and must stay searchable.
                    Revealed::Unreadable(raw) => {
                        unreadable += 1;
                        raw.to_lowercase().contains(&needle)
                    }
                }
            })
            .collect();

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.counters
            .record_confidential_scan(scanned as u64, unreadable);
        info!(
            field = %field,
            scanned,
            matched = hits.len(),
            unreadable,
            elapsed_ms,
            "confidential field search"
        );
        if scanned >= window {
            warn!(
                field = %field,
                window,
                "search window saturated, older records were not searched"
            );
        }
        Ok(hits)
    }

    /// Aggregate counts as of now. Never fails; see [`stats_at`](Self::stats_at).
    pub fn stats(&self) -> AccessStats {
        self.stats_at(Utc::now())
    }

    /// Aggregate counts with "today" and "this week" relative to `now`.
    ///
    /// The day starts at UTC midnight and the week on Monday. If the store
    /// cannot be read, all counts are zero and `error` is set.
    pub fn stats_at(&self, now: DateTime<Utc>) -> AccessStats {
        match self.store.tally(&windows_at(now)) {
            Ok(tally) => tally.into(),
            Err(e) => {
                error!(error = %e, backend = self.store.kind(), "failed to compute access stats");
                AccessStats::failed(e.to_string())
            }
        }
    }

    /// Copies every record from `source` into this log's store.
    ///
    /// Records are copied as stored, ciphertext included, oldest first.
    /// Legacy records get their IP and MAC fingerprints recomputed on the way.
    /// Records whose access id is already present are skipped, so an
    /// interrupted import can be rerun.
    ///
    /// # Errors
    ///
    /// Returns an error if either store fails; records copied before the
    /// failure stay copied.
    pub fn import_from(&self, source: &dyn LogStore) -> CoreResult<ImportReport> {
        let mut records = source.list_recent(usize::MAX)?;
        records.reverse();

        let mut report = ImportReport::default();
        for mut record in records {
            if self.store.contains_access_id(&record.access_id)? {
                report.skipped += 1;
                continue;
            }
            record.seq = None;
            if record.is_legacy() {
                record.refresh_fingerprints();
            }
            match self.store.append(&record) {
                Ok(_) => report.imported += 1,
                Err(e) if e.is_duplicate() => report.skipped += 1,
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            from = source.kind(),
            to = self.store.kind(),
            imported = report.imported,
            skipped = report.skipped,
            "import finished"
        );
        Ok(report)
    }

    fn decode(&self, records: Vec<StoredRecord>, visibility: Visibility) -> Vec<AccessRecord> {
        records
            .into_iter()
            .map(|r| self.codec.from_storage(r, visibility))
            .collect()
    }
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog")
            .field("backend", &self.store.kind())
            .field("codec", &self.codec)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Start of the current UTC day and of its ISO week.
fn windows_at(now: DateTime<Utc>) -> TallyWindows {
    let today_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let since_monday = i64::from(now.weekday().num_days_from_monday());
    TallyWindows {
        today_start,
        week_start: today_start - Duration::days(since_monday),
    }
}
