//! Persisted shape of an access event.
//!
//! A [`StoredRecord`] is what both backends write and read back. Confidential
//! fields are held as [`Sealed`] ciphertext; the store never receives a key and
//! never sees the plaintext behind them. Network fields and their fingerprints
//! are stored in clear.

use crate::fingerprint::{ip_fingerprint, mac_fingerprint};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// Schema version assumed for records written before versions were stored.
pub const LEGACY_SCHEMA_VERSION: u32 = 1;

/// Ciphertext of a confidential field, as produced by the cipher service.
///
/// The storage layer treats the contents as opaque text. Only the record
/// codec constructs these, so a plaintext name or email cannot reach a
/// confidential column through the typed API.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sealed(String);

impl Sealed {
    /// Wraps already-encrypted text.
    #[must_use]
    pub fn new(ciphertext: impl Into<String>) -> Self {
        Self(ciphertext.into())
    }

    /// Returns the stored text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Sealed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sealed({} chars)", self.0.len())
    }
}

/// One access event as it sits in a log store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Insertion sequence number assigned by the store.
    ///
    /// Array position (1-based) for the file backend, primary key for SQLite.
    /// Not part of the persisted JSON.
    #[serde(skip)]
    pub seq: Option<u64>,

    /// Record schema version the event was written under.
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,

    /// Globally unique access identifier.
    pub access_id: String,

    /// Creation instant, UTC.
    #[serde(with = "utc_timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Encrypted visitor name.
    #[serde(alias = "nome")]
    pub name: Sealed,

    /// Encrypted visitor email.
    pub email: Sealed,

    /// Encrypted phone number (schema v1 only).
    #[serde(default, alias = "telefone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<Sealed>,

    /// Encrypted birth date (schema v1 only).
    #[serde(
        default,
        alias = "data_nascimento",
        skip_serializing_if = "Option::is_none"
    )]
    pub birth_date: Option<Sealed>,

    /// Source IP in textual form.
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub ip: Option<String>,

    /// SHA-256 hex of `ip`.
    #[serde(
        default,
        alias = "ip_hash",
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub ip_fingerprint: Option<String>,

    /// MAC address, colon-hex.
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub mac: Option<String>,

    /// SHA-256 hex of `mac`.
    #[serde(
        default,
        alias = "mac_hash",
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub mac_fingerprint: Option<String>,

    /// Browser user agent.
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_agent: Option<String>,
}

fn legacy_schema_version() -> u32 {
    LEGACY_SCHEMA_VERSION
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// RFC 3339 with microseconds on write; also accepts timestamps without an
/// offset, which older files contain, and reads them as UTC.
mod utc_timestamp {
    use super::*;

    const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, NAIVE_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

impl StoredRecord {
    /// Orders records most recent first: timestamp descending, then sequence
    /// number descending. Two distinct stored records never compare equal.
    #[must_use]
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }

    /// True for records written under schema v1 or before versions were stored.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.schema_version == LEGACY_SCHEMA_VERSION
    }

    /// Recomputes both fingerprints from the plaintext `ip` and `mac`.
    ///
    /// Legacy records hash the raw spelling, or leave the hash empty, so
    /// their stored fingerprints do not group with current ones.
    pub fn refresh_fingerprints(&mut self) {
        self.ip_fingerprint = self.ip.as_deref().and_then(ip_fingerprint);
        self.mac_fingerprint = self.mac.as_deref().and_then(mac_fingerprint);
    }
}

/// Sorts records most recent first and keeps at most `limit` of them.
pub fn most_recent_first(records: &mut Vec<StoredRecord>, limit: usize) {
    records.sort_by(StoredRecord::recency_cmp);
    records.truncate(limit);
}

/// Plaintext columns that can be searched without decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlainField {
    /// Source IP.
    Ip,
    /// MAC address.
    Mac,
    /// User agent string.
    UserAgent,
}

impl PlainField {
    /// Column / JSON key name.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Mac => "mac",
            Self::UserAgent => "user_agent",
        }
    }

    /// Returns this field's value on a record.
    #[must_use]
    pub fn value_of(self, record: &StoredRecord) -> Option<&str> {
        match self {
            Self::Ip => record.ip.as_deref(),
            Self::Mac => record.mac.as_deref(),
            Self::UserAgent => record.user_agent.as_deref(),
        }
    }

    /// ASCII case-insensitive substring match. `needle` must already be
    /// lowercased with [`str::to_ascii_lowercase`].
    ///
    /// SQLite's `LIKE` folds ASCII only, so every backend matches this way.
    #[must_use]
    pub fn matches(self, record: &StoredRecord, needle: &str) -> bool {
        self.value_of(record)
            .is_some_and(|v| v.to_ascii_lowercase().contains(needle))
    }
}

impl fmt::Display for PlainField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Lower bounds of the time windows counted by [`Tally`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyWindows {
    /// UTC midnight of the current day.
    pub today_start: DateTime<Utc>,
    /// Monday 00:00 UTC of the current ISO week.
    pub week_start: DateTime<Utc>,
}

/// Aggregate counts computed without decrypting anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Number of records.
    pub total: u64,
    /// Distinct non-empty IP fingerprints.
    pub unique_ips: u64,
    /// Distinct non-empty MAC fingerprints.
    pub unique_macs: u64,
    /// Records at or after `today_start`.
    pub today: u64,
    /// Records at or after `week_start`.
    pub this_week: u64,
}

impl Tally {
    /// Counts a sequence of records in memory.
    pub fn from_records<'a, I>(records: I, windows: &TallyWindows) -> Self
    where
        I: IntoIterator<Item = &'a StoredRecord>,
    {
        let mut tally = Self::default();
        let mut ips = HashSet::new();
        let mut macs = HashSet::new();

        for record in records {
            tally.total += 1;
            if let Some(fp) = &record.ip_fingerprint {
                ips.insert(fp.as_str());
            }
            if let Some(fp) = &record.mac_fingerprint {
                macs.insert(fp.as_str());
            }
            if record.timestamp >= windows.today_start {
                tally.today += 1;
            }
            if record.timestamp >= windows.week_start {
                tally.this_week += 1;
            }
        }

        tally.unique_ips = ips.len() as u64;
        tally.unique_macs = macs.len() as u64;
        tally
    }
}
