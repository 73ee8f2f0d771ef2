//! Record codec: access events to and from their stored form.
//!
//! Name, email and (schema v1) phone and birth date are encrypted. IP, MAC
//! and user agent are stored in clear, and IP and MAC also get a SHA-256
//! fingerprint of their canonical form so equal addresses group together
//! regardless of how the gateway spelled them.

use crate::crypto::{Cipher, Revealed};
use crate::error::{CoreError, CoreResult};
use crate::event::{AccessEvent, AccessId};
use chrono::{DateTime, Utc};
use portal_audit_storage::{ip_fingerprint, mac_fingerprint, Sealed, StoredRecord};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Marker shown instead of a confidential value on a redacted read.
pub const REDACTED: &str = "[encrypted]";

/// Version of the stored field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaVersion {
    /// Name, email, phone and birth date are collected.
    V1,
    /// Phone and birth date are no longer collected.
    V2,
}

impl SchemaVersion {
    /// Number written to the `schema_version` field.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    /// Maps a stored number back to a version.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            _ => None,
        }
    }

    /// Returns true if phone and birth date are part of this schema.
    #[must_use]
    pub const fn keeps_contact_details(self) -> bool {
        matches!(self, Self::V1)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u32())
    }
}

/// Whether a read may see confidential plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Decrypt confidential fields. For authenticated administrators.
    Reveal,
    /// Replace confidential fields with [`REDACTED`].
    Redact,
}

/// A confidential field as returned by a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfidentialValue {
    /// Decrypted plaintext.
    Clear(String),
    /// Stored value that could not be decrypted, returned verbatim.
    Unreadable(String),
    /// Withheld from this reader.
    Redacted,
}

impl ConfidentialValue {
    /// Text to display: the plaintext, the raw stored value, or the marker.
    #[must_use]
    pub fn display_text(&self) -> &str {
        match self {
            Self::Clear(s) | Self::Unreadable(s) => s,
            Self::Redacted => REDACTED,
        }
    }

    /// Returns the plaintext if the value was decrypted.
    #[must_use]
    pub fn clear(&self) -> Option<&str> {
        match self {
            Self::Clear(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if the stored value could not be decrypted.
    #[must_use]
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::Unreadable(_))
    }
}

impl From<Revealed> for ConfidentialValue {
    fn from(revealed: Revealed) -> Self {
        match revealed {
            Revealed::Clear(s) => Self::Clear(s),
            Revealed::Unreadable(s) => Self::Unreadable(s),
        }
    }
}

/// An access event read back from a store.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRecord {
    /// Insertion sequence number, when the store provides one.
    pub seq: Option<u64>,
    /// Schema version the record was written under, as stored.
    pub schema_version: u32,
    /// Unique access id.
    pub access_id: AccessId,
    /// Creation instant.
    pub timestamp: DateTime<Utc>,
    /// Visitor name.
    pub name: ConfidentialValue,
    /// Visitor email.
    pub email: ConfidentialValue,
    /// Phone number, for v1 records that carry one.
    pub phone: Option<ConfidentialValue>,
    /// Birth date, for v1 records that carry one.
    pub birth_date: Option<ConfidentialValue>,
    /// Source IP.
    pub ip: Option<String>,
    /// Fingerprint of the source IP.
    pub ip_fingerprint: Option<String>,
    /// MAC address.
    pub mac: Option<String>,
    /// Fingerprint of the MAC address.
    pub mac_fingerprint: Option<String>,
    /// User agent.
    pub user_agent: Option<String>,
}

impl AccessRecord {
    /// Flattens the record into the field map shown to administrators.
    ///
    /// Network fields are always present (empty when absent); phone and
    /// birth date appear only when the record has them. `date` and `time`
    /// are derived from the timestamp.
    #[must_use]
    pub fn to_field_map(&self) -> BTreeMap<&'static str, String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();

        let mut map = BTreeMap::new();
        map.insert("access_id", self.access_id.to_string());
        map.insert(
            "timestamp",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
        );
        map.insert("date", self.timestamp.format("%Y-%m-%d").to_string());
        map.insert("time", self.timestamp.format("%H:%M:%S").to_string());
        map.insert("schema_version", self.schema_version.to_string());
        map.insert("name", self.name.display_text().to_string());
        map.insert("email", self.email.display_text().to_string());
        if let Some(phone) = &self.phone {
            map.insert("phone", phone.display_text().to_string());
        }
        if let Some(birth_date) = &self.birth_date {
            map.insert("birth_date", birth_date.display_text().to_string());
        }
        map.insert("ip", opt(&self.ip));
        map.insert("ip_fingerprint", opt(&self.ip_fingerprint));
        map.insert("mac", opt(&self.mac));
        map.insert("mac_fingerprint", opt(&self.mac_fingerprint));
        map.insert("user_agent", opt(&self.user_agent));
        map
    }
}

/// Encrypts events for storage and decodes stored records.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    cipher: Arc<Cipher>,
    schema: SchemaVersion,
}

impl RecordCodec {
    /// Creates a codec that writes under `schema`.
    #[must_use]
    pub fn new(cipher: Arc<Cipher>, schema: SchemaVersion) -> Self {
        Self { cipher, schema }
    }

    /// The cipher in use.
    #[must_use]
    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }

    /// Schema version of newly encoded records.
    #[must_use]
    pub fn schema_version(&self) -> SchemaVersion {
        self.schema
    }

    /// Encodes an event for storage under `access_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if name or email is blank, or if encryption fails.
    pub fn to_storage(&self, event: &AccessEvent, access_id: &AccessId) -> CoreResult<StoredRecord> {
        if event.name.trim().is_empty() {
            return Err(CoreError::missing_field("name"));
        }
        if event.email.trim().is_empty() {
            return Err(CoreError::missing_field("email"));
        }

        let (phone, birth_date) = if self.schema.keeps_contact_details() {
            (
                self.seal_optional(event.phone.as_deref())?,
                self.seal_optional(event.birth_date.as_deref())?,
            )
        } else {
            if event.phone.is_some() || event.birth_date.is_some() {
                debug!(schema = %self.schema, "dropping phone and birth date not kept by schema");
            }
            (None, None)
        };

        let ip = non_empty(event.ip.as_deref());
        let mac = non_empty(event.mac.as_deref());

        Ok(StoredRecord {
            seq: None,
            schema_version: self.schema.as_u32(),
            access_id: access_id.as_str().to_string(),
            timestamp: event.timestamp,
            name: self.seal(&event.name)?,
            email: self.seal(&event.email)?,
            phone,
            birth_date,
            ip_fingerprint: ip.as_deref().and_then(ip_fingerprint),
            ip,
            mac_fingerprint: mac.as_deref().and_then(mac_fingerprint),
            mac,
            user_agent: non_empty(event.user_agent.as_deref()),
        })
    }

    /// Decodes a stored record, decrypting or redacting confidential fields.
    #[must_use]
    pub fn from_storage(&self, record: StoredRecord, visibility: Visibility) -> AccessRecord {
        let open = |sealed: &Sealed| self.open(sealed, visibility);

        AccessRecord {
            seq: record.seq,
            schema_version: record.schema_version,
            access_id: AccessId::from_stored(record.access_id),
            timestamp: record.timestamp,
            name: open(&record.name),
            email: open(&record.email),
            phone: record.phone.as_ref().map(open),
            birth_date: record.birth_date.as_ref().map(open),
            ip: record.ip,
            ip_fingerprint: record.ip_fingerprint,
            mac: record.mac,
            mac_fingerprint: record.mac_fingerprint,
            user_agent: record.user_agent,
        }
    }

    fn seal(&self, plaintext: &str) -> CoreResult<Sealed> {
        self.cipher.encrypt(plaintext).map(Sealed::new)
    }

    fn seal_optional(&self, plaintext: Option<&str>) -> CoreResult<Option<Sealed>> {
        non_empty(plaintext).map(|v| self.seal(&v)).transpose()
    }

    fn open(&self, sealed: &Sealed, visibility: Visibility) -> ConfidentialValue {
        match visibility {
            Visibility::Reveal => self.cipher.decrypt(sealed.as_str()).into(),
            Visibility::Redact => ConfidentialValue::Redacted,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
