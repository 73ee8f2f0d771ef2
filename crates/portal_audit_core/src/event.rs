//! Access events as handed in by the portal.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a stored access event.
///
/// Formatted as `YYYYMMDDHHMMSS_` followed by 16 random hex digits. The
/// timestamp prefix keeps ids roughly sortable; uniqueness is enforced by
/// the store, which rejects duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccessId(String);

impl AccessId {
    /// Generates a fresh id for an event created at `at`.
    #[must_use]
    pub fn generate_at(at: DateTime<Utc>) -> Self {
        let mut suffix = Uuid::new_v4().simple().to_string();
        suffix.truncate(16);
        Self(format!("{}_{suffix}", at.format("%Y%m%d%H%M%S")))
    }

    /// Wraps an existing id, as read back from a store.
    #[must_use]
    pub fn from_stored(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One validated portal login, before encryption.
///
/// The caller has already checked formats and required fields; the audit
/// log only encodes and stores what it is given.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessEvent {
    /// Visitor name.
    pub name: String,
    /// Visitor email.
    pub email: String,
    /// Phone number, kept only under schema v1.
    pub phone: Option<String>,
    /// Birth date as entered, kept only under schema v1.
    pub birth_date: Option<String>,
    /// Source IP reported by the gateway.
    pub ip: Option<String>,
    /// MAC address reported by the gateway.
    pub mac: Option<String>,
    /// Browser user agent.
    pub user_agent: Option<String>,
    /// Creation instant.
    pub timestamp: DateTime<Utc>,
}

impl AccessEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: None,
            birth_date: None,
            ip: None,
            mac: None,
            user_agent: None,
            timestamp: Utc::now(),
        }
    }

    /// Builds an event from the portal's form field map.
    ///
    /// Accepts the current key names and the older ones (`nome`,
    /// `telefone`, `data_nascimento`). Empty optional values are treated as
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingField`] if `name` or `email` is missing or
    /// blank.
    pub fn from_fields(fields: &HashMap<String, String>) -> CoreResult<Self> {
        let lookup = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| fields.get(*k))
                .map(|v| v.trim())
                .find(|v| !v.is_empty())
                .map(str::to_string)
        };

        let name = lookup(&["name", "nome"]).ok_or_else(|| CoreError::missing_field("name"))?;
        let email = lookup(&["email"]).ok_or_else(|| CoreError::missing_field("email"))?;

        Ok(Self {
            name,
            email,
            phone: lookup(&["phone", "telefone"]),
            birth_date: lookup(&["birth_date", "data_nascimento"]),
            ip: lookup(&["ip"]),
            mac: lookup(&["mac"]),
            user_agent: lookup(&["user_agent"]),
            timestamp: Utc::now(),
        })
    }

    /// Sets the source IP.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Sets the MAC address.
    #[must_use]
    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Sets the birth date.
    #[must_use]
    pub fn with_birth_date(mut self, birth_date: impl Into<String>) -> Self {
        self.birth_date = Some(birth_date.into());
        self
    }

    /// Overrides the creation instant.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// Personal data stays out of debug output.
impl fmt::Debug for AccessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessEvent")
            .field("ip", &self.ip)
            .field("mac", &self.mac)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}
