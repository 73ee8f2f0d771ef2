//! Audit log configuration.

use crate::codec::SchemaVersion;
use crate::error::{CoreError, CoreResult};
use std::time::Duration;

/// Configuration for an [`AuditLog`](crate::AuditLog) and the stores it opens.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long a file-store writer waits for the advisory lock.
    pub lock_timeout: Duration,

    /// Maximum results from a search on a plaintext field.
    pub plain_search_limit: usize,

    /// How many of the most recent records a confidential-field search
    /// decrypts and scans.
    pub confidential_scan_window: usize,

    /// Default number of records returned by a listing.
    pub list_limit: usize,

    /// Schema version new records are written under.
    pub schema_version: SchemaVersion,

    /// How many fresh access ids to try when the store reports a duplicate.
    pub access_id_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(10),
            plain_search_limit: 1000,
            confidential_scan_window: 10_000,
            list_limit: 1000,
            schema_version: SchemaVersion::V2,
            access_id_retries: 3,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the file lock timeout.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the plaintext search result limit.
    #[must_use]
    pub const fn plain_search_limit(mut self, limit: usize) -> Self {
        self.plain_search_limit = limit;
        self
    }

    /// Sets the confidential search scan window.
    #[must_use]
    pub const fn confidential_scan_window(mut self, window: usize) -> Self {
        self.confidential_scan_window = window;
        self
    }

    /// Sets the default listing size.
    #[must_use]
    pub const fn list_limit(mut self, limit: usize) -> Self {
        self.list_limit = limit;
        self
    }

    /// Sets the schema version for new records.
    #[must_use]
    pub const fn schema_version(mut self, version: SchemaVersion) -> Self {
        self.schema_version = version;
        self
    }

    /// Sets how many access ids to try per append.
    #[must_use]
    pub const fn access_id_retries(mut self, retries: u32) -> Self {
        self.access_id_retries = retries;
        self
    }

    /// Checks that every bound is usable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if a limit or the retry count is zero.
    pub fn validate(&self) -> CoreResult<()> {
        if self.plain_search_limit == 0 {
            return Err(CoreError::invalid_config("plain_search_limit must be positive"));
        }
        if self.confidential_scan_window == 0 {
            return Err(CoreError::invalid_config(
                "confidential_scan_window must be positive",
            ));
        }
        if self.list_limit == 0 {
            return Err(CoreError::invalid_config("list_limit must be positive"));
        }
        if self.access_id_retries == 0 {
            return Err(CoreError::invalid_config("access_id_retries must be positive"));
        }
        Ok(())
    }
}
