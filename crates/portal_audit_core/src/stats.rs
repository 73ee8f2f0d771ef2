//! Access statistics and audit log operation counters.
//!
//! [`AccessStats`] is the dashboard summary computed from the store.
//! [`AuditCounters`] counts what this process did, so operators can see
//! append failures and how much decrypt-and-scan work searches cost.

use portal_audit_storage::Tally;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate counts for the admin dashboard.
///
/// Computed from fingerprints and timestamps only. When the store could not
/// be read every count is zero and `error` says why.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AccessStats {
    /// Number of stored records.
    pub total_accesses: u64,
    /// Distinct IP fingerprints.
    pub unique_ips: u64,
    /// Distinct MAC fingerprints, records without a MAC excluded.
    pub unique_macs: u64,
    /// Records since UTC midnight.
    pub today_accesses: u64,
    /// Records since Monday 00:00 UTC.
    pub this_week_accesses: u64,
    /// Why the counts are zero, if computing them failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AccessStats {
    /// Zero-filled stats carrying an error message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Returns true if the counts are real.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl From<Tally> for AccessStats {
    fn from(tally: Tally) -> Self {
        Self {
            total_accesses: tally.total,
            unique_ips: tally.unique_ips,
            unique_macs: tally.unique_macs,
            today_accesses: tally.today,
            this_week_accesses: tally.this_week,
            error: None,
        }
    }
}

/// Operation counters for one [`AuditLog`](crate::AuditLog).
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct AuditCounters {
    appends: AtomicU64,
    append_failures: AtomicU64,
    id_collisions: AtomicU64,
    plain_searches: AtomicU64,
    confidential_scans: AtomicU64,
    records_scanned: AtomicU64,
    unreadable_fields: AtomicU64,
}

impl AuditCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_append(&self) {
        self.appends.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_append_failure(&self) {
        self.append_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_id_collision(&self) {
        self.id_collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_plain_search(&self) {
        self.plain_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_confidential_scan(&self, scanned: u64, unreadable: u64) {
        self.confidential_scans.fetch_add(1, Ordering::Relaxed);
        self.records_scanned.fetch_add(scanned, Ordering::Relaxed);
        self.unreadable_fields.fetch_add(unreadable, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            appends: self.appends.load(Ordering::Relaxed),
            append_failures: self.append_failures.load(Ordering::Relaxed),
            id_collisions: self.id_collisions.load(Ordering::Relaxed),
            plain_searches: self.plain_searches.load(Ordering::Relaxed),
            confidential_scans: self.confidential_scans.load(Ordering::Relaxed),
            records_scanned: self.records_scanned.load(Ordering::Relaxed),
            unreadable_fields: self.unreadable_fields.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`AuditCounters`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CountersSnapshot {
    /// Records appended.
    pub appends: u64,
    /// Appends that failed.
    pub append_failures: u64,
    /// Generated access ids the store rejected as duplicates.
    pub id_collisions: u64,
    /// Searches answered from plaintext columns.
    pub plain_searches: u64,
    /// Searches that decrypted and scanned records.
    pub confidential_scans: u64,
    /// Records decrypted by confidential searches.
    pub records_scanned: u64,
    /// Fields a confidential search could not decrypt.
    pub unreadable_fields: u64,
}
