//! List command implementation.

use super::{print_records, CliResult, Settings};
use portal_audit_core::Visibility;
use tracing::info;

/// Runs the list command.
pub fn run(settings: &Settings, limit: Option<usize>, redact: bool, format: &str) -> CliResult {
    let log = settings.open_log()?;
    let limit = limit.unwrap_or(log.config().list_limit);
    info!("Listing up to {} records from {:?}", limit, settings.path);

    let visibility = if redact {
        Visibility::Redact
    } else {
        Visibility::Reveal
    };
    let records = log.list_recent(limit, visibility)?;
    print_records(&records, format)
}
