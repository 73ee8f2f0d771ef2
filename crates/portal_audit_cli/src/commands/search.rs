//! Search command implementation.

use super::{print_records, CliResult, Settings};
use portal_audit_core::{SearchField, Visibility};

/// Runs the search command.
pub fn run(settings: &Settings, term: &str, field: &str, redact: bool, format: &str) -> CliResult {
    let field: SearchField = field.parse()?;
    let log = settings.open_log()?;

    let visibility = if redact {
        Visibility::Redact
    } else {
        Visibility::Reveal
    };
    let records = log.search(term, field, visibility)?;
    print_records(&records, format)?;

    if field.is_confidential() && format != "json" {
        println!(
            "(searched the {} most recent records)",
            log.config().confidential_scan_window
        );
    }
    Ok(())
}
