//! Import command implementation.

use super::{open_store, Backend, CliResult, Settings};
use tracing::info;

/// Copies every record from the store at `from` into the configured store.
pub fn run(settings: &Settings, from: &std::path::Path, from_backend: Backend) -> CliResult {
    if !from.exists() {
        return Err(format!("No log found at {}", from.display()).into());
    }
    if from == settings.path {
        return Err("Source and target are the same store".into());
    }

    let log = settings.open_log()?;
    let source = open_store(from_backend, from, log.config())?;
    info!(
        "Importing {} records from {:?}",
        source.count()?,
        from
    );

    let report = log.import_from(source.as_ref())?;
    println!("Imported: {}", report.imported);
    println!("Skipped (already present): {}", report.skipped);
    Ok(())
}
