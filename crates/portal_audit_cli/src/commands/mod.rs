//! CLI command implementations.

pub mod import;
pub mod list;
pub mod log;
pub mod search;
pub mod stats;

use clap::ValueEnum;
use portal_audit_core::{
    AccessRecord, AuditLog, Cipher, CipherKey, Config, SchemaVersion, DEFAULT_KEY_SALT,
};
use portal_audit_storage::{FileStore, LogStore, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use zeroize::Zeroizing;

/// Result type shared by the commands.
pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Which log store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// JSON array file
    File,
    /// SQLite database
    Sqlite,
}

impl Backend {
    /// Path used when none is given.
    pub fn default_path(self) -> PathBuf {
        match self {
            Self::File => PathBuf::from("access_log.json"),
            Self::Sqlite => PathBuf::from("portal_audit.db"),
        }
    }
}

/// Global options every command needs to open the log.
pub struct Settings {
    /// Log file or database path.
    pub path: PathBuf,
    /// Storage backend.
    pub backend: Backend,
    /// Key derivation secret; none runs the cipher disabled.
    pub secret: Option<Zeroizing<String>>,
    /// Key derivation salt override.
    pub salt: Option<String>,
    /// PBKDF2 iterations.
    pub kdf_iterations: u32,
    /// File lock timeout override.
    pub lock_timeout: Option<Duration>,
}

impl Settings {
    /// Audit log configuration from the global options.
    pub fn config(&self) -> Config {
        let config = Config::default();
        match self.lock_timeout {
            Some(timeout) => config.lock_timeout(timeout),
            None => config,
        }
    }

    /// Builds the cipher, disabled if no secret was given.
    pub fn cipher(&self) -> CliResult<Arc<Cipher>> {
        let Some(secret) = &self.secret else {
            return Ok(Arc::new(Cipher::disabled()));
        };
        let salt = self
            .salt
            .as_deref()
            .map_or(DEFAULT_KEY_SALT, str::as_bytes);
        let key = CipherKey::derive(secret.as_bytes(), salt, self.kdf_iterations)?;
        Ok(Arc::new(Cipher::new(&key)))
    }

    /// Opens the configured store.
    pub fn open_store(&self, config: &Config) -> CliResult<Arc<dyn LogStore>> {
        open_store(self.backend, &self.path, config)
    }

    /// Opens the audit log, writing new records under `schema`.
    pub fn open_log_with_schema(&self, schema: SchemaVersion) -> CliResult<AuditLog> {
        let config = self.config().schema_version(schema);
        let store = self.open_store(&config)?;
        Ok(AuditLog::new(store, self.cipher()?, config)?)
    }

    /// Opens the audit log with the default schema.
    pub fn open_log(&self) -> CliResult<AuditLog> {
        self.open_log_with_schema(Config::default().schema_version)
    }
}

/// Opens a store of the given kind.
pub fn open_store(backend: Backend, path: &Path, config: &Config) -> CliResult<Arc<dyn LogStore>> {
    info!(backend = ?backend, path = %path.display(), "opening log store");
    let store: Arc<dyn LogStore> = match backend {
        Backend::File => Arc::new(FileStore::open(path)?.with_lock_timeout(config.lock_timeout)),
        Backend::Sqlite => {
            Arc::new(SqliteStore::open(path)?.with_busy_timeout(config.lock_timeout)?)
        }
    };
    Ok(store)
}

/// Prints records as a table or as JSON field maps.
pub fn print_records(records: &[AccessRecord], format: &str) -> CliResult {
    match format {
        "json" => {
            let maps: Vec<_> = records.iter().map(AccessRecord::to_field_map).collect();
            println!("{}", serde_json::to_string_pretty(&maps)?);
        }
        _ => print_text_table(records),
    }
    Ok(())
}

fn print_text_table(records: &[AccessRecord]) {
    if records.is_empty() {
        println!("No records.");
        return;
    }

    println!(
        "{:<10} {:<8} {:<24} {:<32} {:<15} {:<17}",
        "DATE", "TIME", "NAME", "EMAIL", "IP", "MAC"
    );
    for record in records {
        let map = record.to_field_map();
        println!(
            "{:<10} {:<8} {:<24} {:<32} {:<15} {:<17}",
            map["date"],
            map["time"],
            truncate(&map["name"], 24),
            truncate(&map["email"], 32),
            map["ip"],
            map["mac"],
        );
    }
    println!("\n{} record(s)", records.len());
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
