//! Portal audit CLI
//!
//! Operator tools for the captive portal access log.
//!
//! # Commands
//!
//! - `log` - Record an access event
//! - `list` - Show the most recent accesses
//! - `search` - Substring search on one field
//! - `stats` - Dashboard counts
//! - `import` - Copy records from another store (JSON file to SQLite)

mod commands;

use clap::{Parser, Subcommand};
use commands::{Backend, Settings};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

/// Captive portal access log tools.
#[derive(Parser)]
#[command(name = "portal-audit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log file or database
    #[arg(global = true, short, long, env = "PORTAL_AUDIT_PATH")]
    path: Option<PathBuf>,

    /// Storage backend
    #[arg(global = true, short, long, value_enum, default_value_t = Backend::File)]
    backend: Backend,

    /// Secret the field encryption key is derived from
    #[arg(global = true, long, env = "PORTAL_AUDIT_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Key derivation salt (defaults to the built-in application salt)
    #[arg(global = true, long)]
    salt: Option<String>,

    /// PBKDF2 iteration count
    #[arg(global = true, long, default_value_t = portal_audit_core::DEFAULT_KDF_ITERATIONS)]
    kdf_iterations: u32,

    /// How long to wait for the log file lock, in milliseconds
    #[arg(global = true, long)]
    lock_timeout_ms: Option<u64>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record an access event
    Log {
        /// Visitor name
        #[arg(long)]
        name: String,

        /// Visitor email
        #[arg(long)]
        email: String,

        /// Source IP
        #[arg(long)]
        ip: Option<String>,

        /// MAC address
        #[arg(long)]
        mac: Option<String>,

        /// Browser user agent
        #[arg(long)]
        user_agent: Option<String>,

        /// Phone number (kept only with --schema 1)
        #[arg(long)]
        phone: Option<String>,

        /// Birth date (kept only with --schema 1)
        #[arg(long)]
        birth_date: Option<String>,

        /// Record schema version to write
        #[arg(long, default_value = "2")]
        schema: u32,
    },

    /// Show the most recent accesses
    List {
        /// Maximum number of records
        #[arg(short, long)]
        limit: Option<usize>,

        /// Hide names and emails
        #[arg(short, long)]
        redact: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Substring search on one field
    Search {
        /// Text to look for
        term: String,

        /// Field to search (name, email, phone, birth_date, ip, mac, user_agent)
        #[arg(long, default_value = "name")]
        field: String,

        /// Hide names and emails
        #[arg(short, long)]
        redact: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dashboard counts
    Stats {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Copy records from another store into this one
    Import {
        /// Store to copy from
        #[arg(long)]
        from: PathBuf,

        /// Backend of the source store
        #[arg(long, value_enum, default_value_t = Backend::File)]
        from_backend: Backend,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings {
        path: cli.path.unwrap_or_else(|| cli.backend.default_path()),
        backend: cli.backend,
        secret: cli.secret.map(Zeroizing::new),
        salt: cli.salt,
        kdf_iterations: cli.kdf_iterations,
        lock_timeout: cli.lock_timeout_ms.map(Duration::from_millis),
    };

    match cli.command {
        Commands::Log {
            name,
            email,
            ip,
            mac,
            user_agent,
            phone,
            birth_date,
            schema,
        } => {
            let event = commands::log::EventArgs {
                name,
                email,
                ip,
                mac,
                user_agent,
                phone,
                birth_date,
            };
            commands::log::run(&settings, event, schema)?;
        }
        Commands::List {
            limit,
            redact,
            format,
        } => {
            commands::list::run(&settings, limit, redact, &format)?;
        }
        Commands::Search {
            term,
            field,
            redact,
            format,
        } => {
            commands::search::run(&settings, &term, &field, redact, &format)?;
        }
        Commands::Stats { format } => {
            commands::stats::run(&settings, &format)?;
        }
        Commands::Import { from, from_backend } => {
            commands::import::run(&settings, &from, from_backend)?;
        }
        Commands::Version => {
            println!("portal-audit CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("portal_audit_core v{}", portal_audit_core::VERSION);
        }
    }

    Ok(())
}
