//! Stats command implementation.

use super::{CliResult, Settings};
use portal_audit_core::AccessStats;

/// Runs the stats command.
pub fn run(settings: &Settings, format: &str) -> CliResult {
    let log = settings.open_log()?;
    let stats = log.stats();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => print_text_output(&stats),
    }

    match stats.error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn print_text_output(stats: &AccessStats) {
    println!("Access Statistics");
    println!("=================");
    println!("  Total accesses:  {}", stats.total_accesses);
    println!("  Unique IPs:      {}", stats.unique_ips);
    println!("  Unique MACs:     {}", stats.unique_macs);
    println!("  Today:           {}", stats.today_accesses);
    println!("  This week:       {}", stats.this_week_accesses);
    if let Some(error) = &stats.error {
        println!("\n  Error: {error}");
    }
}
