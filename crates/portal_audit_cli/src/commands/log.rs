//! Log command implementation.

use super::{CliResult, Settings};
use portal_audit_core::{AccessEvent, CoreError, SchemaVersion};

/// Event fields given on the command line.
pub struct EventArgs {
    pub name: String,
    pub email: String,
    pub ip: Option<String>,
    pub mac: Option<String>,
    pub user_agent: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
}

impl EventArgs {
    fn into_event(self) -> AccessEvent {
        let mut event = AccessEvent::new(self.name, self.email);
        event.ip = self.ip;
        event.mac = self.mac;
        event.user_agent = self.user_agent;
        event.phone = self.phone;
        event.birth_date = self.birth_date;
        event
    }
}

/// Runs the log command.
pub fn run(settings: &Settings, args: EventArgs, schema: u32) -> CliResult {
    let schema = SchemaVersion::from_u32(schema)
        .ok_or_else(|| CoreError::invalid_config(format!("unknown schema version {schema}")))?;
    let log = settings.open_log_with_schema(schema)?;
    let id = log.append(&args.into_event())?;
    println!("{id}");
    Ok(())
}
