//! Lists calendars with stored credentials.

use calgauge_providers::google::FileCredentialStore;

use crate::config::Config;
use crate::error::CliResult;

/// Prints one stored calendar id per line.
pub fn list(config: &Config) -> CliResult<()> {
    let path = config.google.token_store_path();
    let ids = FileCredentialStore::read_calendar_ids(&path)?;

    if ids.is_empty() {
        eprintln!(
            "No calendars authorized yet (token store: {}).",
            path.display()
        );
        eprintln!("Start `calgauge serve` and open /auth to authorize one.");
        return Ok(());
    }

    for id in ids {
        println!("{}", id);
    }
    Ok(())
}
