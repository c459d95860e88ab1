//! Configuration commands.

use std::path::Path;

use crate::config::Config;
use crate::error::CliResult;

/// Prints the effective configuration as TOML.
pub fn dump(config: &Config, path: &Path) -> CliResult<()> {
    println!("# config.toml ({})", path.display());
    println!("{}", config.to_toml()?);
    Ok(())
}

/// Checks that the configuration can be turned into a running service.
pub fn validate(config: &Config) -> CliResult<()> {
    let server = config.server_config()?;
    println!("Listening on {}.", server.listen);

    if config.google.has_credentials() {
        let google = config.google.provider_config()?;
        match google.effective_redirect_uri() {
            Some(uri) => println!("Google credentials are valid (redirect: {}).", uri),
            None => println!("Google credentials are valid; no redirect URI, /auth is disabled."),
        }
    } else {
        println!("No Google credentials configured.");
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Prints the configuration file path.
pub fn path(path: &Path) -> CliResult<()> {
    println!("config: {}", path.display());
    Ok(())
}
