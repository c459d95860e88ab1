//! Secret references in configuration values.
//!
//! `client_id` and `client_secret` in `config.toml` may point elsewhere:
//!
//! - `pass::path/in/store` runs `pass show path/in/store` and takes the first line
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - anything else is used verbatim

use crate::error::{CliError, CliResult};

/// Resolves a value that may be a secret reference.
pub fn resolve(value: &str) -> CliResult<String> {
    if let Some(path) = value.strip_prefix("pass::") {
        from_pass(path)
    } else if let Some(var) = value.strip_prefix("env::") {
        std::env::var(var)
            .map_err(|_| CliError::Secret(format!("environment variable `{}` is not set", var)))
    } else {
        Ok(value.to_string())
    }
}

fn from_pass(path: &str) -> CliResult<String> {
    let output = std::process::Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|e| CliError::Secret(format!("failed to run `pass show {}`: {}", path, e)))?;

    if !output.status.success() {
        return Err(CliError::Secret(format!(
            "`pass show {}` failed ({}): {}",
            path,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| CliError::Secret(format!("`pass show {}` produced no output", path)))
}
