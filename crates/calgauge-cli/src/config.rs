//! `config.toml` loading.
//!
//! The file lives at `~/.config/calgauge/config.toml` by default. Every
//! section and key is optional; a missing default file means defaults.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 9100
//!
//! [refresh]
//! interval_secs = 600
//! recount_interval_secs = 1
//! manual_queue_capacity = 100
//! lookahead_days = 7
//! grace_secs = 180
//!
//! [google]
//! credentials_file = "/etc/calgauge/credentials.json"
//! token_store = "/var/lib/calgauge/tokens.json"
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use calgauge_providers::google::{GoogleConfig, OAuthCredentials};
use calgauge_server::{DeriveConfig, RefreshConfig, ServerConfig};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};
use crate::secret;

const MAX_REFRESH_INTERVAL_SECS: u64 = 24 * 60 * 60;
const MAX_RECOUNT_INTERVAL_SECS: u64 = 60 * 60;
const MAX_LOOKAHEAD_DAYS: i64 = 366;
const MAX_GRACE_SECS: i64 = 24 * 60 * 60;

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Refresh and derivation cadence.
    pub refresh: RefreshSettings,
    /// Google Calendar settings.
    pub google: GoogleSettings,
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to listen on.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// `[refresh]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Seconds between timer-triggered refreshes.
    pub interval_secs: u64,
    /// Seconds between gauge derivations.
    pub recount_interval_secs: u64,
    /// Manual refreshes that may queue before further ones are dropped.
    pub manual_queue_capacity: usize,
    /// Days of events fetched per refresh.
    pub lookahead_days: i64,
    /// Seconds after its start that an event is still reported.
    pub grace_secs: i64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            recount_interval_secs: 1,
            manual_queue_capacity: 100,
            lookahead_days: 7,
            grace_secs: 180,
        }
    }
}

/// `[google]` section.
///
/// Credentials come from `credentials_file` (the Cloud Console download)
/// or from inline `client_id`/`client_secret`, which accept `pass::` and
/// `env::` references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// Path to the Cloud Console credentials JSON.
    pub credentials_file: Option<PathBuf>,
    /// OAuth client ID.
    pub client_id: Option<String>,
    /// OAuth client secret.
    pub client_secret: Option<String>,
    /// Redirect URI; defaults to the first one in the credentials.
    pub redirect_uri: Option<String>,
    /// Path to the token store.
    pub token_store: Option<PathBuf>,
    /// Calendar API base URL.
    pub api_base: Option<String>,
}

impl Config {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calgauge")
            .join("config.toml")
    }

    /// Loads configuration.
    ///
    /// An explicit `path` must exist; the default path may be absent.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads configuration from a specific file.
    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| CliError::config(format!("{}: {}", path.display(), e)))
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> CliResult<Self> {
        toml::from_str(content).map_err(|e| CliError::config(format!("invalid TOML: {}", e)))
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> CliResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::config(format!("failed to serialize config: {}", e)))
    }

    /// Builds the engine configuration.
    pub fn server_config(&self) -> CliResult<ServerConfig> {
        let host: IpAddr = self.server.host.parse().map_err(|_| {
            CliError::config(format!("invalid server.host '{}'", self.server.host))
        })?;
        let r = &self.refresh;

        if r.interval_secs == 0 || r.interval_secs > MAX_REFRESH_INTERVAL_SECS {
            return Err(CliError::config(format!(
                "refresh.interval_secs must be between 1 and {}",
                MAX_REFRESH_INTERVAL_SECS
            )));
        }
        if r.recount_interval_secs == 0 || r.recount_interval_secs > MAX_RECOUNT_INTERVAL_SECS {
            return Err(CliError::config(format!(
                "refresh.recount_interval_secs must be between 1 and {}",
                MAX_RECOUNT_INTERVAL_SECS
            )));
        }
        if r.manual_queue_capacity == 0 {
            return Err(CliError::config("refresh.manual_queue_capacity must be positive"));
        }
        let lookahead = chrono::Duration::try_days(r.lookahead_days)
            .filter(|_| (1..=MAX_LOOKAHEAD_DAYS).contains(&r.lookahead_days))
            .ok_or_else(|| {
                CliError::config(format!(
                    "refresh.lookahead_days must be between 1 and {}",
                    MAX_LOOKAHEAD_DAYS
                ))
            })?;
        let grace = chrono::Duration::try_seconds(r.grace_secs)
            .filter(|_| (0..=MAX_GRACE_SECS).contains(&r.grace_secs))
            .ok_or_else(|| {
                CliError::config(format!(
                    "refresh.grace_secs must be between 0 and {}",
                    MAX_GRACE_SECS
                ))
            })?;

        let refresh = RefreshConfig::new(Duration::from_secs(r.interval_secs))
            .with_lookahead(lookahead)
            .with_manual_queue_capacity(r.manual_queue_capacity);
        let derive = DeriveConfig::new(Duration::from_secs(r.recount_interval_secs))
            .with_grace(grace);

        Ok(ServerConfig::new(SocketAddr::new(host, self.server.port))
            .with_refresh(refresh)
            .with_derive(derive))
    }
}

impl GoogleSettings {
    /// Returns the token store path.
    pub fn token_store_path(&self) -> PathBuf {
        self.token_store
            .clone()
            .unwrap_or_else(GoogleConfig::default_token_store)
    }

    /// Returns true if credentials are configured in some form.
    pub fn has_credentials(&self) -> bool {
        self.credentials_file.is_some() || self.client_id.is_some()
    }

    /// Resolves the OAuth client credentials.
    pub fn credentials(&self) -> CliResult<OAuthCredentials> {
        if let Some(ref path) = self.credentials_file {
            return Ok(OAuthCredentials::from_file(path)?);
        }

        let raw_id = self.client_id.as_deref().ok_or_else(|| {
            CliError::config(format!(
                "Google credentials not found. Add to {}:\n  \
                 [google]\n  \
                 credentials_file = \"/path/to/credentials.json\"",
                Config::default_path().display()
            ))
        })?;
        let raw_secret = self
            .client_secret
            .as_deref()
            .ok_or_else(|| CliError::config("google.client_secret is missing"))?;

        Ok(OAuthCredentials::new(
            secret::resolve(raw_id)?,
            secret::resolve(raw_secret)?,
        ))
    }

    /// Builds the provider configuration.
    pub fn provider_config(&self) -> CliResult<GoogleConfig> {
        let mut config = GoogleConfig::new(self.credentials()?);
        if let Some(ref uri) = self.redirect_uri {
            config = config.with_redirect_uri(uri);
        }
        if let Some(ref base) = self.api_base {
            config = config.with_api_base(base);
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_is_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());

        let server = config.server_config().unwrap();
        assert_eq!(server, ServerConfig::default());
    }

    #[test]
    fn parses_every_section() {
        let config = Config::from_toml(
            r#"
[server]
host = "0.0.0.0"
port = 9100

[refresh]
interval_secs = 300
recount_interval_secs = 2
manual_queue_capacity = 10
lookahead_days = 3
grace_secs = 60

[google]
client_id = "id.apps.googleusercontent.com"
client_secret = "secret"
redirect_uri = "http://gauges.internal:9100/auth"
token_store = "/tmp/tokens.json"
"#,
        )
        .unwrap();

        let server = config.server_config().unwrap();
        assert_eq!(server.listen, "0.0.0.0:9100".parse().unwrap());
        assert_eq!(server.refresh.interval, Duration::from_secs(300));
        assert_eq!(server.refresh.manual_queue_capacity, 10);
        assert_eq!(server.refresh.lookahead, chrono::Duration::days(3));
        assert_eq!(server.derive.interval, Duration::from_secs(2));
        assert_eq!(server.derive.grace, chrono::Duration::seconds(60));

        let google = config.google.provider_config().unwrap();
        assert_eq!(google.credentials.client_id, "id.apps.googleusercontent.com");
        assert_eq!(
            google.effective_redirect_uri(),
            Some("http://gauges.internal:9100/auth")
        );
        assert_eq!(config.google.token_store_path(), PathBuf::from("/tmp/tokens.json"));
    }

    #[test]
    fn rejects_invalid_values() {
        let bad_host = Config::from_toml("[server]\nhost = \"not an ip\"\n").unwrap();
        assert!(bad_host.server_config().is_err());

        let zero_interval = Config::from_toml("[refresh]\ninterval_secs = 0\n").unwrap();
        assert!(zero_interval.server_config().is_err());

        let negative_grace = Config::from_toml("[refresh]\ngrace_secs = -1\n").unwrap();
        assert!(negative_grace.server_config().is_err());

        assert!(Config::from_toml("[server]\nport = \"eighty\"\n").is_err());
    }

    #[test]
    fn rejects_oversized_durations() {
        for toml in [
            "[refresh]\nlookahead_days = 9223372036854775807\n",
            "[refresh]\nlookahead_days = 367\n",
            "[refresh]\ngrace_secs = 9000000000000000\n",
            "[refresh]\ngrace_secs = 86401\n",
            "[refresh]\ninterval_secs = 9223372036854775807\n",
            "[refresh]\nrecount_interval_secs = 3601\n",
            "[refresh]\nmanual_queue_capacity = 0\n",
        ] {
            let config = Config::from_toml(toml).unwrap();
            let err = config.server_config().unwrap_err();
            let message = err.to_string();
            assert!(
                message.contains("must be between") || message.contains("must be positive"),
                "{toml}: {message}"
            );
        }
    }

    #[test]
    fn accepts_durations_at_their_limits() {
        let config = Config::from_toml(
            "[refresh]\ninterval_secs = 86400\nlookahead_days = 366\ngrace_secs = 86400\n",
        )
        .unwrap();
        let server = config.server_config().unwrap();
        assert_eq!(server.refresh.lookahead, chrono::Duration::days(366));
        assert_eq!(server.derive.grace, chrono::Duration::days(1));
    }

    #[test]
    fn explicit_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn credentials_file_wins_over_inline() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"web": {{"client_id": "from-file", "client_secret": "s", "redirect_uris": ["http://localhost:8080/auth"]}}}}"#
        )
        .unwrap();

        let settings = GoogleSettings {
            credentials_file: Some(file.path().to_path_buf()),
            client_id: Some("inline".to_string()),
            client_secret: Some("inline".to_string()),
            ..Default::default()
        };
        let config = settings.provider_config().unwrap();
        assert_eq!(config.credentials.client_id, "from-file");
        assert_eq!(config.effective_redirect_uri(), Some("http://localhost:8080/auth"));
    }

    #[test]
    fn missing_credentials_error_names_config_path() {
        let err = GoogleSettings::default().credentials().unwrap_err();
        assert!(err.to_string().contains("credentials_file"));
        assert!(!GoogleSettings::default().has_credentials());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[refresh]"));
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }
}
