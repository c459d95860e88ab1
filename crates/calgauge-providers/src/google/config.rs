//! Google Calendar configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// OAuth 2.0 client credentials from the Google Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
    /// Redirect URIs registered for the client, in console order.
    pub redirect_uris: Vec<String>,
}

/// Structure of Google's OAuth credentials JSON file.
///
/// Accepts the console download (`web` or `installed` section) and a flat
/// `client_id`/`client_secret` object.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    web: Option<NestedCredentials>,
    installed: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl OAuthCredentials {
    /// Creates new OAuth credentials without redirect URIs.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uris: Vec::new(),
        }
    }

    /// Builder method to add a redirect URI.
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    /// Loads credentials from a Google Cloud Console JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read credentials file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses credentials from a Google credentials JSON string.
    ///
    /// The `web` section wins over `installed` since the service receives
    /// its callback over HTTP.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: CredentialsFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse credentials JSON: {}", e))
        })?;

        if let Some(creds) = file.web.or(file.installed) {
            return Ok(Self {
                client_id: creds.client_id,
                client_secret: creds.client_secret,
                redirect_uris: creds.redirect_uris,
            });
        }

        match (file.client_id, file.client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(Self {
                client_id,
                client_secret,
                redirect_uris: file.redirect_uris,
            }),
            _ => Err(ProviderError::configuration(
                "credentials file must contain a 'web'/'installed' section or 'client_id'/'client_secret' at root level",
            )),
        }
    }

    /// Checks that the credentials look usable.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.client_id.is_empty() {
            return Err(ProviderError::configuration("client_id is required"));
        }
        if self.client_secret.is_empty() {
            return Err(ProviderError::configuration("client_secret is required"));
        }
        Ok(())
    }
}

/// Configuration for the Google Calendar collaborators.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth credentials for API access.
    pub credentials: OAuthCredentials,

    /// Where the OAuth callback lands. Defaults to the first registered
    /// redirect URI.
    pub redirect_uri: Option<String>,

    /// Calendar API base URL.
    pub api_base: String,

    /// Consent page URL.
    pub auth_url: String,

    /// Token endpoint URL.
    pub token_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// OAuth scopes to request.
    pub scopes: Vec<String>,

    /// User agent string for API requests.
    pub user_agent: String,
}

impl GoogleConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default OAuth scope for read-only calendar access.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.readonly";

    /// Google Calendar API v3.
    pub const DEFAULT_API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";

    /// Google consent page.
    pub const DEFAULT_AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";

    /// Google token endpoint.
    pub const DEFAULT_TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Creates a new configuration with the given credentials.
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            redirect_uri: None,
            api_base: Self::DEFAULT_API_BASE.to_string(),
            auth_url: Self::DEFAULT_AUTH_URL.to_string(),
            token_url: Self::DEFAULT_TOKEN_URL.to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            user_agent: format!("calgauge/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Returns the default credential store path.
    pub fn default_token_store() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calgauge")
            .join("tokens.json")
    }

    /// Sets the OAuth redirect URI.
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Sets the Calendar API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the consent page URL.
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    /// Sets the token endpoint URL.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// The redirect URI to send to Google, if one is known.
    pub fn effective_redirect_uri(&self) -> Option<&str> {
        self.redirect_uri
            .as_deref()
            .or_else(|| self.credentials.redirect_uris.first().map(String::as_str))
    }

    /// Builds the shared HTTP client.
    pub fn http_client(&self) -> ProviderResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
            })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ProviderResult<()> {
        self.credentials.validate()?;

        if self.scopes.is_empty() {
            return Err(ProviderError::configuration(
                "at least one OAuth scope is required",
            ));
        }

        if let Some(uri) = self.effective_redirect_uri() {
            url::Url::parse(uri).map_err(|e| {
                ProviderError::configuration(format!("invalid redirect URI '{}': {}", uri, e))
            })?;
        }

        url::Url::parse(&self.api_base).map_err(|e| {
            ProviderError::configuration(format!("invalid API base '{}': {}", self.api_base, e))
        })?;

        Ok(())
    }
}
