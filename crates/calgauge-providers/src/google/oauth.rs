//! OAuth 2.0 web authorization-code flow for Google APIs.
//!
//! The service hosts the redirect endpoint itself:
//!
//! 1. [`OAuthClient::begin`] creates a [`PkceFlow`] and the consent URL
//! 2. The caller remembers the flow keyed by its `state` and redirects the user
//! 3. Google calls back with `code` and `state`
//! 4. The caller looks the flow up by `state` and calls [`OAuthClient::exchange_code`]
//!
//! Stored tokens are renewed with [`OAuthClient::refresh`].

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::token::TokenInfo;

use super::client::GoogleCalendarClient;
use super::config::{GoogleConfig, OAuthCredentials};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// OAuth client for Google APIs.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    redirect_uri: Option<String>,
    auth_url: String,
    token_url: String,
    scopes: Vec<String>,
    api_base: String,
    http_client: reqwest::Client,
}

/// A consent request waiting for its callback.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Where to send the user.
    pub url: String,
    /// The PKCE state; `state` identifies the request on callback.
    pub flow: PkceFlow,
}

impl OAuthClient {
    /// Creates a new OAuth client from the Google configuration.
    pub fn new(config: &GoogleConfig, http_client: reqwest::Client) -> Self {
        Self {
            credentials: config.credentials.clone(),
            redirect_uri: config.effective_redirect_uri().map(str::to_string),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            scopes: config.scopes.clone(),
            api_base: config.api_base.clone(),
            http_client,
        }
    }

    /// Returns a Calendar API client acting with `token`.
    pub fn calendar_client(&self, token: &TokenInfo) -> GoogleCalendarClient {
        GoogleCalendarClient::new(
            self.http_client.clone(),
            self.api_base.clone(),
            token.access_token.clone(),
        )
    }

    /// Starts an authorization: fresh PKCE state plus the consent URL.
    ///
    /// # Errors
    ///
    /// Fails when no redirect URI is configured.
    pub fn begin(&self) -> ProviderResult<AuthorizationRequest> {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            &self.auth_url,
            &self.credentials.client_id,
            self.redirect_uri()?,
            &self.scopes,
        );
        debug!(state = %flow.state, "starting OAuth authorization");
        Ok(AuthorizationRequest { url, flow })
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> ProviderResult<TokenInfo> {
        let redirect_uri = self.redirect_uri()?;
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let token_response = self.token_request(&params, "token exchange").await?;

        info!("obtained tokens from authorization code");
        Ok(TokenInfo::new(
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
            self.scopes.clone(),
        ))
    }

    /// Renews an access token with its refresh token.
    ///
    /// # Errors
    ///
    /// Returns an authentication error when the token has no refresh token
    /// or Google rejects it.
    pub async fn refresh(&self, token: &TokenInfo) -> ProviderResult<TokenInfo> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::authentication("no refresh token stored"))?;

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token_response = self.token_request(&params, "token refresh").await?;

        debug!("refreshed access token");
        Ok(token.clone().refreshed(
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
        ))
    }

    fn redirect_uri(&self) -> ProviderResult<&str> {
        self.redirect_uri
            .as_deref()
            .ok_or_else(|| ProviderError::configuration("no OAuth redirect URI configured"))
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        what: &str,
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(token_error(status, what, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(format!("invalid token response: {}", e)))
    }
}

/// Classifies a failed token endpoint response.
///
/// 429 is rate limiting, 5xx is a server error, and any other status is an
/// authentication failure.
fn token_error(status: reqwest::StatusCode, what: &str, body: &str) -> ProviderError {
    let message = format!("{} failed ({}): {}", what, status, body);
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderError::rate_limited(message)
    } else if status.is_server_error() {
        ProviderError::server(message)
    } else {
        ProviderError::authentication(message)
    }
}

/// PKCE flow state (RFC 7636).
#[derive(Debug, Clone)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the consent URL.
    pub fn build_auth_url(
        &self,
        auth_url: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            auth_url,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}
