//! OAuth token held per calendar.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access tokens are treated as expired this long before the server says so.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// An OAuth token set for one calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The access token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// When the access token expires (already shortened by the buffer).
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// When the tokens were last refreshed.
    pub last_refresh: DateTime<Utc>,
}

impl TokenInfo {
    /// Creates a new token info from OAuth response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(|secs| expiry_from(now, secs)),
            scopes,
            last_refresh: now,
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns true if the access token is expired at `now`.
    ///
    /// Tokens without an expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Returns true if the token can be refreshed without user interaction.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Applies a refreshed access token.
    ///
    /// Google omits the refresh token on refresh responses; the existing
    /// one is kept unless a new one is supplied.
    pub fn refreshed(
        mut self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        let now = Utc::now();
        self.access_token = access_token.into();
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.expires_at = expires_in_secs.map(|secs| expiry_from(now, secs));
        self.last_refresh = now;
        self
    }
}

fn expiry_from(now: DateTime<Utc>, expires_in_secs: i64) -> DateTime<Utc> {
    now + Duration::seconds(expires_in_secs) - Duration::seconds(EXPIRY_BUFFER_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_info_creation() {
        let token = TokenInfo::new(
            "access",
            Some("refresh".to_string()),
            Some(3600),
            vec!["calendar.readonly".to_string()],
        );

        assert_eq!(token.access_token, "access");
        assert!(token.can_refresh());
        assert!(!token.is_expired());
        let remaining = token.expires_at.unwrap() - Utc::now();
        assert!(remaining <= Duration::seconds(3600 - EXPIRY_BUFFER_SECS));
    }

    #[test]
    fn token_within_buffer_is_expired() {
        let token = TokenInfo::new("access", None, Some(30), vec![]);
        assert!(token.is_expired());
    }

    #[test]
    fn token_without_expiry_never_expires() {
        let token = TokenInfo::new("access", None, None, vec![]);
        assert!(!token.is_expired_at(Utc::now() + Duration::days(365)));
        assert!(!token.can_refresh());
    }

    #[test]
    fn refreshed_keeps_refresh_token() {
        let token = TokenInfo::new("old", Some("keep-me".to_string()), Some(10), vec![]);
        let token = token.refreshed("new", None, Some(3600));

        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token.as_deref(), Some("keep-me"));
        assert!(!token.is_expired());
    }

    #[test]
    fn deserializes_minimal_json() {
        let json = r#"{"access_token": "a", "last_refresh": "2025-02-05T10:00:00Z"}"#;
        let token: TokenInfo = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "a");
        assert!(token.refresh_token.is_none());
        assert!(token.scopes.is_empty());
    }
}
