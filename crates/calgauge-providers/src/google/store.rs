//! File-backed credential store.
//!
//! Tokens live in a single JSON object mapping calendar id to [`TokenInfo`].
//! The file is replaced atomically on every write and kept private to the
//! owner on Unix.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::source::{BoxFuture, CalendarHandle, CredentialStore, ErrorSource};
use crate::token::TokenInfo;

use super::config::GoogleConfig;
use super::oauth::OAuthClient;

type TokenMap = BTreeMap<String, TokenInfo>;

/// Credential store persisting Google tokens to a JSON file.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    oauth: OAuthClient,
    /// Serializes read-modify-write cycles on the file.
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Opens the store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>, config: &GoogleConfig) -> ProviderResult<Self> {
        Ok(Self {
            path: path.into(),
            oauth: OAuthClient::new(config, config.http_client()?),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the path to the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored calendar ids without touching the network.
    pub fn calendar_ids(&self) -> ProviderResult<Vec<String>> {
        Self::read_calendar_ids(&self.path)
    }

    /// Lists the calendar ids stored at `path` without opening a store.
    pub fn read_calendar_ids(path: &Path) -> ProviderResult<Vec<String>> {
        Ok(read_tokens(path)?.into_keys().collect())
    }

    fn load(&self) -> ProviderResult<TokenMap> {
        read_tokens(&self.path)
    }

    fn save(&self, tokens: &TokenMap) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::storage(format!("failed to create token directory: {}", e))
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(tokens)
            .map_err(|e| ProviderError::internal(format!("failed to serialize tokens: {}", e)))?;

        fs::write(&temp_path, &content)
            .map_err(|e| ProviderError::storage(format!("failed to write token store: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                ProviderError::storage(format!("failed to restrict token store: {}", e))
            })?;
        }

        fs::rename(&temp_path, &self.path)
            .map_err(|e| ProviderError::storage(format!("failed to rename token store: {}", e)))?;

        debug!(path = %self.path.display(), calendars = tokens.len(), "saved token store");
        Ok(())
    }

    /// Applies `update` to the stored map under the write lock.
    fn modify(&self, update: impl FnOnce(&mut TokenMap)) -> ProviderResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ProviderError::internal("token store lock poisoned"))?;
        let mut tokens = self.load()?;
        update(&mut tokens);
        self.save(&tokens)
    }

    async fn enumerate_handles(&self) -> ProviderResult<Vec<CalendarHandle>> {
        let tokens = self.load()?;
        let mut handles = Vec::with_capacity(tokens.len());
        let mut refreshed = TokenMap::new();

        for (id, token) in tokens {
            if !token.is_expired() {
                let client = self.oauth.calendar_client(&token);
                handles.push(CalendarHandle::new(&id, Arc::new(client)));
                continue;
            }

            match self.oauth.refresh(&token).await {
                Ok(fresh) => {
                    debug!(calendar = %id, "refreshed expired access token");
                    let client = self.oauth.calendar_client(&fresh);
                    handles.push(CalendarHandle::new(&id, Arc::new(client)));
                    refreshed.insert(id, fresh);
                }
                Err(e) => {
                    warn!(calendar = %id, error = %e, "failed to refresh access token");
                    let source = ErrorSource::new(e.with_calendar(&id));
                    handles.push(CalendarHandle::new(&id, Arc::new(source)));
                }
            }
        }

        if !refreshed.is_empty() {
            // A failed write only costs another refresh next time.
            if let Err(e) = self.modify(|stored| {
                for (id, fresh) in refreshed {
                    if stored.contains_key(&id) {
                        stored.insert(id, fresh);
                    }
                }
            }) {
                warn!(error = %e, "failed to persist refreshed tokens");
            }
        }

        Ok(handles)
    }
}

fn read_tokens(path: &Path) -> ProviderResult<TokenMap> {
    if !path.exists() {
        debug!(path = %path.display(), "no token store yet");
        return Ok(TokenMap::new());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        ProviderError::storage(format!(
            "failed to read token store {}: {}",
            path.display(),
            e
        ))
    })?;

    if content.trim().is_empty() {
        return Ok(TokenMap::new());
    }

    serde_json::from_str(&content).map_err(|e| {
        ProviderError::storage(format!(
            "failed to parse token store {}: {}",
            path.display(),
            e
        ))
    })
}

impl CredentialStore for FileCredentialStore {
    fn enumerate(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarHandle>>> {
        Box::pin(self.enumerate_handles())
    }

    fn upsert(&self, calendar: String, token: TokenInfo) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(async move {
            self.modify(|stored| {
                stored.insert(calendar.clone(), token);
            })?;
            info!(calendar = %calendar, "stored calendar credential");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::google::config::OAuthCredentials;
    use calgauge_core::TimeWindow;
    use chrono::Utc;
    use tempfile::TempDir;

    fn config(base: &str) -> GoogleConfig {
        GoogleConfig::new(OAuthCredentials::new("id", "secret"))
            .with_api_base(base)
            .with_token_url(format!("{}/token", base))
    }

    fn store(dir: &TempDir, base: &str) -> FileCredentialStore {
        FileCredentialStore::new(dir.path().join("tokens.json"), &config(base)).unwrap()
    }

    fn valid_token(access: &str) -> TokenInfo {
        TokenInfo::new(access, Some("rt".to_string()), Some(3600), vec![])
    }

    fn expired_token(access: &str) -> TokenInfo {
        TokenInfo::new(access, Some("rt".to_string()), Some(0), vec![])
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, "http://127.0.0.1:9");
        assert!(store.enumerate().await.unwrap().is_empty());
        assert!(store.calendar_ids().unwrap().is_empty());
        assert!(
            FileCredentialStore::read_calendar_ids(store.path())
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn upsert_then_enumerate() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, "http://127.0.0.1:9");

        store.upsert("b@example.com".into(), valid_token("b")).await.unwrap();
        store.upsert("a@example.com".into(), valid_token("a")).await.unwrap();
        store.upsert("b@example.com".into(), valid_token("b2")).await.unwrap();

        let ids: Vec<_> = store
            .enumerate()
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, ["a@example.com", "b@example.com"]);

        let on_disk: TokenMap =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["b@example.com"].access_token, "b2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn store_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store(&dir, "http://127.0.0.1:9");
        store.upsert("a".into(), valid_token("a")).await.unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_fails_enumeration() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, "http://127.0.0.1:9");
        fs::write(store.path(), "{not json").unwrap();

        let err = store.enumerate().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::StorageError);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let mut server = mockito::Server::new_async().await;
        let token_mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"fresh","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let store = store(&dir, &server.url());
        store.upsert("a".into(), expired_token("stale")).await.unwrap();

        let handles = store.enumerate().await.unwrap();
        assert_eq!(handles.len(), 1);
        token_mock.assert_async().await;

        let on_disk: TokenMap =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["a"].access_token, "fresh");
        assert_eq!(on_disk["a"].refresh_token.as_deref(), Some("rt"));
    }

    #[tokio::test]
    async fn failed_refresh_isolates_calendar() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let store = store(&dir, &server.url());
        store.upsert("broken".into(), expired_token("stale")).await.unwrap();
        store.upsert("fine".into(), valid_token("ok")).await.unwrap();

        let handles = store.enumerate().await.unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].id, "broken");

        let window = TimeWindow::lookahead(Utc::now(), chrono::Duration::days(7));
        let err = handles[0].source.list_events(window).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.calendar(), Some("broken"));
    }
}
