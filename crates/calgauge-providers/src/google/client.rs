//! Google Calendar API client.
//!
//! One client reads one account's primary calendar with that account's
//! access token.

use calgauge_core::TimeWindow;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::RawEvent;
use crate::source::{BoxFuture, EventSource};

/// The calendar every authorized account is read from.
const PRIMARY: &str = "primary";

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl GoogleCalendarClient {
    /// Creates a client for the API at `api_base` using `access_token`.
    pub fn new(
        http_client: reqwest::Client,
        api_base: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            api_base: api_base.into(),
            access_token: access_token.into(),
        }
    }

    /// Lists the primary calendar's events starting within `window`.
    ///
    /// Recurring events are expanded server-side and pages are followed
    /// until Google stops returning a `nextPageToken`.
    pub async fn list_primary_events(&self, window: TimeWindow) -> ProviderResult<Vec<RawEvent>> {
        let mut all_events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_events_page(window, page_token.as_deref()).await?;
            all_events.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(events = all_events.len(), "fetched primary calendar events");
        Ok(all_events)
    }

    async fn list_events_page(
        &self,
        window: TimeWindow,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let url = format!("{}/calendars/{}/events", self.api_base, PRIMARY);

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeMin", window.start.to_rfc3339()),
                ("timeMax", window.end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await.map_err(request_error)?;
        let body = read_success(response).await?;

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse event list: {}", e))
        })
    }

    /// Resolves the id of the account's primary calendar.
    ///
    /// Google reports the account email here; it becomes the calendar id
    /// under which the credential is stored.
    pub async fn primary_calendar_id(&self) -> ProviderResult<String> {
        let url = format!("{}/calendars/{}", self.api_base, PRIMARY);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(request_error)?;
        let body = read_success(response).await?;

        let entry: CalendarEntry = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse calendar: {}", e))
        })?;

        if entry.id.is_empty() {
            return Err(ProviderError::invalid_response("calendar has an empty id"));
        }
        Ok(entry.id)
    }
}

impl EventSource for GoogleCalendarClient {
    fn list_events(&self, window: TimeWindow) -> BoxFuture<'_, ProviderResult<Vec<RawEvent>>> {
        Box::pin(self.list_primary_events(window))
    }
}

fn request_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::network("request timeout")
    } else if e.is_connect() {
        ProviderError::network(format!("connection failed: {}", e))
    } else {
        ProviderError::network(format!("request failed: {}", e))
    }
}

/// Maps the HTTP status to a provider error and returns the body otherwise.
async fn read_success(response: reqwest::Response) -> ProviderResult<String> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(ProviderError::rate_limited(format!(
            "rate limit exceeded{}",
            retry_after
                .map(|s| format!(", retry after {} seconds", s))
                .unwrap_or_default()
        )));
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ProviderError::authentication(
            "access token expired or invalid",
        ));
    }

    if status == reqwest::StatusCode::FORBIDDEN {
        return Err(ProviderError::authorization("access denied to calendar"));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::server(format!(
            "API error ({}): {}",
            status, body
        )));
    }

    response
        .text()
        .await
        .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<RawEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarEntry {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use chrono::{Duration, TimeZone, Utc};
    use mockito::Matcher;

    fn window() -> TimeWindow {
        let now = Utc.with_ymd_and_hms(2025, 2, 5, 9, 0, 0).unwrap();
        TimeWindow::lookahead(now, Duration::days(7))
    }

    fn client(server: &mockito::Server) -> GoogleCalendarClient {
        GoogleCalendarClient::new(reqwest::Client::new(), server.url(), "token-123")
    }

    #[tokio::test]
    async fn lists_single_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/calendars/primary/events")
            .match_header("authorization", "Bearer token-123")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("singleEvents".into(), "true".into()),
                Matcher::UrlEncoded("orderBy".into(), "startTime".into()),
                Matcher::UrlEncoded("timeMin".into(), window().start.to_rfc3339()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "items": [
                        {
                            "id": "evt1",
                            "summary": "Standup",
                            "start": {"dateTime": "2025-02-05T10:00:00Z"},
                            "end": {"dateTime": "2025-02-05T10:15:00Z"},
                            "attendees": [
                                {"email": "me@example.com", "self": true},
                                {"email": "bob@example.com"}
                            ]
                        },
                        {
                            "id": "evt2",
                            "summary": "Offsite",
                            "start": {"date": "2025-02-06"},
                            "end": {"date": "2025-02-07"}
                        }
                    ]
                }"#,
            )
            .create_async()
            .await;

        let events = client(&server).list_primary_events(window()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].summary.as_deref(), Some("Standup"));
        assert_eq!(events[0].attendees.len(), 2);
        assert!(events[1].start.as_ref().unwrap().is_all_day());
    }

    #[tokio::test]
    async fn follows_page_tokens() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Regex("orderBy=startTime$".into()))
            .with_status(200)
            .with_body(
                r#"{"items": [{"id": "a", "start": {"dateTime": "2025-02-05T10:00:00Z"}}],
                    "nextPageToken": "p2"}"#,
            )
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
            .with_status(200)
            .with_body(r#"{"items": [{"id": "b", "start": {"dateTime": "2025-02-05T11:00:00Z"}}]}"#)
            .expect(1)
            .create_async()
            .await;

        let events = client(&server).list_primary_events(window()).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let err = client(&server)
            .list_events(window())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn rate_limit_reports_retry_after() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("Retry-After", "30")
            .create_async()
            .await;

        let err = client(&server).list_primary_events(window()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::RateLimited);
        assert!(err.message().contains("30 seconds"));
    }

    #[tokio::test]
    async fn server_error_includes_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("backend unavailable")
            .create_async()
            .await;

        let err = client(&server).list_primary_events(window()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
        assert!(err.message().contains("backend unavailable"));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let err = client(&server).list_primary_events(window()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
    }

    #[tokio::test]
    async fn resolves_primary_calendar_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary")
            .with_status(200)
            .with_body(r#"{"id": "me@example.com", "summary": "Me", "timeZone": "UTC"}"#)
            .create_async()
            .await;

        let id = client(&server).primary_calendar_id().await.unwrap();
        assert_eq!(id, "me@example.com");
    }
}
