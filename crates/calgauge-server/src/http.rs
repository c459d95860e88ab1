//! HTTP surface: scrape endpoint, manual refresh, OAuth callback, health.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::routing::get;
use axum::Router;
use calgauge_providers::google::{GoogleConfig, OAuthClient};
use calgauge_providers::{CredentialStore, ProviderError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::error::{ServerError, ServerResult};
use crate::metrics::PrometheusGauges;
use crate::scheduler::{RefreshHandle, SchedulerState, TriggerOutcome};
use crate::signals::ShutdownHandle;

/// How long a consent request may wait for its callback.
const PENDING_AUTH_TTL: Duration = Duration::from_secs(600);

/// Errors returned by HTTP handlers.
#[derive(Debug)]
pub enum HttpError {
    /// The request was malformed or referred to an unknown flow.
    BadRequest(String),
    /// The endpoint is not available in this configuration.
    NotFound(&'static str),
    /// Google rejected or failed a call made on the request's behalf.
    Upstream(ProviderError),
    /// Anything else.
    Internal(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => {
                debug!(%message, "bad request");
                (StatusCode::BAD_REQUEST, message)
            }
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string()),
            Self::Upstream(e) => {
                warn!(error = %e, "upstream call failed");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            Self::Internal(message) => {
                error!(%message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, message).into_response()
    }
}

impl From<ProviderError> for HttpError {
    fn from(e: ProviderError) -> Self {
        Self::Upstream(e)
    }
}

impl From<ServerError> for HttpError {
    fn from(e: ServerError) -> Self {
        Self::Internal(e.to_string())
    }
}

struct PendingAuth {
    verifier: String,
    created: Instant,
}

/// Server side of the OAuth authorization-code flow.
///
/// Consent requests are remembered by their `state` until the callback
/// arrives or they expire.
pub struct AuthFlow {
    oauth: OAuthClient,
    store: Arc<dyn CredentialStore>,
    pending: Mutex<HashMap<String, PendingAuth>>,
}

impl AuthFlow {
    /// Creates a flow storing new credentials in `store`.
    pub fn new(config: &GoogleConfig, store: Arc<dyn CredentialStore>) -> ServerResult<Self> {
        Ok(Self {
            oauth: OAuthClient::new(config, config.http_client()?),
            store,
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Starts a consent request and returns the URL to send the user to.
    pub fn begin(&self) -> Result<String, HttpError> {
        let request = self.oauth.begin()?;
        let mut pending = self.lock_pending()?;
        pending.retain(|_, p| p.created.elapsed() < PENDING_AUTH_TTL);
        pending.insert(
            request.flow.state,
            PendingAuth {
                verifier: request.flow.verifier,
                created: Instant::now(),
            },
        );
        Ok(request.url)
    }

    /// Completes a consent request and stores the credential.
    ///
    /// Returns the id of the newly authorized calendar.
    pub async fn complete(&self, code: &str, state: &str) -> Result<String, HttpError> {
        let verifier = self
            .lock_pending()?
            .remove(state)
            .filter(|p| p.created.elapsed() < PENDING_AUTH_TTL)
            .map(|p| p.verifier)
            .ok_or_else(|| HttpError::BadRequest("unknown or expired state".to_string()))?;

        let token = self.oauth.exchange_code(code, &verifier).await?;
        let calendar = self
            .oauth
            .calendar_client(&token)
            .primary_calendar_id()
            .await?;
        self.store
            .upsert(calendar.clone(), token)
            .await
            .map_err(|e| HttpError::Internal(e.to_string()))?;

        info!(calendar = %calendar, "calendar authorized");
        Ok(calendar)
    }

    fn lock_pending(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, PendingAuth>>, HttpError> {
        self.pending
            .lock()
            .map_err(|_| HttpError::Internal("pending authorization lock poisoned".to_string()))
    }
}

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    gauges: PrometheusGauges,
    refresh: RefreshHandle,
    auth: Option<Arc<AuthFlow>>,
}

impl AppState {
    /// Creates handler state without an authorization flow.
    pub fn new(gauges: PrometheusGauges, refresh: RefreshHandle) -> Self {
        Self {
            gauges,
            refresh,
            auth: None,
        }
    }

    /// Builder: enable the `/auth` endpoint.
    pub fn with_auth(mut self, auth: AuthFlow) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }
}

/// Query parameters of the OAuth callback.
#[derive(Debug, Default, Deserialize)]
pub struct AuthParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Body of `/healthz`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    built_at: Option<DateTime<Utc>>,
    calendars: usize,
    scheduler: SchedulerState,
}

async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, HttpError> {
    let body = state.gauges.encode()?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

async fn update(State(state): State<AppState>) -> StatusCode {
    match state.refresh.trigger() {
        TriggerOutcome::Queued => StatusCode::NO_CONTENT,
        TriggerOutcome::Dropped => StatusCode::TOO_MANY_REQUESTS,
        TriggerOutcome::Closed => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn auth(
    State(state): State<AppState>,
    Query(params): Query<AuthParams>,
) -> Result<Response, HttpError> {
    let flow = state
        .auth
        .as_ref()
        .ok_or(HttpError::NotFound("authorization is not configured"))?;

    if let Some(error) = params.error {
        return Err(HttpError::BadRequest(format!("authorization denied: {}", error)));
    }

    let Some(code) = params.code else {
        return Ok(Redirect::temporary(&flow.begin()?).into_response());
    };
    let oauth_state = params
        .state
        .ok_or_else(|| HttpError::BadRequest("missing state".to_string()))?;

    let calendar = flow.complete(&code, &oauth_state).await?;
    if state.refresh.trigger() != TriggerOutcome::Queued {
        warn!(calendar = %calendar, "could not queue refresh after authorization");
    }

    Ok((StatusCode::OK, format!("authorized {}\n", calendar)).into_response())
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let scheduler = state.refresh.state().await;
    let snapshot = state.refresh.snapshot();
    Json(HealthResponse {
        status: if scheduler.is_ready() { "ok" } else { "starting" },
        built_at: scheduler.last_success.map(|_| snapshot.built_at()),
        calendars: snapshot.len(),
        scheduler,
    })
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/update", get(update).post(update))
        .route("/auth", get(auth))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the HTTP listener.
pub async fn bind(addr: SocketAddr) -> ServerResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::bind(addr, e))
}

/// Serves HTTP until shutdown, then drains in-flight requests.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: ShutdownHandle) -> ServerResult<()> {
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.wait().wait())
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
