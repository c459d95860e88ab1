//! Serve command: runs the gauge service in the foreground.
//!
//! Startup order:
//! - signal handler
//! - HTTP listener (fails fast on a taken port)
//! - credential store and the first snapshot build (fatal on error)
//! - refresh and derivation loops, then the HTTP server until shutdown

use std::sync::Arc;

use calgauge_providers::google::FileCredentialStore;
use calgauge_server::{AppState, AuthFlow, PrometheusGauges, Service, SignalHandler, http};
use tracing::{info, warn};

use crate::cli::ServeArgs;
use crate::config::Config;
use crate::error::CliResult;

/// Applies command-line overrides on top of the file configuration.
pub fn apply_overrides(config: &mut Config, args: &ServeArgs) {
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref path) = args.token_store {
        config.google.token_store = Some(path.clone());
    }
    if let Some(ref path) = args.credentials_file {
        config.google.credentials_file = Some(path.clone());
    }
}

/// Runs until SIGINT or SIGTERM.
pub async fn run(args: &ServeArgs, config: &Config) -> CliResult<()> {
    let mut config = config.clone();
    apply_overrides(&mut config, args);

    let server_config = config.server_config()?;
    let google = config.google.provider_config()?;
    let token_store = config.google.token_store_path();

    let signals = SignalHandler::new();
    signals.spawn_listener();

    let listener = http::bind(server_config.listen).await?;

    let store = Arc::new(FileCredentialStore::new(&token_store, &google)?);
    let calendars = store.calendar_ids()?;
    info!(
        token_store = %token_store.display(),
        calendars = calendars.len(),
        "credential store opened"
    );

    let gauges = PrometheusGauges::new()?;
    let service = Service::start(
        store.clone(),
        Arc::new(gauges.clone()),
        &server_config,
        signals.shutdown_handle(),
    )
    .await?;

    let mut state = AppState::new(gauges, service.refresh_handle());
    match google.effective_redirect_uri() {
        Some(uri) => {
            state = state.with_auth(AuthFlow::new(&google, store)?);
            if calendars.is_empty() {
                warn!(redirect = %uri, "no calendars authorized yet; open /auth to add one");
            }
        }
        None => warn!("no OAuth redirect URI configured; /auth is disabled"),
    }

    let served = http::serve(listener, state, signals.shutdown_handle()).await;

    // Stop the loops even if the HTTP server failed on its own.
    signals.trigger_shutdown();
    service.wait().await?;
    served?;

    info!("calgauge stopped");
    Ok(())
}
