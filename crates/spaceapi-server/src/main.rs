use anyhow::{Context, Result};
use spaceapi_core::{KeepaliveWatchdog, KeyRegistry, StatusDocument, Store};
use spaceapi_server::{command, routes, ApiToken, AppState, ServerConfig};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warp::Filter;

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = command().get_matches();
    let config = ServerConfig::from_matches(&matches).context("invalid configuration")?;
    init_tracing(&config.log_level);

    let store = Store::shared(&config.data_file);
    if config.init {
        let template = StatusDocument::template(&config.space_name);
        let created = store
            .init_if_missing(&template)
            .context("failed to create status document")?;
        if created {
            info!(path = %config.data_file.display(), "created template status document");
        }
    } else if !store.path().exists() {
        warn!(
            path = %config.data_file.display(),
            "status document missing, requests will fail until it exists (see --init)"
        );
    }

    let watchdog = Arc::new(KeepaliveWatchdog::new(config.watchdog)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watchdog_task = Arc::clone(&watchdog).spawn(Arc::clone(&store), shutdown_rx);

    let token = ApiToken::new(config.api_token.clone());
    let auth_enabled = token.is_enabled();
    let state = AppState::new(store, KeyRegistry::with_defaults(), watchdog, token);
    let app = routes(state).with(warp::trace::request());

    let (addr, server) = warp::serve(app)
        .try_bind_with_graceful_shutdown(config.bind, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .with_context(|| format!("failed to bind {}", config.bind))?;

    info!(
        %addr,
        data_file = %config.data_file.display(),
        auth = auth_enabled,
        version = spaceapi_server::VERSION,
        "spaceapi server listening"
    );
    server.await;

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    watchdog_task.await.context("watchdog task panicked")?;

    Ok(())
}
