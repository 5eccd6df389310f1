//! Voice query API server.
//!
//! Hosts the intent resolver for the dialogue layer and keeps the entity
//! catalog fresh in the background.

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use vq_api::config::ApiConfig;
use vq_api::routes;
use vq_api::state::AppState;
use vq_resolver::ResolverConfig;
use vq_resolver::catalog::refresh_loop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "vq-api starting");

    let api = ApiConfig::from_env();
    let config = match &api.config_path {
        Some(path) => {
            tracing::info!(path = %path, "loading resolver config");
            ResolverConfig::from_file(path)?
        }
        None => {
            tracing::warn!("VQ_CONFIG not set, using default resolver config");
            ResolverConfig::default()
        }
    };

    let state = AppState::from_config(&config).await?;

    if let Some(interval) = config.refresh_interval() {
        tracing::info!(interval_secs = interval.as_secs(), "catalog refresh loop enabled");
        tokio::spawn(refresh_loop(
            state.catalog.clone(),
            state.inventory.clone(),
            interval,
        ));
    }

    let app = routes::build_router(state);
    let addr = api.addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
