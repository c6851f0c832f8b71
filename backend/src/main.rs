use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zkbalance_backend::config::Config;
use zkbalance_backend::errors::ApiError;
use zkbalance_backend::state::{ensure_keys, open_store, AppState};
use zkbalance_backend::{api, sweeper};
use zkbalance_common::clock::{Clock, SystemClock};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    // Store local state under backend/data (ignored by git).
    std::fs::create_dir_all(&config.data_dir).map_err(|_| ApiError::Internal)?;

    // The verifying key is loaded once, before the first request.
    let verifier = ensure_keys(&config.data_dir).await?;

    let store = open_store(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = AppState::new(
        store.clone(),
        clock.clone(),
        Arc::new(verifier),
        &config.token_secret,
        &config.source_tag,
    );

    let _sweeper = sweeper::spawn(store, clock, config.sweep_interval, state.replay.retention_ms());

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .map_err(|_| ApiError::Internal)?;

    tracing::info!(addr = %config.addr, source_tag = %config.source_tag, "gate listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|_| ApiError::Internal)?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
