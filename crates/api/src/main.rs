use std::sync::Arc;

use anyhow::Context;

use depot_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    depot_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let services = depot_api::app::services::build_services(&config)
        .await
        .context("failed to initialise ledger store")?;
    let app = depot_api::app::build_app(&config.jwt_secret, Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, store = config.store.kind(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C; shutting down");
        return;
    }
    tracing::info!("received Ctrl+C, shutting down gracefully");
}
