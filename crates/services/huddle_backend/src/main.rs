// File: services/huddle_backend/src/main.rs
use std::sync::Arc;

use huddle_backend::{app, service_factory::build_app_state};
use huddle_common::logging;
use huddle_config::load_config;
use huddle_notifications::ConnectionRegistry;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(load_config()?);
    // Keeps the file writer flushing until main returns
    let _log_guard = logging::init(&config.logging);

    let (state, worker) = build_app_state(config.clone()).await?;
    let worker_handle = worker.spawn();
    let registry = state.notifications.writer.registry().clone();

    let app = app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    // The router held the last publisher handles, so the worker now drains
    info!("Server stopped, draining publisher");
    if let Err(e) = worker_handle.await {
        error!("Publisher worker ended abnormally: {}", e);
    }
    Ok(())
}

/// Resolves on Ctrl-C after closing the open notification streams, which
/// would otherwise keep the graceful shutdown waiting.
async fn shutdown_signal(registry: ConnectionRegistry) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Could not listen for the shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    registry.close_all();
}
