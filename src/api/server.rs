use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{
    services::{archive_status, clean_old, health, metrics, submit_archive},
    state::AppState,
};
use crate::config::Config;
use crate::retention::RetentionScheduler;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All routes with tracing and gzip request decompression applied
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/zip", post(submit_archive))
        .route("/zip/{file_id}", get(archive_status))
        .route("/clean-old", get(clean_old).post(clean_old))
        .route("/operators/health", get(health))
        .route("/operators/metrics", get(metrics))
        .route("/health", get(health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestDecompressionLayer::new()),
        )
}

/// Serve until Ctrl+C or SIGTERM, with the periodic sweeper running alongside
pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);
    let state = AppState::new(config);

    let sweeper = RetentionScheduler::from_config(
        &state.config,
        Arc::clone(&state.retention),
        Arc::clone(&state.metrics),
    )
    .start();

    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "ZipBox API listening");

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.abort();
    info!("Retention scheduler stopped");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
