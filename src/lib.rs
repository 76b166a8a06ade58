pub mod api;
pub mod config;
pub mod error;
pub mod market;
pub mod state;
pub mod telemetry;
pub mod traffic;

use api::build_router;
use config::ServiceConfig;
use error::AppError;
use state::AppState;
use tokio::net::TcpListener;

pub async fn run(config: ServiceConfig) -> Result<(), AppError> {
    config.validate()?;
    let state = AppState::new(&config)?;

    if state.traffic.is_enabled() {
        match state.traffic.start_baseline().await {
            Ok(running) => tracing::debug!(running, "baseline load checked"),
            Err(error) => tracing::warn!(%error, "baseline load did not start"),
        }
    } else {
        tracing::info!("traffic simulation disabled");
    }

    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!(
        addr = %config.listen_addr,
        hostname = %state.hostname,
        market_api = state.price_feed.has_credentials(),
        "stock monitor backend listening"
    );

    axum::serve(listener, build_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.traffic.shutdown().await;
    tracing::info!("stock monitor backend stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received terminate signal, shutting down"),
    }
}
