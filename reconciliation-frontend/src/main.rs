use dotenvy::dotenv;
use reconciliation_frontend::config::get_configuration;
use reconciliation_frontend::services::metrics::init_metrics;
use reconciliation_frontend::startup::{build_router, spawn_session_sweeper};
use reconciliation_frontend::AppState;
use service_core::observability::init_tracing;
use std::time::Duration;
use tokio::signal;
use tracing::info;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "reconciliation-frontend",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    );

    init_metrics();

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let sweep_every = Duration::from_secs(configuration.reconciliation.purge_interval_secs);
    let max_idle = Duration::from_secs(configuration.reconciliation.session_idle_secs);

    let state = AppState::from_settings(configuration)
        .map_err(|e| anyhow::anyhow!("Failed to build ERP client: {}", e))?;

    let sweeper = spawn_session_sweeper(state.reconcile.clone(), sweep_every, max_idle);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting reconciliation-frontend on {}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!("Server error: {}", e);
            anyhow::anyhow!("Server error: {}", e)
        })?;

    sweeper.abort();
    tracing::info!("Service shutdown complete");
    Ok(())
}
