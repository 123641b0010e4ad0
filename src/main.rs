use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use provisioner::config::Configuration;
use provisioner::{app, initialize_state, telemetry};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
const DEFAULT_FILTER: &str = "provisioner=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with(fmt::layer())
        .init();

    let mut config = Configuration::default();
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        config = config.path(PathBuf::from(path));
    }
    let config = config.read()?;

    let mut state = initialize_state(Arc::clone(&config)).await?;
    state.metrics = match telemetry::setup_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!(error = %err, "prometheus recorder not installed");
            None
        },
    };

    let listener = tokio::net::TcpListener::bind(&config.server.address).await?;
    tracing::info!(address = %config.server.address, "server started");

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
