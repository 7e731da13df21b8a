use anyhow::Context;
use dotenvy::dotenv;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use framesnap::app;
use framesnap::config::settings::AppConfig;
use framesnap::infrastructure::db::{connect_to_db, run_migrations};
use framesnap::infrastructure::queue::{RabbitMqService, TopologyManager};
use framesnap::infrastructure::storage::StorageService;
use framesnap::state::AppState;
use framesnap::workers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting frame extraction service...");

    let config = AppConfig::new().context("invalid configuration")?;

    let db = connect_to_db(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    run_migrations(&db).await.context("failed to run migrations")?;

    let queue = RabbitMqService::new(&config.broker.amqp_url())
        .await
        .context("failed to connect to RabbitMQ")?;
    TopologyManager::new(&queue, config.broker.message_ttl_ms)
        .declare()
        .await
        .context("failed to declare RabbitMQ topology")?;

    let storage = StorageService::new(
        &config.minio_url,
        &config.minio_bucket,
        &config.minio_access_key,
        &config.minio_secret_key,
    )
    .await;

    let port = config.server_port;
    let state = AppState::new(config, db, queue, storage);

    let shutdown = CancellationToken::new();
    let worker_handles = workers::spawn_workers(&state, shutdown.clone());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    info!("Operational endpoints on http://0.0.0.0:{}", port);

    let trigger = shutdown.clone();
    axum::serve(listener, app::create_app(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown requested, draining consumers");
            trigger.cancel();
        })
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    for handle in worker_handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Worker task panicked");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A signal that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}
