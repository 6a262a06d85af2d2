use std::sync::Arc;

use anyhow::Context;

use warehouse_infra::{JsonFileSystemStore, SystemRegistry, WarehouseConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warehouse_observability::init();

    let config = WarehouseConfig::from_env()?;

    let store = JsonFileSystemStore::open(&config.db_path)
        .with_context(|| format!("failed to open system list {}", config.db_path.display()))?;
    let registry = SystemRegistry::start(Arc::new(store), config.channel())?;

    let app = warehouse_api::app::build_app(registry.clone());

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;

    tracing::info!(
        db = %config.db_path.display(),
        systems = registry.names().len(),
        "listening on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down; flushing system list");
    registry.flush().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
