//! Iris Server Entry Point

use iris::storage::LocalStore;
use iris::{api, Config, SearchEngine, SnapshotManager};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,iris=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Iris server...");

    // Load config
    let config = Config::from_env()?;
    tracing::info!("Loaded config: {:?}", config);

    // Create storage backends
    let local = Arc::new(LocalStore::new(&config.engine.data_dir)?);
    let objects = config.storage.create_backend().await?;
    tracing::info!("Storage backends initialized");

    // Create embedder and engine
    let embedder = config.embedder.create_backend(config.engine.embedding_dim);
    let engine = Arc::new(
        SearchEngine::new(config.engine.clone(), local, objects.clone(), embedder).await?,
    );
    tracing::info!("Search engine initialized");

    // Restore from the snapshot artifact when the local store is empty,
    // then start periodic backups
    let snapshots = Arc::new(SnapshotManager::new(
        engine.clone(),
        objects,
        config.engine.snapshot_key.clone(),
        config.engine.snapshot_interval,
        config.engine.snapshot_enabled,
    ));
    snapshots.restore().await?;
    snapshots.start();

    // Unload idle project indexes in the background
    engine.clone().start_idle_sweeper();

    // Start API server
    api::serve(engine, config.api, config.engine.max_upload_bytes).await?;

    Ok(())
}
