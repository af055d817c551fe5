//! Snapshot backup and restore
//!
//! The local store is the primary copy; the snapshot artifact in object
//! storage exists for disaster recovery only. A backup serializes all
//! records and live vectors into a single object on a fixed interval.
//! Restore runs once at startup and only when the local store is empty; a
//! populated local store always wins over the remote artifact.

use crate::engine::{SearchEngine, SnapshotData};
use crate::error::Result;
use crate::storage::{ObjectStorage, StorageError};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Owns the snapshot lifecycle for one engine
pub struct SnapshotManager {
    engine: Arc<SearchEngine>,
    objects: Arc<dyn ObjectStorage>,
    key: String,
    interval: Duration,
    enabled: bool,
}

impl SnapshotManager {
    pub fn new(
        engine: Arc<SearchEngine>,
        objects: Arc<dyn ObjectStorage>,
        key: impl Into<String>,
        interval: Duration,
        enabled: bool,
    ) -> Self {
        Self {
            engine,
            objects,
            key: key.into(),
            interval,
            enabled,
        }
    }

    /// Restore engine state from the snapshot artifact if the local store
    /// is empty. A missing or unreadable artifact is never fatal; the
    /// engine just starts empty.
    pub async fn restore(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.engine.has_local_data()? {
            info!("Local store has data, skipping snapshot restore");
            return Ok(());
        }

        let bytes = match self.objects.get(&self.key).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound { .. }) => {
                info!(key = %self.key, "No snapshot artifact, starting empty");
                return Ok(());
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "Snapshot fetch failed, starting empty");
                return Ok(());
            }
        };

        let data: SnapshotData = match bincode::deserialize(&bytes) {
            Ok(data) => data,
            Err(err) => {
                warn!(key = %self.key, error = %err, "Snapshot artifact is unreadable, starting empty");
                return Ok(());
            }
        };

        let projects = data.records.len();
        if let Err(err) = self.engine.load_snapshot(data).await {
            warn!(key = %self.key, error = %err, "Snapshot load failed, continuing without it");
            return Ok(());
        }
        info!(projects, "Restored state from snapshot");
        Ok(())
    }

    /// Take one backup now
    pub async fn backup(&self) -> Result<()> {
        let data = self.engine.collect_snapshot().await?;
        let bytes = bincode::serialize(&data)
            .map_err(|e| crate::error::IrisError::serialization(e.to_string()))?;

        self.objects
            .put(&self.key, Bytes::from(bytes), "application/octet-stream")
            .await?;

        info!(key = %self.key, projects = data.records.len(), "Wrote snapshot");
        Ok(())
    }

    /// Spawn the periodic backup loop. Backup failures are logged and the
    /// loop keeps going; the next tick tries again.
    pub fn start(self: Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if !self.enabled {
            info!("Snapshot backups disabled");
            return None;
        }

        let manager = self;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so startup state
            // is not snapshotted before any traffic
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(err) = manager.backup().await {
                    error!(error = %err, "Snapshot backup failed");
                }
            }
        }))
    }
}
