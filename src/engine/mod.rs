//! Search engine orchestration
//!
//! Ties the collaborators together: per-project HNSW indexes (loaded on
//! demand, unloaded when idle), the durable metadata store, the object store
//! for image blobs, and the gated embedder. Projects are implicit; the first
//! successful upload brings one into existence and deleting the last item
//! removes it.
//!
//! Locking discipline, outermost first:
//! 1. the engine-wide write gate (shared for inserts, exclusive while a
//!    snapshot is collected or a project is torn down)
//! 2. the per-project index lock (shared for search, exclusive for writes)
//! The inference gate is independent of both and is never held across them.

pub mod project;

use crate::config::EngineConfig;
use crate::embedding::{Embedder, GatedEmbedder};
use crate::error::{IrisError, Result};
use crate::metadata::{ItemRecord, MetadataStore};
use crate::project::{remote_key, safe_suffix, validate_item_id, validate_project_id};
use crate::storage::{LocalStore, ObjectStorage};
use crate::vectors::normalize;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use self::project::{ProjectHandle, ProjectIndex};

/// One search result: a stored item and its similarity to the query
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: ItemRecord,
    pub score: f32,
}

/// Full engine state captured for a snapshot artifact
#[derive(serde::Serialize, serde::Deserialize)]
pub struct SnapshotData {
    pub records: HashMap<String, Vec<ItemRecord>>,
    pub vectors: HashMap<String, Vec<(String, Vec<f32>)>>,
}

/// Project-scoped semantic image search engine
pub struct SearchEngine {
    config: EngineConfig,
    local: Arc<LocalStore>,
    objects: Arc<dyn ObjectStorage>,
    embedder: GatedEmbedder,
    metadata: MetadataStore,
    projects: DashMap<String, Arc<ProjectHandle>>,
    /// Shared by inserts, exclusive for snapshot collection and teardown
    write_gate: RwLock<()>,
}

impl SearchEngine {
    /// Create the engine, loading all persisted metadata from the local store
    pub async fn new(
        config: EngineConfig,
        local: Arc<LocalStore>,
        objects: Arc<dyn ObjectStorage>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let metadata = MetadataStore::open(local.clone()).await?;

        Ok(Self {
            config,
            local,
            objects,
            embedder: GatedEmbedder::new(embedder),
            metadata,
            projects: DashMap::new(),
            write_gate: RwLock::new(()),
        })
    }

    /// Embed an image, store the blob, and index it under a fresh item id.
    ///
    /// The blob write happens before the index insert; if anything after it
    /// fails the blob is deleted again before the error is returned, so a
    /// failed upload leaves no orphan in the object store.
    pub async fn upload(
        &self,
        project_id: &str,
        filename: Option<&str>,
        content_type: &str,
        data: Bytes,
    ) -> Result<ItemRecord> {
        let project_id = validate_project_id(project_id)?.to_string();

        if !content_type.starts_with("image/") {
            return Err(IrisError::UnsupportedContentType(content_type.to_string()));
        }
        if data.is_empty() {
            return Err(IrisError::EmptyUpload);
        }
        if data.len() as u64 > self.config.max_upload_bytes {
            return Err(IrisError::UploadTooLarge {
                limit: self.config.max_upload_bytes,
            });
        }

        let embedding = self.embedder.embed_image(&data).await?;
        if embedding.len() != self.config.embedding_dim {
            return Err(IrisError::dimension_mismatch(
                self.config.embedding_dim,
                embedding.len(),
            ));
        }
        let vector = normalize(&embedding);

        let item_id = Uuid::new_v4().to_string();
        let key = remote_key(
            &self.config.image_key_prefix,
            &project_id,
            &item_id,
            &safe_suffix(filename),
        );

        let record = ItemRecord {
            id: item_id,
            project_id: project_id.clone(),
            remote_key: key.clone(),
            original_filename: filename.map(str::to_string),
            content_type: content_type.to_string(),
            size_bytes: data.len() as u64,
            created_at: Utc::now(),
        };

        self.objects.put(&key, data, content_type).await?;

        if let Err(err) = self.index_and_record(&record, vector).await {
            if let Err(cleanup_err) = self.objects.delete(&key).await {
                warn!(
                    key = %key,
                    error = %cleanup_err,
                    "Failed to delete blob after aborted upload"
                );
            }
            return Err(err);
        }

        info!(
            project_id = %project_id,
            item_id = %record.id,
            bytes = record.size_bytes,
            "Indexed image"
        );
        Ok(record)
    }

    async fn index_and_record(&self, record: &ItemRecord, vector: Vec<f32>) -> Result<()> {
        let _gate = self.write_gate.read().await;
        let handle = self.load_project(&record.project_id).await?;
        let mut index = handle.index.write().await;

        index.insert(record.id.clone(), vector)?;

        let committed = async {
            index.persist(&self.local).await?;
            self.metadata.put(record.clone()).await
        }
        .await;

        if let Err(err) = committed {
            index.remove(&record.id);
            if let Err(persist_err) = index.persist(&self.local).await {
                warn!(
                    project_id = %record.project_id,
                    error = %persist_err,
                    "Failed to persist index after rolling back an insert"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    /// Search a project with a free-text query. The project must exist;
    /// querying an unknown project fails before any inference runs.
    pub async fn search(
        &self,
        project_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let project_id = validate_project_id(project_id)?;
        if !self.metadata.project_exists(project_id) {
            return Err(IrisError::project_not_found(project_id));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_text(query).await?;
        if embedding.len() != self.config.embedding_dim {
            return Err(IrisError::dimension_mismatch(
                self.config.embedding_dim,
                embedding.len(),
            ));
        }
        let query_vector = normalize(&embedding);

        let handle = self.load_project(project_id).await?;
        let scored = handle.index.read().await.search(&query_vector, limit);

        let mut hits = Vec::with_capacity(scored.len());
        for (item_id, score) in scored {
            match self.metadata.get(project_id, &item_id) {
                Ok(record) => hits.push(SearchHit { record, score }),
                Err(err) => {
                    // Index and metadata disagree; surface the rest anyway
                    warn!(
                        project_id = %project_id,
                        item_id = %item_id,
                        error = %err,
                        "Indexed item has no metadata record, skipping"
                    );
                }
            }
        }
        Ok(hits)
    }

    /// List a project's items in upload order
    pub fn list(&self, project_id: &str) -> Result<Vec<ItemRecord>> {
        let project_id = validate_project_id(project_id)?;
        self.metadata.list(project_id)
    }

    /// Get one item's record
    pub fn get(&self, project_id: &str, item_id: &str) -> Result<ItemRecord> {
        let project_id = validate_project_id(project_id)?;
        let item_id = validate_item_id(item_id)?;
        self.metadata.get(project_id, item_id)
    }

    /// Get an item's record plus a time-limited URL for its blob
    pub async fn presign(&self, project_id: &str, item_id: &str) -> Result<(ItemRecord, String)> {
        let record = self.get(project_id, item_id)?;
        let url = self
            .objects
            .presign_get(&record.remote_key, self.config.presign_ttl)
            .await?;
        Ok((record, url))
    }

    /// Remove an item from the index and metadata, then best-effort delete
    /// its blob. A blob that outlives its record is tolerated; the reverse
    /// is not, so the remote delete is never rolled back into the index.
    pub async fn delete(&self, project_id: &str, item_id: &str) -> Result<()> {
        let project_id = validate_project_id(project_id)?.to_string();
        let item_id = validate_item_id(item_id)?.to_string();

        // Exclusive gate: deleting may tear the whole project down, and that
        // must not interleave with a concurrent insert's persist
        let removed = {
            let _gate = self.write_gate.write().await;
            let removed = self.metadata.delete(&project_id, &item_id).await?;

            if self.metadata.project_exists(&project_id) {
                let handle = self.load_project(&project_id).await?;
                let mut index = handle.index.write().await;
                index.remove(&item_id);
                index.persist(&self.local).await?;
            } else {
                // Last item gone: drop the loaded index and the project's files
                self.projects.remove(&project_id);
                self.local.delete_dir(&format!("projects/{}", project_id)).await?;
            }
            removed
        };

        if let Err(err) = self.objects.delete(&removed.remote_key).await {
            warn!(
                key = %removed.remote_key,
                error = %err,
                "Failed to delete blob for removed item"
            );
        }

        info!(project_id = %project_id, item_id = %item_id, "Deleted image");
        Ok(())
    }

    /// Remove a whole project: every record, the local files, and
    /// best-effort every blob
    pub async fn delete_project(&self, project_id: &str) -> Result<()> {
        let project_id = validate_project_id(project_id)?.to_string();

        let records = {
            let _gate = self.write_gate.write().await;
            let records = self.metadata.delete_project(&project_id).await?;
            self.projects.remove(&project_id);
            self.local.delete_dir(&format!("projects/{}", project_id)).await?;
            records
        };

        for record in &records {
            if let Err(err) = self.objects.delete(&record.remote_key).await {
                warn!(
                    key = %record.remote_key,
                    error = %err,
                    "Failed to delete blob while removing project"
                );
            }
        }

        info!(project_id = %project_id, items = records.len(), "Deleted project");
        Ok(())
    }

    /// All known project ids
    pub fn project_ids(&self) -> Vec<String> {
        self.metadata.project_ids()
    }

    /// Whether the local store already holds any project data
    pub fn has_local_data(&self) -> Result<bool> {
        Ok(!self.local.list_dirs("projects")?.is_empty())
    }

    /// Capture all records and live vectors under the exclusive write gate.
    /// Searches keep running; mutations wait for the brief collection pass.
    pub async fn collect_snapshot(&self) -> Result<SnapshotData> {
        let _gate = self.write_gate.write().await;

        let records = self.metadata.export_all();
        let mut vectors = HashMap::new();

        for project_id in records.keys() {
            // Clone the handle out so no map shard guard is held across awaits
            let loaded = self.projects.get(project_id).map(|h| Arc::clone(&*h));
            let entries = match loaded {
                Some(handle) => handle.index.read().await.live_entries(),
                None => {
                    let path = project::vectors_path(project_id);
                    if self.local.exists(&path) {
                        let data = self.local.read(&path).await?;
                        bincode::deserialize(&data)
                            .map_err(|e| IrisError::serialization(format!("{}: {}", path, e)))?
                    } else {
                        Vec::new()
                    }
                }
            };
            vectors.insert(project_id.clone(), entries);
        }

        Ok(SnapshotData { records, vectors })
    }

    /// Replace all local state with a snapshot's contents. Only valid at
    /// startup, before any project has been loaded.
    pub async fn load_snapshot(&self, data: SnapshotData) -> Result<()> {
        for (project_id, entries) in &data.vectors {
            let bytes = bincode::serialize(entries)
                .map_err(|e| IrisError::serialization(e.to_string()))?;
            self.local
                .write(&project::vectors_path(project_id), &bytes)
                .await?;
        }
        self.metadata.replace_all(data.records).await?;
        Ok(())
    }

    /// Unload project indexes that have been idle past the configured TTL.
    /// The durable files stay; the next access reloads them.
    pub fn evict_idle(&self) {
        let ttl = self.config.idle_unload;
        self.projects.retain(|project_id, handle| {
            // Arc count > 1 means an operation still holds the handle
            let keep = handle.idle_for() < ttl || Arc::strong_count(handle) > 1;
            if !keep {
                debug!(project_id = %project_id, "Unloading idle project index");
            }
            keep
        });
    }

    /// Spawn the periodic idle-index sweep
    pub fn start_idle_sweeper(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.config.idle_unload);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                engine.evict_idle();
            }
        })
    }

    async fn load_project(&self, project_id: &str) -> Result<Arc<ProjectHandle>> {
        if let Some(handle) = self.projects.get(project_id) {
            handle.touch();
            return Ok(Arc::clone(&*handle));
        }

        let index = ProjectIndex::open(
            project_id,
            self.config.embedding_dim,
            self.config.max_elements,
            self.config.hnsw_params(),
            &self.local,
        )
        .await?;

        // A concurrent load may have won the race; keep the one in the map
        let handle = match self.projects.entry(project_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(e) => Arc::clone(e.get()),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                Arc::clone(&*e.insert(ProjectHandle::new(index)))
            }
        };
        handle.touch();
        Ok(handle)
    }
}
