//! Durable metadata store
//!
//! One store spans all projects, partitioned by project id. Records live
//! fully in memory and are persisted per project to
//! `projects/{id}/records.json` on every mutation, in insertion order.
//! This local file is the primary store; the remote snapshot artifact is
//! disaster recovery only.
//!
//! Project existence is derived: a project is known iff it has at least one
//! record. There is no registry to keep in sync.

use crate::error::{IrisError, Result};
use crate::storage::LocalStore;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Metadata for one uploaded item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub project_id: String,
    pub remote_key: String,
    pub original_filename: Option<String>,
    pub content_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

fn records_path(project_id: &str) -> String {
    format!("projects/{}/records.json", project_id)
}

/// Durable mapping from item id to record, partitioned by project
pub struct MetadataStore {
    store: Arc<LocalStore>,
    projects: RwLock<HashMap<String, Vec<ItemRecord>>>,
}

impl MetadataStore {
    /// Open the store, loading every project's records from disk
    pub async fn open(store: Arc<LocalStore>) -> Result<Self> {
        let mut projects = HashMap::new();

        for project_id in store.list_dirs("projects")? {
            let path = records_path(&project_id);
            if !store.exists(&path) {
                continue;
            }
            let data = store.read(&path).await?;
            let records: Vec<ItemRecord> = serde_json::from_slice(&data)
                .map_err(|e| IrisError::serialization(format!("{}: {}", path, e)))?;
            if !records.is_empty() {
                projects.insert(project_id, records);
            }
        }

        debug!(projects = projects.len(), "Loaded metadata store");

        Ok(Self {
            store,
            projects: RwLock::new(projects),
        })
    }

    /// Whether the project has at least one item
    pub fn project_exists(&self, project_id: &str) -> bool {
        self.projects
            .read()
            .get(project_id)
            .map(|r| !r.is_empty())
            .unwrap_or(false)
    }

    /// All known project ids
    pub fn project_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.projects.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Insert a record and persist the project's file
    pub async fn put(&self, record: ItemRecord) -> Result<()> {
        let project_id = record.project_id.clone();
        let item_id = record.id.clone();
        let snapshot = {
            let mut projects = self.projects.write();
            let records = projects.entry(project_id.clone()).or_default();
            records.push(record);
            records.clone()
        };

        if let Err(err) = self.persist(&project_id, &snapshot).await {
            // Keep memory aligned with disk when the write fails
            let mut projects = self.projects.write();
            if let Some(records) = projects.get_mut(&project_id) {
                records.retain(|r| r.id != item_id);
                if records.is_empty() {
                    projects.remove(&project_id);
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// Get a record; distinguishes unknown project from unknown item
    pub fn get(&self, project_id: &str, item_id: &str) -> Result<ItemRecord> {
        let projects = self.projects.read();
        let records = projects
            .get(project_id)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| IrisError::project_not_found(project_id))?;

        records
            .iter()
            .find(|r| r.id == item_id)
            .cloned()
            .ok_or_else(|| IrisError::item_not_found(item_id))
    }

    /// List records in insertion order
    pub fn list(&self, project_id: &str) -> Result<Vec<ItemRecord>> {
        let projects = self.projects.read();
        let records = projects
            .get(project_id)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| IrisError::project_not_found(project_id))?;
        Ok(records.clone())
    }

    /// Remove a record and persist. The removed record is returned so the
    /// caller can clean up its remote blob.
    pub async fn delete(&self, project_id: &str, item_id: &str) -> Result<ItemRecord> {
        let (removed, remaining) = {
            let mut projects = self.projects.write();
            let records = projects
                .get_mut(project_id)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| IrisError::project_not_found(project_id))?;

            let pos = records
                .iter()
                .position(|r| r.id == item_id)
                .ok_or_else(|| IrisError::item_not_found(item_id))?;
            let removed = records.remove(pos);

            let remaining = records.clone();
            if remaining.is_empty() {
                projects.remove(project_id);
            }
            (removed, remaining)
        };

        if remaining.is_empty() {
            // Last item gone: the project ceases to exist
            self.store.delete(&records_path(project_id)).await?;
        } else {
            self.persist(project_id, &remaining).await?;
        }

        Ok(removed)
    }

    /// Drop every record of a project, returning them for blob cleanup
    pub async fn delete_project(&self, project_id: &str) -> Result<Vec<ItemRecord>> {
        let removed = self
            .projects
            .write()
            .remove(project_id)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| IrisError::project_not_found(project_id))?;

        self.store.delete(&records_path(project_id)).await?;
        Ok(removed)
    }

    /// Replace the entire store contents (snapshot restore path)
    pub async fn replace_all(&self, contents: HashMap<String, Vec<ItemRecord>>) -> Result<()> {
        for (project_id, records) in &contents {
            self.persist(project_id, records).await?;
        }
        *self.projects.write() = contents;
        Ok(())
    }

    /// Clone the full in-memory contents (snapshot backup path)
    pub fn export_all(&self) -> HashMap<String, Vec<ItemRecord>> {
        self.projects.read().clone()
    }

    async fn persist(&self, project_id: &str, records: &[ItemRecord]) -> Result<()> {
        let data = serde_json::to_vec(records)
            .map_err(|e| IrisError::serialization(e.to_string()))?;
        self.store.write(&records_path(project_id), &data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(project_id: &str, id: &str) -> ItemRecord {
        ItemRecord {
            id: id.to_string(),
            project_id: project_id.to_string(),
            remote_key: format!("images/{}/{}.jpg", project_id, id),
            original_filename: Some("cat.jpg".to_string()),
            content_type: "image/jpeg".to_string(),
            size_bytes: 1024,
            created_at: Utc::now(),
        }
    }

    async fn temp_store() -> (tempfile::TempDir, Arc<LocalStore>, MetadataStore) {
        let dir = tempfile::tempdir().unwrap();
        let local = Arc::new(LocalStore::new(dir.path()).unwrap());
        let meta = MetadataStore::open(local.clone()).await.unwrap();
        (dir, local, meta)
    }

    #[tokio::test]
    async fn test_put_get_list_in_insertion_order() {
        let (_dir, _local, meta) = temp_store().await;

        meta.put(record("demo", "b")).await.unwrap();
        meta.put(record("demo", "a")).await.unwrap();

        let got = meta.get("demo", "a").unwrap();
        assert_eq!(got.remote_key, "images/demo/a.jpg");

        let listed = meta.list("demo").unwrap();
        let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_unknown_project_vs_unknown_item() {
        let (_dir, _local, meta) = temp_store().await;
        meta.put(record("demo", "a")).await.unwrap();

        assert!(matches!(
            meta.get("ghost", "a"),
            Err(IrisError::ProjectNotFound { .. })
        ));
        assert!(matches!(
            meta.get("demo", "zzz"),
            Err(IrisError::ItemNotFound { .. })
        ));
        assert!(matches!(
            meta.list("ghost"),
            Err(IrisError::ProjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_deleting_last_item_removes_project() {
        let (_dir, _local, meta) = temp_store().await;
        meta.put(record("demo", "a")).await.unwrap();

        assert!(meta.project_exists("demo"));
        meta.delete("demo", "a").await.unwrap();

        assert!(!meta.project_exists("demo"));
        assert!(matches!(
            meta.get("demo", "a"),
            Err(IrisError::ProjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let local = Arc::new(LocalStore::new(dir.path()).unwrap());
            let meta = MetadataStore::open(local).await.unwrap();
            meta.put(record("p1", "x")).await.unwrap();
            meta.put(record("p2", "y")).await.unwrap();
        }

        let local = Arc::new(LocalStore::new(dir.path()).unwrap());
        let meta = MetadataStore::open(local).await.unwrap();
        assert!(meta.project_exists("p1"));
        assert_eq!(meta.project_ids(), vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(meta.get("p2", "y").unwrap().id, "y");
    }

    #[tokio::test]
    async fn test_delete_project_returns_records() {
        let (_dir, _local, meta) = temp_store().await;
        meta.put(record("demo", "a")).await.unwrap();
        meta.put(record("demo", "b")).await.unwrap();

        let removed = meta.delete_project("demo").await.unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!meta.project_exists("demo"));
    }
}
