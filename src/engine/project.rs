//! Per-project index state
//!
//! Each project owns an isolated vector slab, HNSW graph, and id mapping.
//! Live vectors persist to `projects/{id}/vectors.bin`; the graph is rebuilt
//! from them when the project is loaded, which compacts away tombstones.
//!
//! All access is serialized by the engine through a read-write lock per
//! project: many concurrent searches, one exclusive writer.

use crate::error::{IrisError, Result};
use crate::hnsw::{HnswGraph, HnswParams};
use crate::storage::LocalStore;
use crate::vectors::VectorSlab;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

pub(crate) fn vectors_path(project_id: &str) -> String {
    format!("projects/{}/vectors.bin", project_id)
}

/// One project's vectors, graph, and id maps
pub struct ProjectIndex {
    project_id: String,
    capacity: usize,
    params: HnswParams,
    slab: VectorSlab,
    graph: HnswGraph,
    id_to_slot: HashMap<String, u32>,
    slot_to_id: HashMap<u32, String>,
}

impl ProjectIndex {
    /// Open a project index, rebuilding the graph from the persisted live
    /// vectors when present
    pub async fn open(
        project_id: &str,
        dims: usize,
        capacity: usize,
        params: HnswParams,
        store: &LocalStore,
    ) -> Result<Self> {
        let mut index = Self {
            project_id: project_id.to_string(),
            capacity,
            params: params.clone(),
            slab: VectorSlab::new(dims),
            graph: HnswGraph::new(params),
            id_to_slot: HashMap::new(),
            slot_to_id: HashMap::new(),
        };

        let path = vectors_path(project_id);
        if store.exists(&path) {
            let data = store.read(&path).await?;
            let entries: Vec<(String, Vec<f32>)> = bincode::deserialize(&data)
                .map_err(|e| IrisError::serialization(format!("{}: {}", path, e)))?;

            let count = entries.len();
            for (item_id, vector) in entries {
                index.insert(item_id, vector)?;
            }
            debug!(project_id = %project_id, vectors = count, "Rebuilt project index");
        }

        Ok(index)
    }

    /// Insert a normalized vector under an item id.
    ///
    /// Fails with `CapacityExceeded` when the live count is at the
    /// configured maximum; nothing is evicted to make room.
    pub fn insert(&mut self, item_id: String, vector: Vec<f32>) -> Result<()> {
        if self.slab.live_count() >= self.capacity {
            return Err(IrisError::CapacityExceeded {
                project_id: self.project_id.clone(),
                capacity: self.capacity,
            });
        }

        let slot = self.slab.append(vector)?;
        self.graph.insert(slot, &self.slab);
        self.id_to_slot.insert(item_id.clone(), slot);
        self.slot_to_id.insert(slot, item_id);
        Ok(())
    }

    /// Tombstone an item's vector. Returns false if the id is unknown.
    pub fn remove(&mut self, item_id: &str) -> bool {
        let Some(slot) = self.id_to_slot.remove(item_id) else {
            return false;
        };
        self.slot_to_id.remove(&slot);
        self.slab.tombstone(slot)
    }

    /// Search for the k most similar live items, ordered by descending
    /// similarity, ties broken by insertion order
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        // Widen the candidate pool past the tombstones so k live results
        // can surface when they exist
        let tombstones = self.slab.len() - self.slab.live_count();
        let ef = self.params.ef_search.max(k + tombstones);

        self.graph
            .search(query, k, ef, &self.slab)
            .into_iter()
            .filter_map(|(slot, score)| {
                self.slot_to_id.get(&slot).map(|id| (id.clone(), score))
            })
            .collect()
    }

    /// Number of live vectors
    pub fn live_count(&self) -> usize {
        self.slab.live_count()
    }

    /// Live (item id, vector) pairs in insertion order
    pub fn live_entries(&self) -> Vec<(String, Vec<f32>)> {
        let mut entries = Vec::with_capacity(self.slab.live_count());
        for slot in 0..self.slab.len() as u32 {
            if !self.slab.is_live(slot) {
                continue;
            }
            if let (Some(id), Some(vector)) = (self.slot_to_id.get(&slot), self.slab.get(slot)) {
                entries.push((id.clone(), vector.to_vec()));
            }
        }
        entries
    }

    /// Persist live vectors to the project's vector file
    pub async fn persist(&self, store: &LocalStore) -> Result<()> {
        let entries = self.live_entries();
        let data = bincode::serialize(&entries)
            .map_err(|e| IrisError::serialization(e.to_string()))?;
        store.write(&vectors_path(&self.project_id), &data).await?;
        Ok(())
    }

}

/// A loaded project index plus its idle-tracking metadata
pub struct ProjectHandle {
    pub index: RwLock<ProjectIndex>,
    last_used: Mutex<Instant>,
}

impl ProjectHandle {
    pub fn new(index: ProjectIndex) -> Arc<Self> {
        Arc::new(Self {
            index: RwLock::new(index),
            last_used: Mutex::new(Instant::now()),
        })
    }

    /// Record an access (keeps the index loaded)
    pub fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    /// Time since the last access
    pub fn idle_for(&self) -> std::time::Duration {
        self.last_used.lock().elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectors::normalize;

    async fn open_index(store: &LocalStore, capacity: usize) -> ProjectIndex {
        ProjectIndex::open("demo", 4, capacity, HnswParams::with_m(4), store)
            .await
            .unwrap()
    }

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; 4];
        v[i] = 1.0;
        normalize(&v)
    }

    #[tokio::test]
    async fn test_insert_search_remove() {
        let (_dir, store) = LocalStore::temp().unwrap();
        let mut index = open_index(&store, 10).await;

        index.insert("a".to_string(), axis(0)).unwrap();
        index.insert("b".to_string(), axis(1)).unwrap();
        assert_eq!(index.live_count(), 2);

        let results = index.search(&axis(0), 2);
        assert_eq!(results[0].0, "a");

        assert!(index.remove("a"));
        assert!(!index.remove("a"));
        assert_eq!(index.live_count(), 1);

        let results = index.search(&axis(0), 2);
        assert!(results.iter().all(|(id, _)| id != "a"));
    }

    #[tokio::test]
    async fn test_capacity_exceeded_leaves_index_full() {
        let (_dir, store) = LocalStore::temp().unwrap();
        let mut index = open_index(&store, 3).await;

        for i in 0..3 {
            index.insert(format!("item-{i}"), axis(i)).unwrap();
        }

        let err = index.insert("overflow".to_string(), axis(3)).unwrap_err();
        assert!(matches!(err, IrisError::CapacityExceeded { capacity: 3, .. }));
        assert_eq!(index.live_count(), 3);
    }

    #[tokio::test]
    async fn test_tombstone_frees_capacity() {
        let (_dir, store) = LocalStore::temp().unwrap();
        let mut index = open_index(&store, 2).await;

        index.insert("a".to_string(), axis(0)).unwrap();
        index.insert("b".to_string(), axis(1)).unwrap();
        assert!(index.insert("c".to_string(), axis(2)).is_err());

        index.remove("a");
        index.insert("c".to_string(), axis(2)).unwrap();
        assert_eq!(index.live_count(), 2);
    }

    #[tokio::test]
    async fn test_persist_and_reopen_compacts_tombstones() {
        let (_dir, store) = LocalStore::temp().unwrap();
        let mut index = open_index(&store, 10).await;

        index.insert("keep".to_string(), axis(0)).unwrap();
        index.insert("drop".to_string(), axis(1)).unwrap();
        index.remove("drop");
        index.persist(&store).await.unwrap();

        let reopened = open_index(&store, 10).await;
        assert_eq!(reopened.live_count(), 1);

        let results = reopened.search(&axis(0), 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "keep");
    }
}
