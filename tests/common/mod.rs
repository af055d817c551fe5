//! Shared test harness
//!
//! Builds an engine over temp directories with the mock object store and
//! the deterministic mock embedder. The mock embedder hashes raw bytes, so
//! a text query exactly matches an image whose bytes equal the query text;
//! tests exploit this to control ranking.

use bytes::Bytes;
use iris::config::EngineConfig;
use iris::embedding::MockEmbedder;
use iris::metadata::ItemRecord;
use iris::storage::{LocalStore, MockObjectStorage};
use iris::SearchEngine;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_DIMS: usize = 8;

pub struct TestHarness {
    pub data_dir: TempDir,
    pub object_dir: TempDir,
    pub objects: Arc<MockObjectStorage>,
    pub engine: Arc<SearchEngine>,
}

pub fn test_config(capacity: usize) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.embedding_dim = TEST_DIMS;
    config.max_elements = capacity;
    config.hnsw_m = 4;
    config.max_upload_bytes = 1024;
    config
}

pub async fn harness_with_capacity(capacity: usize) -> TestHarness {
    let data_dir = tempfile::tempdir().unwrap();
    let object_dir = tempfile::tempdir().unwrap();

    let local = Arc::new(LocalStore::new(data_dir.path()).unwrap());
    let objects = Arc::new(MockObjectStorage::new(object_dir.path()).unwrap());
    let embedder = Arc::new(MockEmbedder::new(TEST_DIMS));

    let engine = Arc::new(
        SearchEngine::new(test_config(capacity), local, objects.clone(), embedder)
            .await
            .unwrap(),
    );

    TestHarness {
        data_dir,
        object_dir,
        objects,
        engine,
    }
}

pub async fn harness() -> TestHarness {
    harness_with_capacity(100).await
}

impl TestHarness {
    /// Upload an image whose bytes are the given text
    pub async fn upload(&self, project_id: &str, content: &str) -> ItemRecord {
        self.engine
            .upload(
                project_id,
                Some("photo.jpg"),
                "image/jpeg",
                Bytes::from(content.as_bytes().to_vec()),
            )
            .await
            .unwrap()
    }

    /// Count blobs in the mock object store (temp files excluded)
    pub fn blob_count(&self) -> usize {
        fn walk(dir: &Path) -> usize {
            let mut count = 0;
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        count += walk(&path);
                    } else {
                        count += 1;
                    }
                }
            }
            count
        }
        walk(self.object_dir.path())
    }
}
