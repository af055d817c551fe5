//! Mock object storage for local development and tests
//!
//! Stores objects as files under a root directory with full API
//! compatibility with the S3 implementation, including presigned URLs
//! (returned as `mock://` URLs embedding the key and expiry).

use super::{ObjectStorage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Filesystem-backed mock of an S3-compatible object store
pub struct MockObjectStorage {
    root: PathBuf,
    /// Content types recorded at put time (S3 would store these as metadata)
    content_types: RwLock<HashMap<String, String>>,
}

impl MockObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            content_types: RwLock::new(HashMap::new()),
        })
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Content type recorded for a key, if any
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.content_types.read().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        tokio::task::yield_now().await;

        let full_path = self.full_path(key);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&full_path, &data)?;
        self.content_types
            .write()
            .insert(key.to_string(), content_type.to_string());

        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        tokio::task::yield_now().await;

        let full_path = self.full_path(key);
        if !full_path.exists() {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }

        Ok(Bytes::from(fs::read(&full_path)?))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        tokio::task::yield_now().await;
        Ok(self.full_path(key).exists())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let full_path = self.full_path(key);
        if full_path.exists() {
            fs::remove_file(&full_path)?;
        }
        self.content_types.write().remove(key);
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        if !self.full_path(key).exists() {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(format!("mock://{}?expires_in={}", key, ttl.as_secs()))
    }
}
