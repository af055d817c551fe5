//! Storage layer
//!
//! Two concerns live here:
//! - [`LocalStore`]: the durable on-disk primary store for metadata and
//!   per-project vector files. Survives restarts on its own; the remote
//!   snapshot is disaster recovery, not the source of truth.
//! - [`ObjectStorage`]: an S3-compatible object store for uploaded image
//!   blobs and snapshot artifacts, with a mock filesystem implementation
//!   for local development and tests.

pub mod local;
pub mod mock;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

pub use local::LocalStore;
pub use mock::MockObjectStorage;
pub use s3::{S3ObjectStorage, S3Settings};

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Object storage (S3-like)
///
/// Whole-object put/get/delete plus presigned GET URLs. Keys are opaque
/// strings; callers compose them with the configured prefixes.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    /// Put an object, tagging it with a content type
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Get an object; `StorageError::NotFound` if the key is absent
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Delete an object (idempotent: absent keys are not an error)
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Generate a time-limited URL granting read access to the object.
    /// Callers redirect clients to it rather than proxying bytes.
    async fn presign_get(&self, key: &str, ttl: Duration) -> StorageResult<String>;
}
