//! Unified error types for Iris
//!
//! This module provides a centralized error hierarchy that all components
//! can use, enabling consistent error handling across the codebase.

use crate::storage::StorageError;

/// Main error type for Iris operations
#[derive(Debug, thiserror::Error)]
pub enum IrisError {
    /// Malformed project id (fails the allow-pattern)
    #[error("Invalid project id: {0}")]
    InvalidProject(String),

    /// Project has never received an item (or all items were deleted)
    #[error("Project not found: {project_id}")]
    ProjectNotFound { project_id: String },

    /// Known project, unknown item
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: String },

    /// Malformed item id (not a UUID)
    #[error("Invalid item id: {0}")]
    InvalidItemId(String),

    /// Per-project index is at its configured maximum live element count
    #[error("Project {project_id} is at capacity ({capacity} items)")]
    CapacityExceeded { project_id: String, capacity: usize },

    /// Embedding collaborator failed; surfaced to the caller, not retried
    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),

    /// Embedder returned a vector of the wrong size. Internal invariant
    /// violation: fatal to the request, logged loudly at the call site.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Upload is not an image/* content type
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// Upload body was empty
    #[error("Uploaded file is empty")]
    EmptyUpload,

    /// Upload body exceeds the configured size bound
    #[error("Uploaded file is too large (limit {limit} bytes)")]
    UploadTooLarge { limit: u64 },

    /// Object store / local store I/O errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for Iris operations
pub type Result<T> = std::result::Result<T, IrisError>;

impl IrisError {
    /// Create an invalid-project error
    pub fn invalid_project(msg: impl Into<String>) -> Self {
        Self::InvalidProject(msg.into())
    }

    /// Create a project-not-found error
    pub fn project_not_found(project_id: impl Into<String>) -> Self {
        Self::ProjectNotFound {
            project_id: project_id.into(),
        }
    }

    /// Create an item-not-found error
    pub fn item_not_found(item_id: impl Into<String>) -> Self {
        Self::ItemNotFound {
            item_id: item_id.into(),
        }
    }

    /// Create an embedding-failed error
    pub fn embedding_failed(msg: impl Into<String>) -> Self {
        Self::EmbeddingFailed(msg.into())
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IrisError::dimension_mismatch(768, 384);
        assert_eq!(err.to_string(), "Dimension mismatch: expected 768, got 384");
    }

    #[test]
    fn test_error_constructors() {
        let err = IrisError::project_not_found("p1");
        assert!(matches!(err, IrisError::ProjectNotFound { .. }));

        let err = IrisError::embedding_failed("model unavailable");
        assert!(matches!(err, IrisError::EmbeddingFailed(_)));

        let err = IrisError::invalid_project("has spaces");
        assert!(matches!(err, IrisError::InvalidProject(_)));
    }
}
