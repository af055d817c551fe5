//! Centralized default values and constants
//!
//! Consolidates the magic numbers used throughout the codebase so they are
//! easy to find, modify, and document.

// ============================================================================
// Embedding
// ============================================================================

/// Default embedding dimensionality (CLIP ViT-L/14 image/text embeddings)
pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Number of concurrent inference calls allowed process-wide.
/// A single shared accelerator backs the embedder, so this stays at 1.
pub const INFERENCE_SLOTS: usize = 1;

// ============================================================================
// HNSW index parameters
// ============================================================================

/// Default number of bidirectional links per node (M parameter)
pub const DEFAULT_HNSW_M: usize = 16;

/// Default ef value during construction
pub const DEFAULT_HNSW_EF_CONSTRUCTION: usize = 200;

/// Default ef value during search
pub const DEFAULT_HNSW_EF_SEARCH: usize = 100;

/// Default per-project capacity (live vectors, tombstones excluded)
pub const DEFAULT_MAX_ELEMENTS: usize = 50_000;

// ============================================================================
// Uploads
// ============================================================================

/// Default maximum upload size in bytes (20 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Fallback file suffix when the original filename has none usable
pub const FALLBACK_SUFFIX: &str = ".bin";

/// Suffixes longer than this are treated as unusable
pub const MAX_SUFFIX_LEN: usize = 16;

// ============================================================================
// Remote keys
// ============================================================================

/// Default key prefix for uploaded image blobs
pub const DEFAULT_IMAGE_KEY_PREFIX: &str = "images/";

/// Default key for the snapshot artifact
pub const DEFAULT_SNAPSHOT_KEY: &str = "snapshots/iris.bin";

// ============================================================================
// Timers
// ============================================================================

/// Default snapshot backup interval in seconds
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 1800;

/// Default idle time before a project's in-memory index is unloaded
pub const DEFAULT_IDLE_UNLOAD_SECS: u64 = 900;

/// Default presigned GET URL lifetime in seconds
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 86_400;

// ============================================================================
// Server
// ============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port
pub const DEFAULT_PORT: u16 = 8000;

/// Default number of search results (k)
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

// ============================================================================
// Project ids
// ============================================================================

/// Maximum project-id length
pub const MAX_PROJECT_ID_LEN: usize = 128;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_valid() {
        assert!(DEFAULT_HNSW_M > 0);
        assert!(DEFAULT_HNSW_EF_CONSTRUCTION > DEFAULT_HNSW_M);
        assert!(DEFAULT_HNSW_EF_SEARCH > 0);

        assert!(DEFAULT_EMBEDDING_DIM > 0);
        assert!(DEFAULT_EMBEDDING_DIM <= 4096);
        assert_eq!(INFERENCE_SLOTS, 1);

        assert!(DEFAULT_MAX_ELEMENTS > 0);
        assert!(DEFAULT_SNAPSHOT_INTERVAL_SECS > 0);
        assert!(MAX_PROJECT_ID_LEN >= 1);
    }
}
