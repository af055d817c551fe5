//! Configuration loaded from environment variables

use crate::defaults::*;
use crate::embedding::{Embedder, MockEmbedder, RemoteEmbedder};
use crate::storage::{MockObjectStorage, ObjectStorage, S3ObjectStorage, S3Settings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub embedder: EmbedderConfig,
    pub engine: EngineConfig,
    pub api: ApiConfig,
}

/// Object storage backend selection
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Local filesystem stand-in for development and tests
    Mock { object_root: PathBuf },
    /// S3-compatible object store (AWS S3, Cloudflare R2, MinIO, ...)
    S3(S3Settings),
}

/// Embedding backend selection
#[derive(Debug, Clone)]
pub enum EmbedderConfig {
    /// Deterministic hash-based embeddings, no model required
    Mock,
    /// External embedding server
    Remote { url: String },
}

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory of the durable local store
    pub data_dir: PathBuf,
    pub embedding_dim: usize,
    /// Per-project live-vector capacity
    pub max_elements: usize,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
    pub max_upload_bytes: u64,
    pub image_key_prefix: String,
    pub snapshot_key: String,
    pub snapshot_enabled: bool,
    pub snapshot_interval: Duration,
    pub idle_unload: Duration,
    pub presign_ttl: Duration,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Load config from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let storage_mode = std::env::var("STORAGE_MODE").unwrap_or_else(|_| "mock".to_string());

        let storage = match storage_mode.as_str() {
            "mock" => StorageConfig::Mock {
                object_root: std::env::var("MOCK_OBJECT_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/tmp/iris/objects")),
            },
            "s3" => StorageConfig::S3(S3Settings::from_env()?),
            _ => anyhow::bail!("Unknown storage mode: {}", storage_mode),
        };

        let embedder_mode = std::env::var("EMBEDDER_MODE").unwrap_or_else(|_| "mock".to_string());
        let embedder = match embedder_mode.as_str() {
            "mock" => EmbedderConfig::Mock,
            "remote" => EmbedderConfig::Remote {
                url: std::env::var("EMBEDDING_SERVER_URL")
                    .map_err(|_| anyhow::anyhow!("EMBEDDING_SERVER_URL is required for EMBEDDER_MODE=remote"))?,
            },
            _ => anyhow::bail!("Unknown embedder mode: {}", embedder_mode),
        };

        let engine = EngineConfig {
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/iris/data")),
            embedding_dim: std::env::var("EMBEDDING_DIM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_EMBEDDING_DIM),
            max_elements: std::env::var("MAX_ELEMENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_ELEMENTS),
            hnsw_m: std::env::var("HNSW_M")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_HNSW_M),
            hnsw_ef_construction: std::env::var("HNSW_EF_CONSTRUCTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_HNSW_EF_CONSTRUCTION),
            hnsw_ef_search: std::env::var("HNSW_EF_SEARCH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_HNSW_EF_SEARCH),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            image_key_prefix: std::env::var("IMAGE_KEY_PREFIX")
                .unwrap_or_else(|_| DEFAULT_IMAGE_KEY_PREFIX.to_string()),
            snapshot_key: std::env::var("SNAPSHOT_KEY")
                .unwrap_or_else(|_| DEFAULT_SNAPSHOT_KEY.to_string()),
            snapshot_enabled: std::env::var("SNAPSHOT_ENABLED")
                .map(|v| v != "false")
                .unwrap_or(true),
            snapshot_interval: Duration::from_secs(
                std::env::var("SNAPSHOT_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_SNAPSHOT_INTERVAL_SECS),
            ),
            idle_unload: Duration::from_secs(
                std::env::var("IDLE_UNLOAD_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_IDLE_UNLOAD_SECS),
            ),
            presign_ttl: Duration::from_secs(
                std::env::var("PRESIGN_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_PRESIGN_TTL_SECS),
            ),
        };

        let api = ApiConfig {
            host: std::env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        };

        Ok(Self {
            storage,
            embedder,
            engine,
            api,
        })
    }
}

impl StorageConfig {
    /// Create the configured object storage backend
    pub async fn create_backend(&self) -> anyhow::Result<Arc<dyn ObjectStorage>> {
        match self {
            StorageConfig::Mock { object_root } => {
                Ok(Arc::new(MockObjectStorage::new(object_root)?))
            }
            StorageConfig::S3(settings) => Ok(Arc::new(S3ObjectStorage::new(settings))),
        }
    }
}

impl EmbedderConfig {
    /// Create the configured embedding backend (ungated; the engine adds
    /// the inference gate)
    pub fn create_backend(&self, dims: usize) -> Arc<dyn Embedder> {
        match self {
            EmbedderConfig::Mock => Arc::new(MockEmbedder::new(dims)),
            EmbedderConfig::Remote { url } => Arc::new(RemoteEmbedder::new(url.clone(), dims)),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/tmp/iris/data"),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            max_elements: DEFAULT_MAX_ELEMENTS,
            hnsw_m: DEFAULT_HNSW_M,
            hnsw_ef_construction: DEFAULT_HNSW_EF_CONSTRUCTION,
            hnsw_ef_search: DEFAULT_HNSW_EF_SEARCH,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            image_key_prefix: DEFAULT_IMAGE_KEY_PREFIX.to_string(),
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            snapshot_enabled: true,
            snapshot_interval: Duration::from_secs(DEFAULT_SNAPSHOT_INTERVAL_SECS),
            idle_unload: Duration::from_secs(DEFAULT_IDLE_UNLOAD_SECS),
            presign_ttl: Duration::from_secs(DEFAULT_PRESIGN_TTL_SECS),
        }
    }
}

impl EngineConfig {
    pub fn hnsw_params(&self) -> crate::hnsw::HnswParams {
        crate::hnsw::HnswParams {
            m: self.hnsw_m,
            m_max0: self.hnsw_m * 2,
            ef_construction: self.hnsw_ef_construction,
            ef_search: self.hnsw_ef_search,
            ml: 1.0 / (self.hnsw_m as f64).ln(),
        }
    }
}
