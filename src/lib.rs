//! # Iris Semantic Image Search
//!
//! A project-scoped semantic image search service: images are embedded into
//! a shared vector space, indexed per project, and retrieved with free-text
//! queries.
//!
//! ## Architecture
//!
//! ```text
//! HTTP API (Axum)
//!     │
//!     ▼
//! SearchEngine (project lifecycle, upload/search/delete)
//!     ├── ProjectIndex (per-project, isolated)
//!     │     ├── VectorSlab (tombstone-aware vector storage)
//!     │     └── HnswGraph (approximate nearest neighbor)
//!     ├── MetadataStore (durable item records, local primary)
//!     ├── ObjectStorage (S3-compatible blob store, mockable)
//!     ├── GatedEmbedder (single-slot inference gate)
//!     └── SnapshotManager (periodic disaster-recovery backups)
//! ```
//!
//! Projects are implicit: the first successful upload creates one and
//! deleting the last item removes it. The local store is the primary copy;
//! the snapshot artifact in object storage is disaster recovery only.
//!
//! ## Quick Start
//!
//! ```ignore
//! use iris::{Config, SearchEngine};
//!
//! let config = Config::from_env()?;
//! let engine = SearchEngine::new(config.engine, local, objects, embedder).await?;
//! let record = engine.upload("my-project", Some("cat.jpg"), "image/jpeg", bytes).await?;
//! let hits = engine.search("my-project", "a cat on a sofa", 10).await?;
//! ```

pub mod api;
pub mod config;
pub mod defaults;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod hnsw;
pub mod metadata;
pub mod project;
pub mod snapshot;
pub mod storage;
pub mod vectors;

pub use config::Config;
pub use defaults::*;
pub use engine::SearchEngine;
pub use error::{IrisError, Result};
pub use snapshot::SnapshotManager;
