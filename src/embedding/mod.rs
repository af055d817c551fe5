//! Embedding collaborator
//!
//! The embedding model itself is external; this module owns the contract
//! ([`Embedder`]), a deterministic mock for local development and tests, and
//! the process-wide single-slot inference gate that protects the shared
//! accelerator behind the real model: at most one embed call runs at a time
//! no matter how many requests are in flight.

pub mod remote;

use crate::defaults::INFERENCE_SLOTS;
use crate::error::{IrisError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub use remote::RemoteEmbedder;

/// Produces fixed-dimension embeddings from image bytes or query text
#[async_trait]
pub trait Embedder: Send + Sync + 'static {
    /// Embed raw image bytes
    async fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>>;

    /// Embed a free-text query
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// The dimensionality this embedder produces
    fn dims(&self) -> usize;
}

/// Wraps an embedder with a counting admission gate (capacity one).
///
/// This is deliberately separate from the per-project index locks: the gate
/// protects the accelerator, the locks protect index consistency.
pub struct GatedEmbedder {
    inner: Arc<dyn Embedder>,
    permits: Semaphore,
}

impl GatedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self {
            inner,
            permits: Semaphore::new(INFERENCE_SLOTS),
        }
    }
}

#[async_trait]
impl Embedder for GatedEmbedder {
    async fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| IrisError::embedding_failed("inference gate closed"))?;
        self.inner.embed_image(bytes).await
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| IrisError::embedding_failed("inference gate closed"))?;
        self.inner.embed_text(text).await
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }
}

/// Deterministic mock embedder for development and tests.
///
/// Hashes the input into a seeded pseudo-random unit vector: equal inputs
/// embed identically, different inputs are near-orthogonal in high
/// dimensions. No semantic meaning.
pub struct MockEmbedder {
    dims: usize,
}

impl MockEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn embed_seeded(&self, seed: u64) -> Vec<f32> {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let v: Vec<f32> = (0..self.dims).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect();
        crate::vectors::normalize(&v)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_image(&self, bytes: &[u8]) -> Result<Vec<f32>> {
        Ok(self.embed_seeded(fnv1a(bytes)))
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_seeded(fnv1a(text.as_bytes())))
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new(16);

        let a1 = embedder.embed_image(b"same bytes").await.unwrap();
        let a2 = embedder.embed_image(b"same bytes").await.unwrap();
        let b = embedder.embed_image(b"other bytes").await.unwrap();

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(a1.len(), 16);

        let norm: f32 = a1.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    /// Embedder that records how many calls overlap
    struct SlowEmbedder {
        in_flight: AtomicUsize,
        max_seen: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed_image(&self, _bytes: &[u8]) -> Result<Vec<f32>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![1.0, 0.0])
        }

        async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
            self.embed_image(text.as_bytes()).await
        }

        fn dims(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn test_gate_admits_one_call_at_a_time() {
        let slow = Arc::new(SlowEmbedder {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        });
        let gated = Arc::new(GatedEmbedder::new(slow.clone()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let gated = gated.clone();
            handles.push(tokio::spawn(async move {
                gated.embed_text(&format!("query {i}")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(slow.max_seen.load(Ordering::SeqCst), 1);
    }
}
