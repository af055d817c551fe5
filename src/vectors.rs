//! In-memory vector slab
//!
//! Vectors are stored outside the HNSW graph and referenced by slot (u32).
//! Slots are append-only; deletion tombstones a slot instead of reusing it,
//! so graph nodes keep routing through deleted entries while search and
//! capacity accounting treat them as absent.

use crate::error::{IrisError, Result};

/// Normalize a vector to unit length. The small epsilon keeps the zero
/// vector from producing NaNs.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt() + 1e-8;
    v.iter().map(|x| x / norm).collect()
}

/// Cosine similarity (dot product for normalized vectors)
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine distance (1 - dot product for normalized vectors)
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Append-only slab of fixed-dimension vectors with tombstones
pub struct VectorSlab {
    dims: usize,
    vectors: Vec<Vec<f32>>,
    deleted: Vec<bool>,
    live: usize,
}

impl VectorSlab {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            vectors: Vec::new(),
            deleted: Vec::new(),
            live: 0,
        }
    }

    /// Append a vector, returning its slot. The vector must already be
    /// normalized and of the slab's dimensionality.
    pub fn append(&mut self, vector: Vec<f32>) -> Result<u32> {
        if vector.len() != self.dims {
            return Err(IrisError::dimension_mismatch(self.dims, vector.len()));
        }

        let slot = self.vectors.len() as u32;
        self.vectors.push(vector);
        self.deleted.push(false);
        self.live += 1;
        Ok(slot)
    }

    /// Get the vector at a slot (tombstoned slots still resolve, since the
    /// graph uses them for routing)
    pub fn get(&self, slot: u32) -> Option<&[f32]> {
        self.vectors.get(slot as usize).map(|v| v.as_slice())
    }

    /// Mark a slot tombstoned. Returns false if it was already tombstoned.
    pub fn tombstone(&mut self, slot: u32) -> bool {
        let idx = slot as usize;
        if idx >= self.deleted.len() || self.deleted[idx] {
            return false;
        }
        self.deleted[idx] = true;
        self.live -= 1;
        true
    }

    /// Whether a slot holds a live (non-tombstoned) vector
    pub fn is_live(&self, slot: u32) -> bool {
        self.deleted
            .get(slot as usize)
            .map(|d| !d)
            .unwrap_or(false)
    }

    /// Number of live vectors (capacity accounting uses this)
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Total slots including tombstones
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(&[3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_normalize_zero_vector_is_finite() {
        let v = normalize(&[0.0, 0.0, 0.0]);
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);

        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_slab_append_and_tombstone() {
        let mut slab = VectorSlab::new(3);

        let s0 = slab.append(normalize(&[1.0, 0.0, 0.0])).unwrap();
        let s1 = slab.append(normalize(&[0.0, 1.0, 0.0])).unwrap();
        assert_eq!(slab.live_count(), 2);

        assert!(slab.tombstone(s0));
        assert!(!slab.tombstone(s0));
        assert_eq!(slab.live_count(), 1);
        assert!(!slab.is_live(s0));
        assert!(slab.is_live(s1));

        // Tombstoned slot still resolves for graph routing
        assert!(slab.get(s0).is_some());
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn test_slab_rejects_wrong_dimension() {
        let mut slab = VectorSlab::new(4);
        let err = slab.append(vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, IrisError::DimensionMismatch { expected: 4, actual: 2 }));
    }
}
