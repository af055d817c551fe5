//! HNSW (Hierarchical Navigable Small World) graph
//!
//! Key properties:
//! - Vectors live in an external [`VectorSlab`], not in the graph
//! - Logical deletion: tombstoned slots stay in the graph for routing but
//!   never appear in search results
//! - The graph is rebuilt from live vectors when a project index is loaded,
//!   so it has no persistence of its own

pub mod insert;
pub mod node;
pub mod search;

use crate::vectors::VectorSlab;
use node::HnswNode;
use serde::{Deserialize, Serialize};

/// HNSW construction/search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswParams {
    /// Bidirectional links per node above level 0
    pub m: usize,
    /// Links per node at level 0 (typically 2*M)
    pub m_max0: usize,
    /// Candidate pool size during construction
    pub ef_construction: usize,
    /// Candidate pool size during search
    pub ef_search: usize,
    /// Level generation multiplier (1/ln(M))
    pub ml: f64,
}

impl HnswParams {
    pub fn with_m(m: usize) -> Self {
        Self {
            m,
            m_max0: m * 2,
            ef_construction: crate::defaults::DEFAULT_HNSW_EF_CONSTRUCTION,
            ef_search: crate::defaults::DEFAULT_HNSW_EF_SEARCH,
            ml: 1.0 / (m as f64).ln(),
        }
    }
}

impl Default for HnswParams {
    fn default() -> Self {
        Self::with_m(crate::defaults::DEFAULT_HNSW_M)
    }
}

/// HNSW graph over an external vector slab
///
/// Callers serialize access: the engine keeps one graph per project behind a
/// read-write lock, so the graph itself needs no interior mutability.
pub struct HnswGraph {
    pub(crate) params: HnswParams,
    pub(crate) nodes: Vec<HnswNode>,
    pub(crate) entry_point: Option<u32>,
    pub(crate) max_level: usize,
}

impl HnswGraph {
    /// Create a new empty graph
    pub fn new(params: HnswParams) -> Self {
        Self {
            params,
            nodes: Vec::new(),
            entry_point: None,
            max_level: 0,
        }
    }

    /// Insert the vector at `slot` into the graph
    pub fn insert(&mut self, slot: u32, slab: &VectorSlab) {
        insert::insert_node(self, slot, slab);
    }

    /// Search for the k nearest live slots, ordered by descending similarity.
    /// `ef` widens the candidate pool; pass at least k plus the tombstone
    /// count to guarantee k live results when they exist.
    pub fn search(&self, query: &[f32], k: usize, ef: usize, slab: &VectorSlab) -> Vec<(u32, f32)> {
        search::search_knn(self, query, k, ef.max(self.params.ef_search), slab)
    }

    /// Number of nodes in the graph (tombstones included)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectors::normalize;

    fn build_slab_and_graph(vectors: &[Vec<f32>]) -> (VectorSlab, HnswGraph) {
        let dims = vectors[0].len();
        let mut slab = VectorSlab::new(dims);
        let mut graph = HnswGraph::new(HnswParams::with_m(4));

        for v in vectors {
            let slot = slab.append(normalize(v)).unwrap();
            graph.insert(slot, &slab);
        }

        (slab, graph)
    }

    #[test]
    fn test_insert_and_search() {
        let vectors: Vec<Vec<f32>> = (0..10)
            .map(|i| vec![i as f32, (i * 2) as f32, (i * 3) as f32, (i * 4) as f32])
            .collect();
        let (slab, graph) = build_slab_and_graph(&vectors);

        assert_eq!(graph.len(), 10);

        let query = normalize(&[1.0, 2.0, 3.0, 4.0]);
        let results = graph.search(&query, 5, 50, &slab);

        assert!(!results.is_empty());
        assert!(results.len() <= 5);

        // Descending similarity
        for pair in results.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn test_search_excludes_tombstones() {
        let vectors: Vec<Vec<f32>> = (0..8)
            .map(|i| vec![(i + 1) as f32, 1.0, (8 - i) as f32])
            .collect();
        let (mut slab, graph) = build_slab_and_graph(&vectors);

        // Tombstone half the slots
        for slot in [0u32, 2, 4, 6] {
            slab.tombstone(slot);
        }

        let query = normalize(&[1.0, 1.0, 8.0]);
        let results = graph.search(&query, 8, 64, &slab);

        assert_eq!(results.len(), 4);
        for (slot, _) in &results {
            assert!(slab.is_live(*slot));
        }
    }

    #[test]
    fn test_exact_match_ranks_first() {
        let vectors = vec![
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0],
        ];
        let (slab, graph) = build_slab_and_graph(&vectors);

        let query = normalize(&[0.0, 0.0, 1.0, 0.0]);
        let results = graph.search(&query, 2, 16, &slab);

        assert_eq!(results[0].0, 2);
        assert!((results[0].1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_graph_returns_nothing() {
        let slab = VectorSlab::new(4);
        let graph = HnswGraph::new(HnswParams::with_m(4));
        assert!(graph.search(&[1.0, 0.0, 0.0, 0.0], 5, 16, &slab).is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_tie_break_by_insertion_order() {
        // Two identical vectors: the earlier slot must come first
        let vectors = vec![
            vec![1.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
        ];
        let (slab, graph) = build_slab_and_graph(&vectors);

        let query = normalize(&[1.0, 0.0]);
        let results = graph.search(&query, 3, 16, &slab);

        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 1);
    }
}
