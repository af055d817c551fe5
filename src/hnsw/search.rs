//! HNSW search algorithms

use super::node::HnswNode;
use super::HnswGraph;
use crate::vectors::{cosine_distance, VectorSlab};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Candidate for search (min-heap by distance)
#[derive(Clone, Copy)]
pub struct Candidate {
    pub node_id: u32,
    pub distance: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        // Reverse for min-heap (smaller distance = higher priority)
        other
            .distance
            .partial_cmp(&self.distance)
            .or(Some(Ordering::Equal))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }
}

/// Max-heap candidate (larger distance = higher priority, for result pruning)
#[derive(Clone, Copy)]
struct MaxCandidate {
    node_id: u32,
    distance: f32,
}

impl PartialEq for MaxCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl Eq for MaxCandidate {}

impl PartialOrd for MaxCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.distance
            .partial_cmp(&other.distance)
            .or(Some(Ordering::Equal))
    }
}

impl Ord for MaxCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }
}

/// Search for k nearest live neighbors.
///
/// Tombstoned slots participate in graph traversal but are filtered from the
/// result set. Ties in similarity break toward the older slot so the output
/// ordering is reproducible.
pub fn search_knn(
    graph: &HnswGraph,
    query: &[f32],
    k: usize,
    ef: usize,
    slab: &VectorSlab,
) -> Vec<(u32, f32)> {
    let Some(entry) = graph.entry_point else {
        return Vec::new();
    };
    if graph.nodes.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut current = entry;

    // Phase 1: greedy descent from the top level down to level 1
    for level in (1..=graph.max_level).rev() {
        current = greedy_search_layer(&graph.nodes, query, current, level, slab);
    }

    // Phase 2: search layer 0 with ef candidates
    let candidates = search_layer(&graph.nodes, query, current, ef.max(k), 0, slab);

    // Collect live slots as (slot, similarity), tie-broken by slot order
    let mut results: Vec<(u32, f32)> = candidates
        .into_iter()
        .filter_map(|c| {
            let slot = graph.nodes[c.node_id as usize].slot;
            slab.is_live(slot).then_some((slot, 1.0 - c.distance))
        })
        .collect();

    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    results.truncate(k);
    results
}

/// Greedy search to find the single nearest node at a level
pub(super) fn greedy_search_layer(
    nodes: &[HnswNode],
    query: &[f32],
    entry: u32,
    level: usize,
    slab: &VectorSlab,
) -> u32 {
    let mut current = entry;
    let mut current_dist = distance_to_node(nodes, query, current, slab);

    loop {
        let node = &nodes[current as usize];
        if level >= node.neighbors.len() {
            break;
        }

        let mut changed = false;
        for &neighbor_id in &node.neighbors[level] {
            if neighbor_id as usize >= nodes.len() {
                continue;
            }
            let dist = distance_to_node(nodes, query, neighbor_id, slab);
            if dist < current_dist {
                current = neighbor_id;
                current_dist = dist;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    current
}

/// Search a layer keeping the ef best candidates
pub(super) fn search_layer(
    nodes: &[HnswNode],
    query: &[f32],
    entry: u32,
    ef: usize,
    level: usize,
    slab: &VectorSlab,
) -> Vec<Candidate> {
    let entry_dist = distance_to_node(nodes, query, entry, slab);

    let mut visited = HashSet::new();
    visited.insert(entry);

    // Min-heap of candidates to explore
    let mut candidates = BinaryHeap::new();
    candidates.push(Candidate {
        node_id: entry,
        distance: entry_dist,
    });

    // Max-heap of results (worst at the top for easy pruning)
    let mut results = BinaryHeap::new();
    results.push(MaxCandidate {
        node_id: entry,
        distance: entry_dist,
    });

    while let Some(current) = candidates.pop() {
        // Stop if current is farther than the worst kept result
        if results.len() >= ef {
            if let Some(worst) = results.peek() {
                if current.distance > worst.distance {
                    break;
                }
            }
        }

        let node = &nodes[current.node_id as usize];
        if level >= node.neighbors.len() {
            continue;
        }

        for &neighbor_id in &node.neighbors[level] {
            if visited.contains(&neighbor_id) {
                continue;
            }
            if neighbor_id as usize >= nodes.len() {
                continue;
            }
            visited.insert(neighbor_id);

            let dist = distance_to_node(nodes, query, neighbor_id, slab);

            let should_add = results.len() < ef
                || results
                    .peek()
                    .map(|worst| dist < worst.distance)
                    .unwrap_or(true);

            if should_add {
                candidates.push(Candidate {
                    node_id: neighbor_id,
                    distance: dist,
                });
                results.push(MaxCandidate {
                    node_id: neighbor_id,
                    distance: dist,
                });

                while results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    let mut result_vec: Vec<Candidate> = results
        .into_iter()
        .map(|mc| Candidate {
            node_id: mc.node_id,
            distance: mc.distance,
        })
        .collect();

    result_vec.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    result_vec
}

/// Compute distance from the query to a node's vector
#[inline]
pub(super) fn distance_to_node(
    nodes: &[HnswNode],
    query: &[f32],
    node_id: u32,
    slab: &VectorSlab,
) -> f32 {
    let node = &nodes[node_id as usize];
    match slab.get(node.slot) {
        Some(vector) => cosine_distance(query, vector),
        None => f32::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_ordering() {
        let mut heap = BinaryHeap::new();
        heap.push(Candidate {
            node_id: 0,
            distance: 0.5,
        });
        heap.push(Candidate {
            node_id: 1,
            distance: 0.2,
        });
        heap.push(Candidate {
            node_id: 2,
            distance: 0.8,
        });

        // Min-heap: smallest distance first
        assert_eq!(heap.pop().unwrap().node_id, 1);
        assert_eq!(heap.pop().unwrap().node_id, 0);
        assert_eq!(heap.pop().unwrap().node_id, 2);
    }
}
