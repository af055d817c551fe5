//! HNSW insert algorithm

use super::node::HnswNode;
use super::search::{greedy_search_layer, search_layer, Candidate};
use super::HnswGraph;
use crate::vectors::{cosine_distance, VectorSlab};
use rand::Rng;
use std::cmp::Ordering;

/// Insert the vector at `slot` into the graph
pub fn insert_node(graph: &mut HnswGraph, slot: u32, slab: &VectorSlab) {
    let level = random_level(graph.params.ml);
    let node = HnswNode::new(slot, level);

    let new_node_id = graph.nodes.len() as u32;

    // First node becomes the entry point
    if graph.nodes.is_empty() {
        graph.nodes.push(node);
        graph.entry_point = Some(0);
        graph.max_level = level;
        return;
    }

    let entry_point = graph.entry_point.unwrap_or(0);
    let current_max_level = graph.max_level;

    let query = slab.get(slot).map(|v| v.to_vec()).unwrap_or_default();

    // Greedy descent from the top level to just above the node's level
    let mut current = entry_point;
    for l in (level + 1..=current_max_level).rev() {
        current = greedy_search_layer(&graph.nodes, &query, current, l, slab);
    }

    // Add the node before connecting it
    graph.nodes.push(node);

    let m = graph.params.m;
    let m_max0 = graph.params.m_max0;
    let ef_construction = graph.params.ef_construction;

    // Connect at each level from the node's level down to 0
    for l in (0..=level.min(current_max_level)).rev() {
        let candidates = search_layer(&graph.nodes, &query, current, ef_construction, l, slab);

        let max_neighbors = if l == 0 { m_max0 } else { m };
        let selected = select_neighbors(&candidates, max_neighbors);

        graph.nodes[new_node_id as usize].set_neighbors(l, selected.clone());

        // Bidirectional edges, pruning neighbors that overflow
        for &neighbor_id in &selected {
            if neighbor_id as usize >= graph.nodes.len() {
                continue;
            }

            graph.nodes[neighbor_id as usize].add_neighbor(l, new_node_id);

            let max_n = if l == 0 { m_max0 } else { m };
            if graph.nodes[neighbor_id as usize].neighbors.len() > l
                && graph.nodes[neighbor_id as usize].neighbors[l].len() > max_n
            {
                prune_neighbors(graph, neighbor_id, l, max_n, slab);
            }
        }

        if let Some(closest) = candidates.first() {
            current = closest.node_id;
        }
    }

    if level > current_max_level {
        graph.entry_point = Some(new_node_id);
        graph.max_level = level;
    }
}

/// Keep only the max_n closest neighbors of a node at a level
fn prune_neighbors(graph: &mut HnswGraph, node_id: u32, level: usize, max_n: usize, slab: &VectorSlab) {
    let node_slot = graph.nodes[node_id as usize].slot;
    let Some(node_vec) = slab.get(node_slot).map(|v| v.to_vec()) else {
        return;
    };
    let current_neighbors: Vec<u32> = graph.nodes[node_id as usize].neighbors[level].clone();

    let mut scored: Vec<(u32, f32)> = current_neighbors
        .into_iter()
        .filter_map(|n_id| {
            let n_slot = graph.nodes.get(n_id as usize)?.slot;
            let n_vec = slab.get(n_slot)?;
            Some((n_id, cosine_distance(&node_vec, n_vec)))
        })
        .collect();

    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let pruned: Vec<u32> = scored.into_iter().take(max_n).map(|(id, _)| id).collect();
    graph.nodes[node_id as usize].neighbors[level] = pruned;
}

/// Generate a random level using an exponential distribution
fn random_level(ml: f64) -> usize {
    let mut rng = rand::thread_rng();
    let r: f64 = rng.gen();
    (-r.ln() * ml).floor() as usize
}

/// Take the closest max_count candidates (already sorted by distance).
/// A diversity heuristic hurts recall on high-dimensional CLIP embeddings
/// where vectors are roughly orthogonal.
fn select_neighbors(candidates: &[Candidate], max_count: usize) -> Vec<u32> {
    let mut result = Vec::with_capacity(max_count);
    for candidate in candidates {
        if result.len() >= max_count {
            break;
        }
        if !result.contains(&candidate.node_id) {
            result.push(candidate.node_id);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_level_distribution() {
        let ml = 1.0 / (16.0_f64).ln();
        let mut level_counts = [0usize; 10];

        for _ in 0..10000 {
            let level = random_level(ml);
            if level < 10 {
                level_counts[level] += 1;
            }
        }

        // Most nodes land at level 0
        assert!(level_counts[0] > level_counts[1]);
        assert!(level_counts[1] > level_counts[2]);
    }
}
