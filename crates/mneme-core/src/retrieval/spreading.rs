//! Spreading activation (`resonate`, spec.md §4.F step 6) and the
//! Hebbian edge-strengthening that can follow a successful recall
//! (step 7): a bounded BFS over edges with per-hop activation decay.

use std::collections::HashMap;

use crate::error::Result;
use crate::node::{EdgeType, NodeId};
use crate::storage::Storage;

pub const DEFAULT_MAX_HOPS: u32 = 3;
pub const DEFAULT_HOP_DECAY: f64 = 0.5;
pub const DEFAULT_SPREAD_STRENGTH: f64 = 1.0;
pub const DEFAULT_HEBBIAN_ETA: f32 = 0.03;

#[derive(Debug, Clone, Copy)]
pub struct SpreadConfig {
    pub max_hops: u32,
    pub hop_decay: f64,
    pub spread_strength: f64,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            hop_decay: DEFAULT_HOP_DECAY,
            spread_strength: DEFAULT_SPREAD_STRENGTH,
        }
    }
}

/// Starting from `seeds` (id, activation), spreads activation outward
/// through edges for up to `config.max_hops`, merging by max
/// activation across seed and spread candidates.
pub fn resonate(
    storage: &Storage,
    seeds: &[(NodeId, f64)],
    config: &SpreadConfig,
) -> Result<Vec<(NodeId, f64)>> {
    let mut activation: HashMap<NodeId, f64> = seeds.iter().cloned().collect();
    let mut frontier: Vec<(NodeId, f64)> = seeds.to_vec();

    for _hop in 0..config.max_hops {
        let mut next_frontier: Vec<(NodeId, f64)> = Vec::new();
        for (source_id, source_act) in &frontier {
            let Some(source_node) = storage.get(*source_id)? else {
                continue;
            };
            for edge in &source_node.edges {
                let incoming =
                    config.spread_strength * source_act * edge.weight as f64 * config.hop_decay;
                if incoming <= 0.0 {
                    continue;
                }
                let entry = activation.entry(edge.target).or_insert(0.0);
                if incoming > *entry {
                    *entry = incoming;
                }
                next_frontier.push((edge.target, incoming));
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    let mut ranked: Vec<(NodeId, f64)> = activation.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    Ok(ranked)
}

/// For every distinct pair in the top `k'` results, strengthens (or
/// creates) a `Similar` edge proportional to their joint activation.
pub fn hebbian_update(storage: &Storage, top: &[(NodeId, f64)], eta: f32) -> Result<()> {
    let k_prime = top.len().min(5);
    for i in 0..k_prime {
        for j in 0..k_prime {
            if i == j {
                continue;
            }
            let (a_id, a_act) = top[i];
            let (b_id, b_act) = top[j];
            let Some(mut node) = storage.get(a_id)? else {
                continue;
            };
            let delta = eta * (a_act * b_act) as f32;
            let existing = node
                .edges
                .iter()
                .find(|e| e.target == b_id && e.edge_type == EdgeType::Similar)
                .map(|e| e.weight)
                .unwrap_or(0.0);
            let new_weight = (existing + delta).clamp(0.0, 1.0);
            node.connect(b_id, EdgeType::Similar, new_weight);
            storage.update(node)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeType};

    fn seeded_storage() -> (Storage, NodeId, NodeId, NodeId) {
        let storage = Storage::open_in_memory(10).unwrap();
        let a = Node::new(NodeType::Episode, b"a".to_vec(), 0);
        let b = Node::new(NodeType::Episode, b"b".to_vec(), 0);
        let c = Node::new(NodeType::Episode, b"c".to_vec(), 0);
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        storage.insert(a).unwrap();
        storage.insert(b).unwrap();
        storage.insert(c).unwrap();

        let mut a_node = storage.get(a_id).unwrap().unwrap();
        a_node.connect(b_id, EdgeType::RelatesTo, 1.0);
        storage.update(a_node).unwrap();
        let mut b_node = storage.get(b_id).unwrap().unwrap();
        b_node.connect(c_id, EdgeType::RelatesTo, 1.0);
        storage.update(b_node).unwrap();

        (storage, a_id, b_id, c_id)
    }

    #[test]
    fn activation_decays_with_distance() {
        let (storage, a, b, c) = seeded_storage();
        let result = resonate(&storage, &[(a, 1.0)], &SpreadConfig::default()).unwrap();

        let act_b = result.iter().find(|(id, _)| *id == b).unwrap().1;
        let act_c = result.iter().find(|(id, _)| *id == c).unwrap().1;
        assert!(act_b > act_c);
    }

    #[test]
    fn hebbian_update_creates_similar_edge_between_top_results() {
        let (storage, a, b, _c) = seeded_storage();
        hebbian_update(&storage, &[(a, 1.0), (b, 0.8)], DEFAULT_HEBBIAN_ETA).unwrap();

        let a_node = storage.get(a).unwrap().unwrap();
        let edge = a_node
            .edges
            .iter()
            .find(|e| e.target == b && e.edge_type == EdgeType::Similar);
        assert!(edge.is_some());
        assert!(edge.unwrap().weight > 0.0);
    }
}
