//! The knowledge graph proper: the union of hot/warm/cold nodes, plus
//! the coherence and vitality metrics computed over it (spec.md §4.E).
//!
//! Adjacency lives on [`crate::node::Node`] itself; this module only
//! adds graph-wide operations — connecting, decaying, pruning, and
//! summarising the whole graph's health.

use std::collections::HashSet;

use crate::error::Result;
use crate::node::{EdgeType, Node, NodeId, NodeType};
use crate::storage::Storage;
use crate::vector::Vector;

/// `tau_k = 0.3*local + 0.3*global + 0.2*temporal + 0.2*structural`
/// (spec.md §4.E).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coherence {
    pub local: f64,
    pub global: f64,
    pub temporal: f64,
    pub structural: f64,
}

impl Coherence {
    pub fn tau_k(&self) -> f64 {
        0.3 * self.local + 0.3 * self.global + 0.2 * self.temporal + 0.2 * self.structural
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VitalityStatus {
    Critical,
    Weak,
    Healthy,
    Vibrant,
}

impl VitalityStatus {
    fn from_score(score: f64) -> Self {
        if score < 0.25 {
            VitalityStatus::Critical
        } else if score < 0.5 {
            VitalityStatus::Weak
        } else if score < 0.8 {
            VitalityStatus::Healthy
        } else {
            VitalityStatus::Vibrant
        }
    }
}

/// `Ojas`: the graph's overall vitality (spec.md §4.E).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ojas {
    pub structural: f64,
    pub semantic: f64,
    pub temporal: f64,
    pub capacity: f64,
    pub status: VitalityStatus,
}

/// A thin operations layer over [`Storage`]. Holds no state of its
/// own — every call reads or writes through the shared storage.
pub struct Graph<'a> {
    storage: &'a Storage,
}

impl<'a> Graph<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Appends an edge, coalescing duplicate `(target, type)` pairs by
    /// keeping the max weight (spec.md §4.B).
    pub fn connect(&self, from: NodeId, to: NodeId, edge_type: EdgeType, weight: f32) -> Result<()> {
        let Some(mut node) = self.storage.get(from)? else {
            return Err(crate::error::MnemeError::not_found(from));
        };
        node.connect(to, edge_type, weight);
        self.storage.update(node)
    }

    /// Applies confidence decay to every hot node (spec.md §4.E).
    pub fn apply_decay(&self, now_ms: i64) -> Result<usize> {
        let mut ids = Vec::new();
        self.storage.for_each_hot(|n| ids.push(n.id));

        let mut decayed = 0;
        for id in ids {
            if let Some(mut node) = self.storage.get(id)? {
                let days = node.days_since_accessed(now_ms);
                node.kappa.apply_decay(node.delta, days);
                self.storage.update(node)?;
                decayed += 1;
            }
        }
        Ok(decayed)
    }

    /// Removes nodes with effective confidence below `threshold`
    /// unless their type is prune-ineligible (spec.md invariant 3).
    /// Scans the whole graph, not just hot.
    pub fn prune(&self, threshold: f64) -> Result<usize> {
        let mut removed = 0;
        for node in self.storage.all_nodes()? {
            if node.node_type.prune_eligible() && node.kappa.effective() < threshold {
                self.storage.remove(node.id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Drops edges pointing at ids no longer present in storage
    /// (supplemented feature: lazy dangling-edge GC, opportunistically
    /// invoked from `Mind::tick`).
    pub fn collect_dangling(&self) -> Result<usize> {
        let nodes = self.storage.all_nodes()?;
        let live: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
        let mut collected = 0;
        for mut node in nodes {
            let before = node.edges.len();
            node.edges.retain(|e| live.contains(&e.target));
            let removed = before - node.edges.len();
            if removed > 0 {
                collected += removed;
                self.storage.update(node)?;
            }
        }
        Ok(collected)
    }

    fn coherence_weight_for(node_type: NodeType) -> f64 {
        node_type.coherence_weight()
    }

    /// spec.md §4.E: local / global / temporal / structural coherence.
    pub fn compute_coherence(&self, now_ms: i64) -> Result<Coherence> {
        let nodes = self.storage.all_nodes()?;
        if nodes.is_empty() {
            return Ok(Coherence {
                local: 1.0,
                global: 1.0,
                temporal: 1.0,
                structural: 1.0,
            });
        }

        let local = Self::local_coherence(&nodes);
        let global = Self::global_coherence(&nodes);
        let temporal = Self::temporal_coherence(&nodes, now_ms);
        let structural = Self::structural_coherence(&nodes);

        Ok(Coherence {
            local,
            global,
            temporal,
            structural,
        })
    }

    fn local_coherence(nodes: &[Node]) -> f64 {
        let total_edges: usize = nodes.iter().map(|n| n.edges.len()).sum();
        if total_edges == 0 {
            return 1.0;
        }
        let contradict_edges = nodes
            .iter()
            .flat_map(|n| n.edges.iter())
            .filter(|e| e.edge_type == EdgeType::Contradicts)
            .count();
        let contradiction_ratio = contradict_edges as f64 / total_edges as f64;

        let belief_like: Vec<&Node> = nodes
            .iter()
            .filter(|n| matches!(n.node_type, NodeType::Belief | NodeType::Wisdom))
            .filter(|n| n.nu.is_some())
            .collect();

        let mut sampled = 0usize;
        let mut tense = 0usize;
        'outer: for i in 0..belief_like.len() {
            for j in (i + 1)..belief_like.len() {
                if sampled >= 100 {
                    break 'outer;
                }
                sampled += 1;
                let a = belief_like[i];
                let b = belief_like[j];
                let cos = Vector::cosine(a.nu.as_ref().unwrap(), b.nu.as_ref().unwrap());
                if cos > 0.7 {
                    let linked = a.edges.iter().any(|e| {
                        e.target == b.id
                            && matches!(e.edge_type, EdgeType::Supports | EdgeType::Similar)
                    });
                    if !linked {
                        tense += 1;
                    }
                }
            }
        }
        let tension_ratio = if sampled > 0 {
            tense as f64 / sampled as f64
        } else {
            0.0
        };

        (1.0 - contradiction_ratio - 0.3 * tension_ratio).clamp(0.0, 1.0)
    }

    fn global_coherence(nodes: &[Node]) -> f64 {
        let weighted: Vec<(f64, f64)> = nodes
            .iter()
            .map(|n| (Self::coherence_weight_for(n.node_type), n.kappa.effective()))
            .collect();
        let total_weight: f64 = weighted.iter().map(|(w, _)| w).sum();
        if total_weight <= 0.0 {
            return 1.0;
        }
        let mean: f64 = weighted.iter().map(|(w, c)| w * c).sum::<f64>() / total_weight;

        let important: Vec<f64> = weighted
            .iter()
            .filter(|(w, _)| *w >= 1.0)
            .map(|(_, c)| *c)
            .collect();
        let variance = if important.len() > 1 {
            let m = important.iter().sum::<f64>() / important.len() as f64;
            important.iter().map(|c| (c - m).powi(2)).sum::<f64>() / important.len() as f64
        } else {
            0.0
        };

        (mean - 0.5 * variance.sqrt()).clamp(0.0, 1.0)
    }

    fn temporal_coherence(nodes: &[Node], now_ms: i64) -> f64 {
        let n = nodes.len() as f64;
        let full_active = nodes
            .iter()
            .filter(|node| node.days_since_accessed(now_ms) <= 7.0)
            .count() as f64;
        let half_active = nodes
            .iter()
            .filter(|node| {
                let d = node.days_since_accessed(now_ms);
                d > 7.0 && d <= 30.0
            })
            .count() as f64;
        let activity_ratio = ((full_active + 0.5 * half_active) / n).min(1.0);

        let mature: Vec<&Node> = nodes
            .iter()
            .filter(|node| {
                matches!(node.node_type, NodeType::Wisdom | NodeType::Belief)
                    && node.age_days(now_ms) > 7.0
            })
            .collect();
        let maturity_ratio = if mature.is_empty() {
            0.5
        } else {
            mature.iter().map(|n| n.kappa.effective()).sum::<f64>() / mature.len() as f64
        };

        (0.3 + 0.4 * activity_ratio + 0.3 * maturity_ratio).clamp(0.0, 1.0)
    }

    fn structural_coherence(nodes: &[Node]) -> f64 {
        let n = nodes.len();
        let total_edges: usize = nodes.iter().map(|node| node.edges.len()).sum();
        let in_degree_targets: HashSet<NodeId> = nodes
            .iter()
            .flat_map(|node| node.edges.iter().map(|e| e.target))
            .collect();
        let orphan_count = nodes
            .iter()
            .filter(|node| node.edges.is_empty() && !in_degree_targets.contains(&node.id))
            .count();
        let orphan_ratio = if n > 0 {
            orphan_count as f64 / n as f64
        } else {
            0.0
        };

        let log2_n = if n > 1 { (n as f64).log2() } else { 1.0 };
        let edge_density = if n > 1 {
            (total_edges as f64 / (n as f64 * log2_n)).min(1.0)
        } else {
            0.0
        };

        (1.0 - 0.5 * orphan_ratio) * (0.5 + 0.5 * edge_density)
    }

    /// spec.md §4.E `compute_vitality`.
    pub fn compute_vitality(&self, now_ms: i64) -> Result<Ojas> {
        let nodes = self.storage.all_nodes()?;
        if nodes.is_empty() {
            return Ok(Ojas {
                structural: 0.0,
                semantic: 0.0,
                temporal: 0.0,
                capacity: 1.0,
                status: VitalityStatus::Critical,
            });
        }

        let structural = Self::structural_coherence(&nodes);
        let semantic: f64 =
            nodes.iter().map(|n| n.kappa.effective()).sum::<f64>() / nodes.len() as f64;
        let temporal = Self::temporal_coherence(&nodes, now_ms);
        let capacity = (1.0 - nodes.len() as f64 / 100_000.0).clamp(0.0, 1.0);

        let score = (structural + semantic + temporal + capacity) / 4.0;
        Ok(Ojas {
            structural,
            semantic,
            temporal,
            capacity,
            status: VitalityStatus::from_score(score),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;

    fn node_with(storage: &Storage, node_type: NodeType, conf: f64, now_ms: i64) -> NodeId {
        let mut n = Node::new(node_type, b"x".to_vec(), now_ms);
        n.kappa = crate::node::Confidence::new(conf);
        let id = n.id;
        storage.insert(n).unwrap();
        id
    }

    #[test]
    fn empty_graph_has_neutral_coherence() {
        let storage = Storage::open_in_memory(10).unwrap();
        let graph = Graph::new(&storage);
        let c = graph.compute_coherence(0).unwrap();
        assert!((c.tau_k() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn prune_respects_invariant_and_belief_exemption() {
        let storage = Storage::open_in_memory(10).unwrap();
        let graph = Graph::new(&storage);
        let weak_belief = node_with(&storage, NodeType::Belief, 0.01, 0);
        let weak_episode = node_with(&storage, NodeType::Episode, 0.01, 0);

        let removed = graph.prune(0.05).unwrap();
        assert_eq!(removed, 1);
        assert!(storage.get(weak_belief).unwrap().is_some());
        assert!(storage.get(weak_episode).unwrap().is_none());
    }

    #[test]
    fn collect_dangling_removes_edges_to_missing_nodes() {
        let storage = Storage::open_in_memory(10).unwrap();
        let graph = Graph::new(&storage);
        let a = node_with(&storage, NodeType::Episode, 0.5, 0);
        let ghost = NodeId::new();
        let mut node_a = storage.get(a).unwrap().unwrap();
        node_a.connect(ghost, EdgeType::RelatesTo, 0.5);
        storage.update(node_a).unwrap();

        let collected = graph.collect_dangling().unwrap();
        assert_eq!(collected, 1);
        assert!(storage.get(a).unwrap().unwrap().edges.is_empty());
    }

    #[test]
    fn apply_decay_reduces_effective_confidence_over_time() {
        let storage = Storage::open_in_memory(10).unwrap();
        let graph = Graph::new(&storage);
        let id = node_with(&storage, NodeType::Episode, 0.9, 0);
        {
            let mut n = storage.get(id).unwrap().unwrap();
            n.tau_accessed = 0;
            storage.update(n).unwrap();
        }
        let before = storage.get(id).unwrap().unwrap().kappa.effective();
        graph.apply_decay(30 * 86_400_000).unwrap();
        let after = storage.get(id).unwrap().unwrap().kappa.effective();
        assert!(after < before);
    }
}
