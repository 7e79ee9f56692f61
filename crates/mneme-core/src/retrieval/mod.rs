//! Retrieval pipeline (spec.md §4.F): candidate generation, RRF
//! fusion, soul-aware re-ranking, session priming, and lateral
//! inhibition composed into the one function the [`crate::mind::Mind`]
//! façade calls for `recall`. Spreading activation and the Hebbian
//! update that can follow it live in [`spreading`] and are composed
//! separately by `resonate`/`full_resonate`, since those are distinct
//! façade operations, not stages every `recall` runs.

pub mod fusion;
pub mod inhibition;
pub mod rerank;
pub mod session;
pub mod spreading;

use std::collections::HashMap;

use crate::config::Config;
use crate::error::Result;
use crate::node::{Edge, Node, NodeId, NodeType};
use crate::storage::Storage;
use crate::vector::Vector;
use session::SessionContext;

/// Which candidate-generation lanes `recall` consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecallMode {
    Dense,
    Sparse,
    Hybrid,
}

/// Output projection (spec.md §4.F: "pure output shaping").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoomLevel {
    Title,
    #[default]
    Truncated,
    Full,
}

/// Exact-match filters applied before scoring.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub node_types: Option<Vec<NodeType>>,
    pub tags: Option<Vec<String>>,
}

impl Filters {
    fn matches(&self, node: &Node) -> bool {
        if let Some(types) = &self.node_types {
            if !types.contains(&node.node_type) {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.iter().all(|t| node.has_tag(t)) {
                return false;
            }
        }
        true
    }
}

/// Per-call toggles for the individually-togglable pipeline stages
/// (spec.md §4.F: "every stage is individually togglable by request").
#[derive(Debug, Clone)]
pub struct RecallFlags {
    pub mode: RecallMode,
    pub zoom: ZoomLevel,
    pub prime: bool,
    pub inhibit: bool,
    pub filters: Filters,
}

impl Default for RecallFlags {
    fn default() -> Self {
        Self {
            mode: RecallMode::Hybrid,
            zoom: ZoomLevel::default(),
            prime: true,
            inhibit: true,
            filters: Filters::default(),
        }
    }
}

/// One scored, zoom-projected recall result.
#[derive(Debug, Clone)]
pub struct RecallHit {
    pub id: NodeId,
    pub relevance: f64,
    pub node_type: NodeType,
    pub title: String,
    pub text: Option<String>,
    pub edges: Option<Vec<Edge>>,
    pub tau_created: Option<i64>,
    pub tau_accessed: Option<i64>,
}

fn project(node: &Node, zoom: ZoomLevel, relevance: f64) -> RecallHit {
    let full_text = node.text();
    let title: String = full_text.chars().take(60).collect();
    match zoom {
        ZoomLevel::Title => RecallHit {
            id: node.id,
            relevance,
            node_type: node.node_type,
            title,
            text: None,
            edges: None,
            tau_created: None,
            tau_accessed: None,
        },
        ZoomLevel::Truncated => {
            let truncated: String = full_text.chars().take(280).collect();
            RecallHit {
                id: node.id,
                relevance,
                node_type: node.node_type,
                title,
                text: Some(truncated),
                edges: None,
                tau_created: None,
                tau_accessed: None,
            }
        }
        ZoomLevel::Full => RecallHit {
            id: node.id,
            relevance,
            node_type: node.node_type,
            title,
            text: Some(full_text),
            edges: Some(node.edges.clone()),
            tau_created: Some(node.tau_created),
            tau_accessed: Some(node.tau_accessed),
        },
    }
}

/// spec.md §4.F steps 1–5: candidate generation, fusion, soul-aware
/// re-rank, session priming, lateral inhibition. Returns at most `k`
/// hits with `relevance > threshold`, sorted descending.
#[allow(clippy::too_many_arguments)]
pub fn recall(
    storage: &Storage,
    session: &SessionContext,
    config: &Config,
    query_vec: Option<&Vector>,
    query_text: Option<&str>,
    k: usize,
    threshold: f64,
    flags: &RecallFlags,
    now_ms: i64,
) -> Result<Vec<RecallHit>> {
    let limit = (k.max(1)) * 4;

    let dense: Vec<(NodeId, f32)> =
        if matches!(flags.mode, RecallMode::Dense | RecallMode::Hybrid) {
            match query_vec {
                Some(v) => storage.search_dense(v, limit)?,
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

    let sparse: Vec<(NodeId, f64)> =
        if matches!(flags.mode, RecallMode::Sparse | RecallMode::Hybrid) {
            match query_text {
                Some(t) if !t.trim().is_empty() => storage.search_sparse(t, limit),
                _ => Vec::new(),
            }
        } else {
            Vec::new()
        };

    let base_scores: Vec<(NodeId, f64)> = match flags.mode {
        RecallMode::Hybrid => {
            fusion::reciprocal_rank_fusion(&dense, &sparse, config.k_rrf, config.w_dense, limit)
        }
        RecallMode::Dense => dense.iter().map(|&(id, s)| (id, s as f64)).collect(),
        RecallMode::Sparse => sparse.clone(),
    };

    let rerank_config = config.rerank_config();
    let mut nodes: HashMap<NodeId, Node> = HashMap::with_capacity(base_scores.len());
    let mut scored: Vec<(NodeId, f64)> = Vec::with_capacity(base_scores.len());
    for (id, base_score) in base_scores {
        let Some(node) = storage.get(id)? else {
            continue; // dangling fused candidate; skip rather than panic
        };
        if !flags.filters.matches(&node) {
            continue;
        }
        let mut score = rerank::rerank_score(&node, base_score, now_ms, &rerank_config);
        if flags.prime {
            score = session::prime(score, node.nu.as_ref(), node.id, session, config.priming_alpha);
        }
        scored.push((id, score));
        nodes.insert(id, node);
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let ranked: Vec<(NodeId, f64)> = if flags.inhibit {
        let candidates: Vec<(NodeId, f64, Option<Vector>)> = scored
            .iter()
            .map(|(id, s)| (*id, *s, nodes.get(id).and_then(|n| n.nu.clone())))
            .collect();
        inhibition::apply_lateral_inhibition(candidates, &config.inhibition_config())
    } else {
        scored
    };

    let mut hits = Vec::with_capacity(k);
    for (id, score) in ranked {
        if score <= threshold {
            continue;
        }
        let Some(node) = nodes.get(&id) else {
            continue;
        };
        hits.push(project(node, flags.zoom, score));
        if hits.len() >= k {
            break;
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Confidence, Node, NodeType};

    fn indexed_node(storage: &Storage, text: &str, vec: Vector, conf: f64, now_ms: i64) -> NodeId {
        let mut n = Node::new(NodeType::Wisdom, text.as_bytes().to_vec(), now_ms);
        n.nu = Some(vec.fit_to_dim(4));
        n.kappa = Confidence::new(conf);
        n.tau_accessed = now_ms;
        let id = n.id;
        storage.insert(n).unwrap();
        id
    }

    #[test]
    fn empty_store_returns_no_hits() {
        let storage = Storage::open_in_memory(10).unwrap();
        let session = SessionContext::default();
        let config = Config::default();
        let query = Vector(vec![1.0, 0.0, 0.0, 0.0]);
        let hits = recall(
            &storage,
            &session,
            &config,
            Some(&query),
            Some("anything"),
            5,
            0.0,
            &RecallFlags::default(),
            0,
        )
        .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn hybrid_recall_ranks_relevant_wisdom_above_unrelated() {
        let storage = Storage::open_in_memory(10).unwrap();
        let w1 = indexed_node(
            &storage,
            "prefer explicit ownership",
            Vector(vec![1.0, 0.0, 0.0, 0.0]),
            0.8,
            0,
        );
        let w2 = indexed_node(
            &storage,
            "RAII prevents leaks",
            Vector(vec![0.9, 0.1, 0.0, 0.0]),
            0.8,
            0,
        );
        let _w3 = indexed_node(
            &storage,
            "pineapples float",
            Vector(vec![0.0, 0.0, 0.0, 1.0]),
            0.8,
            0,
        );

        let session = SessionContext::default();
        let config = Config::default();
        let query = Vector(vec![1.0, 0.0, 0.0, 0.0]);
        let hits = recall(
            &storage,
            &session,
            &config,
            Some(&query),
            Some("memory management ownership"),
            2,
            0.0,
            &RecallFlags::default(),
            0,
        )
        .unwrap();

        assert_eq!(hits.len(), 2);
        let ids: Vec<NodeId> = hits.iter().map(|h| h.id).collect();
        assert!(ids.contains(&w1));
        assert!(ids.contains(&w2));
    }

    #[test]
    fn dense_only_reduces_to_cosine_order_with_neutral_rerank_weights() {
        let storage = Storage::open_in_memory(10).unwrap();
        let close = indexed_node(&storage, "x", Vector(vec![1.0, 0.0, 0.0, 0.0]), 0.5, 0);
        let far = indexed_node(&storage, "y", Vector(vec![0.0, 1.0, 0.0, 0.0]), 0.5, 0);

        let session = SessionContext::default();
        let mut config = Config::default();
        config.w_c = 0.0;
        config.w_r = 0.0;

        let query = Vector(vec![1.0, 0.0, 0.0, 0.0]);
        let flags = RecallFlags {
            mode: RecallMode::Dense,
            prime: false,
            inhibit: false,
            ..RecallFlags::default()
        };
        let hits = recall(&storage, &session, &config, Some(&query), None, 2, 0.0, &flags, 0).unwrap();
        assert_eq!(hits[0].id, close);
        assert_eq!(hits[1].id, far);
    }
}
