//! Soul-aware re-ranking (spec.md §4.F step 3): bends raw similarity
//! toward nodes the engine trusts and has touched recently. Takes a
//! scored candidate list and returns a rescored one, the same shape
//! as any other rerank stage in the pipeline.

use crate::node::{Node, NodeType};

pub const DEFAULT_W_C: f64 = 0.5;
pub const DEFAULT_W_R: f64 = 0.3;
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 30.0;

#[derive(Debug, Clone, Copy)]
pub struct RerankConfig {
    pub w_c: f64,
    pub w_r: f64,
    pub half_life_days: f64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            w_c: DEFAULT_W_C,
            w_r: DEFAULT_W_R,
            half_life_days: DEFAULT_HALF_LIFE_DAYS,
        }
    }
}

fn type_factor(node_type: NodeType) -> f64 {
    match node_type {
        NodeType::Failure => 1.2,
        NodeType::Belief | NodeType::Invariant => 1.1,
        NodeType::Wisdom => 1.0,
        NodeType::Episode => 0.9,
        _ => 1.0,
    }
}

/// `score = s * conf_factor * recency_factor * type_factor`.
pub fn rerank_score(node: &Node, similarity: f64, now_ms: i64, config: &RerankConfig) -> f64 {
    let conf_factor = (1.0 - config.w_c) + config.w_c * node.kappa.effective();

    let days = node.days_since_accessed(now_ms);
    let recency_factor =
        1.0 + config.w_r * (-std::f64::consts::LN_2 * days / config.half_life_days).exp();

    similarity * conf_factor * recency_factor * type_factor(node.node_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Confidence;

    fn node_with(node_type: NodeType, conf: f64, tau_accessed: i64) -> Node {
        let mut n = Node::new(node_type, b"x".to_vec(), tau_accessed);
        n.kappa = Confidence::new(conf);
        n.tau_accessed = tau_accessed;
        n
    }

    #[test]
    fn high_confidence_node_scores_higher_than_low_confidence() {
        let config = RerankConfig::default();
        let trusted = node_with(NodeType::Episode, 0.95, 0);
        let shaky = node_with(NodeType::Episode, 0.05, 0);

        let trusted_score = rerank_score(&trusted, 0.8, 0, &config);
        let shaky_score = rerank_score(&shaky, 0.8, 0, &config);
        assert!(trusted_score > shaky_score);
    }

    #[test]
    fn recently_accessed_node_scores_higher_than_stale_one() {
        let config = RerankConfig::default();
        let fresh = node_with(NodeType::Episode, 0.5, 0);
        let stale = node_with(NodeType::Episode, 0.5, 0);

        let now_ms = 60 * 86_400_000;
        let fresh_score = rerank_score(&fresh, 0.8, 0, &config);
        let stale_score = rerank_score(&stale, 0.8, now_ms, &config);
        assert!(fresh_score > stale_score);
    }

    #[test]
    fn failure_nodes_are_boosted_over_episodes() {
        let config = RerankConfig::default();
        let failure = node_with(NodeType::Failure, 0.5, 0);
        let episode = node_with(NodeType::Episode, 0.5, 0);
        assert!(rerank_score(&failure, 0.8, 0, &config) > rerank_score(&episode, 0.8, 0, &config));
    }
}
