//! The typed knowledge graph's fundamental unit: [`Node`], its
//! [`Confidence`] model, and its [`Edge`]s (spec.md §3, §4.B).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::vector::Vector;

/// 128-bit opaque node identifier, rendered as hex with dashes (a UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Closed variant over the kinds of knowledge the engine stores.
/// Drives decay rate, retrieval weight, and prune eligibility — see
/// [`NodeType::default_decay`], [`NodeType::retrieval_weight`],
/// [`NodeType::prune_eligible`]. Centralised here rather than spread
/// across polymorphic types (spec.md §9 design note).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Wisdom,
    Belief,
    Invariant,
    Identity,
    Intention,
    Aspiration,
    Dream,
    Episode,
    Operation,
    Term,
    Failure,
    Voice,
    Meta,
    Gap,
    Question,
    StoryThread,
    Ledger,
    Entity,
}

impl NodeType {
    pub const ALL: &'static [NodeType] = &[
        NodeType::Wisdom,
        NodeType::Belief,
        NodeType::Invariant,
        NodeType::Identity,
        NodeType::Intention,
        NodeType::Aspiration,
        NodeType::Dream,
        NodeType::Episode,
        NodeType::Operation,
        NodeType::Term,
        NodeType::Failure,
        NodeType::Voice,
        NodeType::Meta,
        NodeType::Gap,
        NodeType::Question,
        NodeType::StoryThread,
        NodeType::Ledger,
        NodeType::Entity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Wisdom => "wisdom",
            NodeType::Belief => "belief",
            NodeType::Invariant => "invariant",
            NodeType::Identity => "identity",
            NodeType::Intention => "intention",
            NodeType::Aspiration => "aspiration",
            NodeType::Dream => "dream",
            NodeType::Episode => "episode",
            NodeType::Operation => "operation",
            NodeType::Term => "term",
            NodeType::Failure => "failure",
            NodeType::Voice => "voice",
            NodeType::Meta => "meta",
            NodeType::Gap => "gap",
            NodeType::Question => "question",
            NodeType::StoryThread => "story_thread",
            NodeType::Ledger => "ledger",
            NodeType::Entity => "entity",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        Self::ALL.iter().find(|t| t.as_str() == s).copied()
    }

    /// Per-category default decay rate per day, `delta` in spec.md §3
    /// (0.02 - 0.15). Invariants and identity are nearly immortal;
    /// episodes and gaps fade fast.
    pub fn default_decay(&self) -> f64 {
        match self {
            NodeType::Invariant | NodeType::Identity => 0.02,
            NodeType::Belief | NodeType::Wisdom => 0.03,
            NodeType::Voice | NodeType::Meta => 0.04,
            NodeType::StoryThread | NodeType::Ledger => 0.05,
            NodeType::Intention | NodeType::Aspiration => 0.06,
            NodeType::Term | NodeType::Operation => 0.07,
            NodeType::Question => 0.08,
            NodeType::Failure => 0.05,
            NodeType::Entity => 0.06,
            NodeType::Dream => 0.1,
            NodeType::Gap => 0.12,
            NodeType::Episode => 0.15,
        }
    }

    /// Importance weight used by `compute_coherence`'s `global` term
    /// (spec.md §4.E). Types not listed there default to 0.3.
    pub fn coherence_weight(&self) -> f64 {
        match self {
            NodeType::Invariant => 2.0,
            NodeType::Belief => 1.5,
            NodeType::Wisdom => 1.2,
            NodeType::Failure => 1.0,
            NodeType::Intention => 0.8,
            NodeType::Episode => 0.5,
            NodeType::Term => 0.3,
            _ => 0.3,
        }
    }

    /// Soul-aware re-rank type factor (spec.md §4.F step 3).
    pub fn retrieval_type_factor(&self) -> f64 {
        match self {
            NodeType::Failure => 1.2,
            NodeType::Belief | NodeType::Invariant => 1.1,
            NodeType::Wisdom => 1.0,
            NodeType::Episode => 0.9,
            _ => 1.0,
        }
    }

    /// Invariant and Belief nodes are never pruned by confidence alone
    /// (spec.md invariant 3).
    pub fn prune_eligible(&self) -> bool {
        !matches!(self, NodeType::Invariant | NodeType::Belief)
    }
}

/// Directed, typed relationship between two nodes.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Similar,
    Supports,
    Contradicts,
    RelatesTo,
    PartOf,
    IsA,
    Mentions,
    AppliedIn,
    EvolvedFrom,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Similar => "similar",
            EdgeType::Supports => "supports",
            EdgeType::Contradicts => "contradicts",
            EdgeType::RelatesTo => "relates_to",
            EdgeType::PartOf => "part_of",
            EdgeType::IsA => "is_a",
            EdgeType::Mentions => "mentions",
            EdgeType::AppliedIn => "applied_in",
            EdgeType::EvolvedFrom => "evolved_from",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        [
            EdgeType::Similar,
            EdgeType::Supports,
            EdgeType::Contradicts,
            EdgeType::RelatesTo,
            EdgeType::PartOf,
            EdgeType::IsA,
            EdgeType::Mentions,
            EdgeType::AppliedIn,
            EdgeType::EvolvedFrom,
        ]
        .into_iter()
        .find(|t| t.as_str() == s)
    }
}

/// An outbound edge. Weight is clamped to `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub target: NodeId,
    pub edge_type: EdgeType,
    pub weight: f32,
}

impl Edge {
    pub fn new(target: NodeId, edge_type: EdgeType, weight: f32) -> Self {
        Self {
            target,
            edge_type,
            weight: weight.clamp(0.0, 1.0),
        }
    }
}

/// Bayesian confidence: `(mu, sigma2, n)` with an effective value of
/// `mu * (1 - sigma2)` (spec.md §3, §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub mu: f64,
    pub sigma2: f64,
    pub n: u64,
}

impl Confidence {
    pub fn new(mu: f64) -> Self {
        Self {
            mu: mu.clamp(0.0, 1.0),
            sigma2: 0.0,
            n: 0,
        }
    }

    /// Effective confidence used throughout retrieval/pruning.
    pub fn effective(&self) -> f64 {
        (self.mu * (1.0 - self.sigma2)).clamp(0.0, 1.0)
    }

    /// Running-mean observation update (spec.md §4.B):
    /// `mu' = mu + (x - mu)/(n+1)`, `sigma2' = sigma2 * n/(n+1)`.
    pub fn observe(&mut self, x: f64) {
        let x = x.clamp(0.0, 1.0);
        let n1 = self.n as f64 + 1.0;
        self.mu += (x - self.mu) / n1;
        self.sigma2 *= self.n as f64 / n1;
        self.n += 1;
        self.mu = self.mu.clamp(0.0, 1.0);
    }

    /// Exponential decay of `mu` by time-since-access, at `delta` per
    /// day (spec.md §4.B). Monotone non-increasing when called with no
    /// intervening observation (spec.md invariant 2).
    pub fn apply_decay(&mut self, delta: f64, days_since_accessed: f64) {
        if days_since_accessed <= 0.0 {
            return;
        }
        self.mu *= (-delta * days_since_accessed).exp();
        self.mu = self.mu.clamp(0.0, 1.0);
    }
}

/// A knowledge node: typed entity, embedding, confidence, timestamps,
/// tags and outbound edges (spec.md §3).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    /// `nu`: embedding. `None` until the embedder produces one or the
    /// caller supplies a vector directly.
    pub nu: Option<Vector>,
    /// `kappa`: Bayesian confidence.
    pub kappa: Confidence,
    /// Per-day decay rate, defaulted from `node_type` at creation.
    pub delta: f64,
    pub tau_created: i64,
    pub tau_accessed: i64,
    pub payload: Vec<u8>,
    pub tags: Vec<String>,
    pub edges: Vec<Edge>,
}

impl Node {
    pub fn new(node_type: NodeType, payload: Vec<u8>, now_ms: i64) -> Self {
        Self {
            id: NodeId::new(),
            node_type,
            nu: None,
            kappa: Confidence::new(0.5),
            delta: node_type.default_decay(),
            tau_created: now_ms,
            tau_accessed: now_ms,
            payload,
            tags: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.tau_accessed = now_ms;
    }

    pub fn age_days(&self, now_ms: i64) -> f64 {
        ((now_ms - self.tau_created).max(0) as f64) / 86_400_000.0
    }

    pub fn days_since_accessed(&self, now_ms: i64) -> f64 {
        ((now_ms - self.tau_accessed).max(0) as f64) / 86_400_000.0
    }

    /// Append an edge, coalescing a duplicate `(target, type)` pair by
    /// keeping the larger weight (spec.md §4.B).
    pub fn connect(&mut self, target: NodeId, edge_type: EdgeType, weight: f32) {
        if let Some(existing) = self
            .edges
            .iter_mut()
            .find(|e| e.target == target && e.edge_type == edge_type)
        {
            existing.weight = existing.weight.max(weight.clamp(0.0, 1.0));
        } else {
            self.edges.push(Edge::new(target, edge_type, weight));
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn add_tag(&mut self, tag: String) {
        if !self.has_tag(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_roundtrip() {
        for t in NodeType::ALL {
            assert_eq!(NodeType::parse_name(t.as_str()), Some(*t));
        }
    }

    #[test]
    fn edge_type_roundtrip() {
        for s in [
            "similar", "supports", "contradicts", "relates_to", "part_of", "is_a", "mentions",
            "applied_in", "evolved_from",
        ] {
            let t = EdgeType::parse_name(s).unwrap();
            assert_eq!(t.as_str(), s);
        }
    }

    #[test]
    fn confidence_observe_running_mean() {
        let mut c = Confidence::new(0.5);
        c.observe(1.0);
        assert!(c.mu > 0.5);
        assert_eq!(c.n, 1);
    }

    #[test]
    fn confidence_decay_is_monotone_non_increasing() {
        let mut c = Confidence::new(0.8);
        let e0 = c.effective();
        c.apply_decay(0.05, 1.0);
        let e1 = c.effective();
        c.apply_decay(0.05, 1.0);
        let e2 = c.effective();
        assert!(e1 <= e0);
        assert!(e2 <= e1);
    }

    #[test]
    fn edge_coalesces_duplicate_keeping_max_weight() {
        let mut n = Node::new(NodeType::Wisdom, b"x".to_vec(), 0);
        let target = NodeId::new();
        n.connect(target, EdgeType::Similar, 0.3);
        n.connect(target, EdgeType::Similar, 0.7);
        n.connect(target, EdgeType::Similar, 0.1);
        assert_eq!(n.edges.len(), 1);
        assert!((n.edges[0].weight - 0.7).abs() < 1e-6);
    }

    #[test]
    fn invariant_and_belief_not_prune_eligible() {
        assert!(!NodeType::Invariant.prune_eligible());
        assert!(!NodeType::Belief.prune_eligible());
        assert!(NodeType::Episode.prune_eligible());
    }
}
