//! Autonomous dynamics (spec.md §4.G): decay, pruning, triggers,
//! feedback application, forgetting, confidence propagation, and
//! wisdom synthesis, run as an ordered sequence of ordered stages
//! inside one `tick`.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::Config;
use crate::error::Result;
use crate::graph::{Coherence, Graph};
use crate::node::{Confidence, EdgeType, Node, NodeId, NodeType};
use crate::storage::Storage;
use crate::vector::Vector;

/// A single queued feedback event (spec.md §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Used,
    Helpful,
    Misleading,
    Confirmed,
    Challenged,
}

impl FeedbackKind {
    fn delta(self, deltas: &crate::config::FeedbackDeltas) -> f64 {
        match self {
            FeedbackKind::Used => deltas.used,
            FeedbackKind::Helpful => deltas.helpful,
            FeedbackKind::Misleading => deltas.misleading,
            FeedbackKind::Confirmed => deltas.confirmed,
            FeedbackKind::Challenged => deltas.challenged,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackEvent {
    pub node_id: NodeId,
    pub kind: FeedbackKind,
    pub magnitude: f64,
    pub timestamp: i64,
    pub context: Option<String>,
}

/// Bounded FIFO of feedback events awaiting `apply_feedback` (spec.md
/// §4.H). Overflow drops the oldest event rather than growing
/// unbounded — the façade's single mutex makes the queue a simple
/// `VecDeque`, no separate message-passing channel needed.
pub struct FeedbackQueue {
    capacity: usize,
    events: VecDeque<FeedbackEvent>,
}

impl FeedbackQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: VecDeque::new(),
        }
    }

    pub fn push(&mut self, event: FeedbackEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn drain(&mut self) -> Vec<FeedbackEvent> {
        self.events.drain(..).collect()
    }
}

impl Default for FeedbackQueue {
    fn default() -> Self {
        Self::new(1_000)
    }
}

/// Applies every queued feedback event, aggregated per node, as one
/// `Confidence::observe` call each (spec.md §4.H). Helpful/misleading
/// events additionally leave a low-confidence audit `Episode`.
pub fn apply_feedback(
    storage: &Storage,
    queue: &mut FeedbackQueue,
    config: &Config,
    now_ms: i64,
) -> Result<usize> {
    let events = queue.drain();
    if events.is_empty() {
        return Ok(0);
    }

    let mut aggregated: HashMap<NodeId, f64> = HashMap::new();
    for event in &events {
        *aggregated.entry(event.node_id).or_insert(0.0) +=
            event.kind.delta(&config.feedback) * event.magnitude;
    }

    let mut applied = 0;
    for (node_id, delta) in aggregated {
        let Some(mut node) = storage.get(node_id)? else {
            continue;
        };
        let target = (node.kappa.mu + delta).clamp(0.0, 1.0);
        node.kappa.observe(target);
        storage.update(node)?;
        applied += 1;
    }

    for event in &events {
        if matches!(event.kind, FeedbackKind::Helpful | FeedbackKind::Misleading) {
            let verdict = if event.kind == FeedbackKind::Helpful {
                "helpful"
            } else {
                "misleading"
            };
            let text = format!(
                "feedback audit: node {} marked {verdict}{}",
                event.node_id,
                event
                    .context
                    .as_ref()
                    .map(|c| format!(" ({c})"))
                    .unwrap_or_default()
            );
            let mut audit = Node::new(NodeType::Episode, text.into_bytes(), now_ms);
            audit.kappa = Confidence::new(0.2);
            audit.add_tag("audit:feedback".into());
            storage.insert(audit)?;
        }
    }

    Ok(applied)
}

/// spec.md §4.G `forget`: remove a node; optionally weaken its
/// neighbours (cascade) and rewire in-neighbours to out-neighbours
/// (Hebbian-style reconnection). Always leaves an audit `Episode`.
pub fn forget(
    storage: &Storage,
    id: NodeId,
    cascade: bool,
    rewire: bool,
    cascade_strength: f32,
    now_ms: i64,
) -> Result<bool> {
    let Some(target) = storage.get(id)? else {
        return Ok(false);
    };

    if cascade || rewire {
        let all = storage.all_nodes()?;
        let in_neighbors: Vec<NodeId> = all
            .iter()
            .filter(|n| n.edges.iter().any(|e| e.target == id))
            .map(|n| n.id)
            .collect();
        let out_neighbors: Vec<NodeId> = target.edges.iter().map(|e| e.target).collect();

        if cascade {
            for neighbor_id in in_neighbors.iter().chain(out_neighbors.iter()) {
                if let Some(mut neighbor) = storage.get(*neighbor_id)? {
                    for edge in &mut neighbor.edges {
                        if edge.target == id {
                            edge.weight = (edge.weight - cascade_strength).max(0.0);
                        }
                    }
                    neighbor.kappa.mu = (neighbor.kappa.mu - cascade_strength as f64).max(0.0);
                    storage.update(neighbor)?;
                }
            }
        }

        if rewire {
            for in_id in &in_neighbors {
                for out_id in &out_neighbors {
                    if in_id == out_id {
                        continue;
                    }
                    if let Some(mut in_node) = storage.get(*in_id)? {
                        in_node.connect(*out_id, EdgeType::RelatesTo, 0.1);
                        storage.update(in_node)?;
                    }
                }
            }
        }
    }

    storage.remove(id)?;

    let mut audit = Node::new(
        NodeType::Episode,
        format!("forgot node {id} (cascade={cascade}, rewire={rewire})").into_bytes(),
        now_ms,
    );
    audit.kappa = Confidence::new(0.2);
    audit.add_tag("audit:forget".into());
    storage.insert(audit)?;

    Ok(true)
}

/// spec.md §4.G `propagate_confidence`: BFS up to `depth` hops,
/// applying `delta' = delta * decay^hop * edge_weight` via `observe`.
pub fn propagate_confidence(
    storage: &Storage,
    id: NodeId,
    delta: f64,
    decay: f64,
    depth: u32,
) -> Result<usize> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    visited.insert(id);
    let mut frontier: Vec<(NodeId, f64)> = vec![(id, delta)];
    let mut touched = 0usize;

    for _hop in 0..depth {
        let mut next: Vec<(NodeId, f64)> = Vec::new();
        for (node_id, incoming_delta) in &frontier {
            let Some(node) = storage.get(*node_id)? else {
                continue;
            };
            for edge in &node.edges {
                if visited.contains(&edge.target) {
                    continue;
                }
                // `incoming_delta` already carries every decay/weight
                // factor accumulated along the path so far; apply one
                // more decay factor and this edge's weight per hop,
                // not `decay^hop` from scratch (that would compound).
                let hop_delta = incoming_delta * decay * edge.weight as f64;
                if hop_delta.abs() < 1e-9 {
                    continue;
                }
                if let Some(mut target_node) = storage.get(edge.target)? {
                    let new_value = (target_node.kappa.mu + hop_delta).clamp(0.0, 1.0);
                    target_node.kappa.observe(new_value);
                    storage.update(target_node)?;
                    touched += 1;
                }
                visited.insert(edge.target);
                next.push((edge.target, hop_delta));
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    Ok(touched)
}

/// A condition `tick` evaluates, and the response it triggers (spec.md
/// §4.G "a trigger is `(name, condition, ops)`"). Modeled as a closed
/// enum of the built-in triggers rather than boxed closures, since
/// spec.md names exactly two and no extension mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    EmergencyCoherence,
    PruneDead,
}

impl TriggerKind {
    pub const ALL: &'static [TriggerKind] =
        &[TriggerKind::EmergencyCoherence, TriggerKind::PruneDead];

    pub fn name(self) -> &'static str {
        match self {
            TriggerKind::EmergencyCoherence => "emergency_coherence",
            TriggerKind::PruneDead => "prune_dead",
        }
    }

    fn condition(self, coherence: &Coherence) -> bool {
        match self {
            TriggerKind::EmergencyCoherence => coherence.tau_k() < 0.3,
            TriggerKind::PruneDead => true,
        }
    }
}

/// Report of what one `tick()` actually did, for introspection/logging.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub decayed: Option<usize>,
    pub coherence: Option<Coherence>,
    pub triggers_fired: Vec<&'static str>,
    pub pruned: usize,
    pub dangling_collected: usize,
    pub feedback_applied: usize,
    pub synthesized_wisdom: Option<NodeId>,
}

/// Owns the timers `tick()` consults. A single scheduled task drives
/// `tick`, so ordering between decay/coherence/triggers/feedback stays
/// deterministic within one call (spec.md §9 design note).
pub struct DynamicsClock {
    pub last_decay_ms: i64,
    pub last_coherence_ms: i64,
    pub last_checkpoint_ms: i64,
    pub cached_coherence: Coherence,
}

impl DynamicsClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            last_decay_ms: now_ms,
            last_coherence_ms: now_ms,
            last_checkpoint_ms: now_ms,
            cached_coherence: Coherence {
                local: 1.0,
                global: 1.0,
                temporal: 1.0,
                structural: 1.0,
            },
        }
    }
}

/// spec.md §4.G `tick()`: decay (if due), coherence recompute (if
/// due), built-in trigger evaluation, feedback application, and
/// opportunistic dangling-edge GC.
#[allow(clippy::too_many_arguments)]
pub fn tick(
    storage: &Storage,
    clock: &mut DynamicsClock,
    feedback_queue: &mut FeedbackQueue,
    config: &Config,
    now_ms: i64,
) -> Result<TickReport> {
    let graph = Graph::new(storage);
    let mut report = TickReport::default();

    if now_ms - clock.last_decay_ms > config.ticks.decay_interval_ms {
        report.decayed = Some(graph.apply_decay(now_ms)?);
        clock.last_decay_ms = now_ms;
    }

    if now_ms - clock.last_coherence_ms > config.ticks.coherence_interval_ms {
        clock.cached_coherence = graph.compute_coherence(now_ms)?;
        clock.last_coherence_ms = now_ms;
    }
    report.coherence = Some(clock.cached_coherence);

    for trigger in TriggerKind::ALL {
        if trigger.condition(&clock.cached_coherence) {
            report.triggers_fired.push(trigger.name());
            match trigger {
                TriggerKind::EmergencyCoherence => {
                    storage.sync()?;
                    report.pruned += graph.prune(0.2)?;
                    clock.cached_coherence = graph.compute_coherence(now_ms)?;
                }
                TriggerKind::PruneDead => {
                    report.pruned += graph.prune(0.05)?;
                }
            }
        }
    }

    report.dangling_collected = graph.collect_dangling()?;
    report.feedback_applied = apply_feedback(storage, feedback_queue, config, now_ms)?;

    Ok(report)
}

/// spec.md §4.G `synthesize_wisdom`: if at least 3 Episodes accessed in
/// the last 24h are pairwise cosine-similar (>= 0.8), and no Wisdom
/// node already covers them, synthesize one whose text concatenates
/// their payload prefixes and whose embedding is their centroid.
pub fn synthesize_wisdom(storage: &Storage, now_ms: i64) -> Result<Option<NodeId>> {
    const CLUSTER_MIN: usize = 3;
    const SIMILARITY: f32 = 0.8;
    const WINDOW_MS: i64 = 24 * 3_600_000;
    const PREFIX_LEN: usize = 80;

    let episodes: Vec<Node> = storage
        .nodes_by_type(NodeType::Episode)?
        .into_iter()
        .filter(|n| now_ms - n.tau_accessed <= WINDOW_MS && n.nu.is_some())
        .collect();

    if episodes.len() < CLUSTER_MIN {
        return Ok(None);
    }

    // Greedy: seed from each episode, grow the largest clique-ish
    // cluster of mutually-similar episodes.
    let mut best_cluster: Vec<&Node> = Vec::new();
    for seed in &episodes {
        let seed_vec = seed.nu.as_ref().unwrap();
        let cluster: Vec<&Node> = episodes
            .iter()
            .filter(|n| Vector::cosine(seed_vec, n.nu.as_ref().unwrap()) >= SIMILARITY)
            .collect();
        if cluster.len() > best_cluster.len() {
            best_cluster = cluster;
        }
    }

    if best_cluster.len() < CLUSTER_MIN {
        return Ok(None);
    }

    let vectors: Vec<&Vector> = best_cluster.iter().map(|n| n.nu.as_ref().unwrap()).collect();
    let Some(centroid) = Vector::centroid(&vectors) else {
        return Ok(None);
    };

    let text = best_cluster
        .iter()
        .map(|n| {
            let t = n.text();
            t.chars().take(PREFIX_LEN).collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" / ");

    let mut wisdom = Node::new(NodeType::Wisdom, text.into_bytes(), now_ms);
    wisdom.nu = Some(centroid);
    wisdom.kappa = Confidence::new(0.5);
    wisdom.add_tag("synthesized".into());
    let id = wisdom.id;
    storage.insert(wisdom)?;
    Ok(Some(id))
}

/// A node acting as a gravity well in embedding space (spec.md §4.F
/// "Attractors"): effective confidence >= 0.7, degree >= 5, age >= 7
/// days. Ranked by `conf * log(1+degree) * min(1, age_days/30)`.
#[derive(Debug, Clone)]
pub struct Attractor {
    pub id: NodeId,
    pub score: f64,
    pub degree: usize,
    pub basin: Vec<NodeId>,
}

const ATTRACTOR_MIN_CONFIDENCE: f64 = 0.7;
const ATTRACTOR_MIN_DEGREE: usize = 5;
const ATTRACTOR_MIN_AGE_DAYS: f64 = 7.0;
const BASIN_COSINE_THRESHOLD: f32 = 0.6;
const BASIN_MAX_HOPS: u32 = 2;

fn degree_of(id: NodeId, nodes: &[Node]) -> usize {
    let out_degree = nodes
        .iter()
        .find(|n| n.id == id)
        .map(|n| n.edges.len())
        .unwrap_or(0);
    let in_degree = nodes
        .iter()
        .flat_map(|n| n.edges.iter())
        .filter(|e| e.target == id)
        .count();
    out_degree + in_degree
}

/// Nodes within cosine `BASIN_COSINE_THRESHOLD` of the attractor, or
/// reachable from it within `BASIN_MAX_HOPS` edge hops (spec.md §4.F:
/// "Its basin is all nodes within cosine 0.6 or reachable in 2 hops").
fn basin_of(attractor: &Node, nodes: &[Node]) -> Vec<NodeId> {
    let mut basin: HashSet<NodeId> = HashSet::new();

    if let Some(nu) = &attractor.nu {
        for n in nodes {
            if n.id == attractor.id {
                continue;
            }
            if let Some(other) = &n.nu {
                if Vector::cosine(nu, other) >= BASIN_COSINE_THRESHOLD {
                    basin.insert(n.id);
                }
            }
        }
    }

    let by_id: HashMap<NodeId, &Node> = nodes.iter().map(|n| (n.id, n)).collect();
    let mut frontier = vec![attractor.id];
    let mut visited: HashSet<NodeId> = HashSet::from([attractor.id]);
    for _ in 0..BASIN_MAX_HOPS {
        let mut next = Vec::new();
        for id in &frontier {
            let Some(node) = by_id.get(id) else { continue };
            for edge in &node.edges {
                if visited.insert(edge.target) {
                    basin.insert(edge.target);
                    next.push(edge.target);
                }
            }
            for other in nodes {
                if other.edges.iter().any(|e| e.target == *id) && visited.insert(other.id) {
                    basin.insert(other.id);
                    next.push(other.id);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    basin.into_iter().collect()
}

/// spec.md §4.F `attractors`/`cycle(attractors=true)`: every node
/// meeting the attractor predicate, with its basin, ranked by
/// `conf * log(1 + degree) * min(1, age_days/30)`.
pub fn find_attractors(storage: &Storage, now_ms: i64) -> Result<Vec<Attractor>> {
    let nodes = storage.all_nodes()?;
    let mut out = Vec::new();

    for node in &nodes {
        let age_days = node.age_days(now_ms);
        let conf = node.kappa.effective();
        if conf < ATTRACTOR_MIN_CONFIDENCE || age_days < ATTRACTOR_MIN_AGE_DAYS {
            continue;
        }
        let degree = degree_of(node.id, &nodes);
        if degree < ATTRACTOR_MIN_DEGREE {
            continue;
        }
        let score = conf * (1.0 + degree as f64).ln() * (age_days / 30.0).min(1.0);
        out.push(Attractor {
            id: node.id,
            score,
            degree,
            basin: basin_of(node, &nodes),
        });
    }

    out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(out)
}

/// spec.md §4.F "Settling applies `strengthen(n, settle_strength *
/// cos(n, attractor))` to each basin member."
pub fn settle_toward_attractors(
    storage: &Storage,
    attractors: &[Attractor],
    settle_strength: f64,
) -> Result<usize> {
    let mut settled = 0;
    for attractor in attractors {
        let Some(center) = storage.get(attractor.id)? else {
            continue;
        };
        let Some(center_vec) = center.nu.clone() else {
            continue;
        };
        for member_id in &attractor.basin {
            let Some(mut member) = storage.get(*member_id)? else {
                continue;
            };
            let Some(member_vec) = &member.nu else { continue };
            let cos = Vector::cosine(&center_vec, member_vec) as f64;
            if cos <= 0.0 {
                continue;
            }
            let target = (member.kappa.mu + settle_strength * cos).clamp(0.0, 1.0);
            member.kappa.observe(target);
            storage.update(member)?;
            settled += 1;
        }
    }
    Ok(settled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Confidence;

    fn belief_node(text: &str, now_ms: i64) -> Node {
        Node::new(NodeType::Belief, text.as_bytes().to_vec(), now_ms)
    }

    #[test]
    fn apply_feedback_helpful_raises_confidence() {
        let storage = Storage::open_in_memory(10).unwrap();
        let mut node = belief_node("W1", 0);
        node.kappa = Confidence::new(0.5);
        let id = node.id;
        storage.insert(node).unwrap();

        let config = Config::default();
        let mut queue = FeedbackQueue::new(100);
        for _ in 0..5 {
            queue.push(FeedbackEvent {
                node_id: id,
                kind: FeedbackKind::Helpful,
                magnitude: 1.0,
                timestamp: 0,
                context: None,
            });
        }
        let before = storage.get(id).unwrap().unwrap().kappa.effective();
        apply_feedback(&storage, &mut queue, &config, 0).unwrap();
        let after = storage.get(id).unwrap().unwrap().kappa.effective();
        assert!(after > before);
    }

    #[test]
    fn apply_feedback_misleading_lowers_confidence() {
        let storage = Storage::open_in_memory(10).unwrap();
        let mut node = belief_node("W1", 0);
        node.kappa = Confidence::new(0.8);
        let id = node.id;
        storage.insert(node).unwrap();

        let config = Config::default();
        let mut queue = FeedbackQueue::new(100);
        for _ in 0..7 {
            queue.push(FeedbackEvent {
                node_id: id,
                kind: FeedbackKind::Misleading,
                magnitude: 1.0,
                timestamp: 0,
                context: None,
            });
        }
        let before = storage.get(id).unwrap().unwrap().kappa.effective();
        apply_feedback(&storage, &mut queue, &config, 0).unwrap();
        let after = storage.get(id).unwrap().unwrap().kappa.effective();
        assert!(after < before);
    }

    #[test]
    fn forget_cascades_weaken_neighbor_confidence() {
        let storage = Storage::open_in_memory(10).unwrap();
        let a = Node::new(NodeType::Episode, b"a".to_vec(), 0);
        let mut b = Node::new(NodeType::Episode, b"b".to_vec(), 0);
        let a_id = a.id;
        b.kappa = Confidence::new(0.8);
        let b_id = b.id;
        a.connect(b_id, EdgeType::RelatesTo, 0.9);
        storage.insert(a).unwrap();
        storage.insert(b).unwrap();

        forget(&storage, a_id, true, false, 0.2, 0).unwrap();
        let b_after = storage.get(b_id).unwrap().unwrap();
        assert!(b_after.kappa.mu < 0.8);
        assert!(storage.get(a_id).unwrap().is_none());
    }

    #[test]
    fn propagate_confidence_reaches_two_hop_neighbor() {
        let storage = Storage::open_in_memory(10).unwrap();
        let mut a = Node::new(NodeType::Episode, b"a".to_vec(), 0);
        let mut b = Node::new(NodeType::Episode, b"b".to_vec(), 0);
        let c = Node::new(NodeType::Episode, b"c".to_vec(), 0);
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        a.connect(b_id, EdgeType::RelatesTo, 1.0);
        b.connect(c_id, EdgeType::RelatesTo, 1.0);
        storage.insert(a).unwrap();
        storage.insert(b).unwrap();
        storage.insert(c).unwrap();

        let before = storage.get(c_id).unwrap().unwrap().kappa.mu;
        propagate_confidence(&storage, a_id, 0.5, 0.8, 2).unwrap();
        let after = storage.get(c_id).unwrap().unwrap().kappa.mu;
        assert!(after > before);
    }

    #[test]
    fn synthesize_wisdom_needs_at_least_three_similar_episodes() {
        let storage = Storage::open_in_memory(10).unwrap();
        for i in 0..2 {
            let mut n = Node::new(NodeType::Episode, format!("ep{i}").into_bytes(), 0);
            n.nu = Some(Vector(vec![1.0, 0.0]).fit_to_dim(2));
            n.tau_accessed = 0;
            storage.insert(n).unwrap();
        }
        assert!(synthesize_wisdom(&storage, 0).unwrap().is_none());

        let mut n = Node::new(NodeType::Episode, b"ep2".to_vec(), 0);
        n.nu = Some(Vector(vec![0.99, 0.01]).fit_to_dim(2));
        n.tau_accessed = 0;
        storage.insert(n).unwrap();

        let result = synthesize_wisdom(&storage, 0).unwrap();
        assert!(result.is_some());
        let wisdom = storage.get(result.unwrap()).unwrap().unwrap();
        assert_eq!(wisdom.node_type, NodeType::Wisdom);
    }

    #[test]
    fn tick_applies_queued_feedback_and_fires_prune_dead() {
        let storage = Storage::open_in_memory(10).unwrap();
        let mut dead = Node::new(NodeType::Episode, b"dead".to_vec(), 0);
        dead.kappa = Confidence::new(0.01);
        storage.insert(dead).unwrap();

        let mut clock = DynamicsClock::new(0);
        let mut queue = FeedbackQueue::new(10);
        let config = Config::default();
        let report = tick(&storage, &mut clock, &mut queue, &config, 0).unwrap();

        assert!(report.triggers_fired.contains(&"prune_dead"));
        assert_eq!(report.pruned, 1);
    }

    fn hub_node(nu: Vector, conf: f64, tau_created: i64) -> Node {
        let mut n = Node::new(NodeType::Wisdom, b"hub".to_vec(), tau_created);
        n.nu = Some(nu);
        n.kappa = Confidence::new(conf);
        n
    }

    #[test]
    fn find_attractors_requires_confidence_degree_and_age() {
        let storage = Storage::open_in_memory(10).unwrap();
        let old_ms = -30 * 86_400_000;
        let mut hub = hub_node(Vector(vec![1.0, 0.0]).fit_to_dim(2), 0.9, old_ms);
        let hub_id = hub.id;
        for _ in 0..6 {
            let leaf = Node::new(NodeType::Episode, b"leaf".to_vec(), old_ms);
            hub.connect(leaf.id, EdgeType::RelatesTo, 0.5);
            storage.insert(leaf).unwrap();
        }
        storage.insert(hub).unwrap();

        let too_young = hub_node(Vector(vec![0.0, 1.0]).fit_to_dim(2), 0.95, 0);
        storage.insert(too_young).unwrap();

        let attractors = find_attractors(&storage, 0).unwrap();
        assert_eq!(attractors.len(), 1);
        assert_eq!(attractors[0].id, hub_id);
        assert!(attractors[0].basin.len() >= 6);
    }

    #[test]
    fn settle_toward_attractors_raises_aligned_basin_member_confidence() {
        let storage = Storage::open_in_memory(10).unwrap();
        let old_ms = -30 * 86_400_000;
        let mut hub = hub_node(Vector(vec![1.0, 0.0]).fit_to_dim(2), 0.9, old_ms);
        let hub_id = hub.id;
        let mut aligned = hub_node(Vector(vec![0.95, 0.05]).fit_to_dim(2), 0.3, old_ms);
        aligned.node_type = NodeType::Episode;
        let aligned_id = aligned.id;
        for _ in 0..5 {
            let leaf = Node::new(NodeType::Episode, b"leaf".to_vec(), old_ms);
            hub.connect(leaf.id, EdgeType::RelatesTo, 0.5);
            storage.insert(leaf).unwrap();
        }
        storage.insert(hub).unwrap();
        storage.insert(aligned).unwrap();

        let before = storage.get(aligned_id).unwrap().unwrap().kappa.mu;
        let attractors = find_attractors(&storage, 0).unwrap();
        assert!(attractors.iter().any(|a| a.id == hub_id));
        settle_toward_attractors(&storage, &attractors, 0.5).unwrap();
        let after = storage.get(aligned_id).unwrap().unwrap().kappa.mu;
        assert!(after > before);
    }
}
