//! The façade (spec.md §4.H): the one type an embedder and a caller
//! actually hold. Composes storage, graph ops, retrieval, and dynamics
//! behind a single coarse `Mutex` guarding the mutable session/clock
//! state, per spec.md §5 ("one coarse-grained mutex; long operations
//! release it around embedding calls"). `Storage` itself is already
//! internally fine-grained (separate reader/writer/hot/bm25/tag
//! mutexes), so the façade lock only ever protects the small pieces of
//! state that are genuinely session-scoped: the dynamics clock, the
//! feedback queue, the session context, the observation rate limiter,
//! and the rollback snapshot ring.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::Config;
use crate::dynamics::{
    self, Attractor, DynamicsClock, FeedbackEvent, FeedbackKind, FeedbackQueue, TickReport,
};
use crate::embeddings::{Embedder, EmbeddingCache};
use crate::error::{MnemeError, Result};
use crate::graph::{Coherence, Graph, Ojas};
use crate::node::{EdgeType, Node, NodeId, NodeType};
use crate::retrieval::session::SessionContext;
use crate::retrieval::spreading;
use crate::retrieval::{self, RecallFlags, RecallHit, RecallMode, ZoomLevel};
use crate::storage::Storage;
use crate::vector::Vector;

/// A prior state of the whole node set, taken by `Mind::snapshot` and
/// restorable by `Mind::rollback` (spec.md §7: "a snapshot taken
/// before `prune` permits manual rollback"). Snapshots are a monotone
/// sequence (spec.md invariant 6); the façade keeps a bounded ring of
/// the most recent ones rather than an unbounded history.
struct Snapshot {
    id: u64,
    nodes: Vec<Node>,
}

const MAX_SNAPSHOTS: usize = 8;

/// A summary of one node's current standing, used by `epistemic_state`
/// to surface what the graph is least sure of.
#[derive(Debug, Clone)]
pub struct WeakBelief {
    pub id: NodeId,
    pub effective_confidence: f64,
}

/// "What does the engine currently believe, and how sure is it?"
/// A point-in-time census over coherence, vitality, and the nodes the
/// graph holds least confidently.
#[derive(Debug, Clone)]
pub struct EpistemicState {
    pub coherence: Coherence,
    pub vitality: Ojas,
    pub type_counts: HashMap<&'static str, usize>,
    pub weakest_beliefs: Vec<WeakBelief>,
}

/// Two belief-like nodes that cosine-agree but are neither linked nor
/// reconciled — the same tension `Graph::local_coherence` samples,
/// surfaced individually rather than folded into one ratio.
#[derive(Debug, Clone)]
pub struct ContradictionPair {
    pub a: NodeId,
    pub b: NodeId,
    pub cosine: f32,
}

/// Everything `Mind` needs to guard behind its one mutex. Deliberately
/// small: none of this is storage, all of it is session-local.
struct MindState {
    clock: DynamicsClock,
    feedback: FeedbackQueue,
    session: SessionContext,
    last_observed: HashMap<String, i64>,
    snapshots: Vec<Snapshot>,
    next_snapshot_id: u64,
}

/// The memory engine's one entry point. Generic over the embedder
/// backend so a caller can plug in `NullEmbedder`, `TransformerEmbedder`,
/// or (typically) a boxed trait object when the concrete type isn't
/// known until runtime configuration is read.
pub struct Mind<E: Embedder> {
    storage: Storage,
    embedder: EmbeddingCache<E>,
    config: Config,
    state: Mutex<MindState>,
}

impl<E: Embedder> Mind<E> {
    pub fn new(storage: Storage, embedder: E, config: Config, now_ms: i64) -> Self {
        let state = MindState {
            clock: DynamicsClock::new(now_ms),
            feedback: FeedbackQueue::new(config.feedback_queue_capacity),
            session: SessionContext::default(),
            last_observed: HashMap::new(),
            snapshots: Vec::new(),
            next_snapshot_id: 0,
        };
        Self {
            storage,
            embedder: EmbeddingCache::with_capacity(embedder, config.embedding_cache_capacity),
            config,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MindState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Embeds `text`, falling back to no vector at all rather than
    /// failing the write outright when the backend is unavailable
    /// (spec.md §7: "on `EmbedderUnavailable`, fall back to
    /// sparse-only retrieval / a zero-vector write").
    fn try_embed(&self, text: &str) -> Option<Vector> {
        match self.embedder.transform(text) {
            Ok(artha) if self.embedder.ready() => Some(artha.vector),
            _ => None,
        }
    }

    // ---- Writes (spec.md §4.H) -----------------------------------

    /// Create a node. `vector` takes precedence over embedding `text`;
    /// if both are absent the node is stored with no embedding (dense
    /// recall will simply never surface it).
    pub fn remember(
        &self,
        node_type: NodeType,
        text: &str,
        vector: Option<Vector>,
        tags: Vec<String>,
        now_ms: i64,
    ) -> Result<NodeId> {
        let mut node = Node::new(node_type, text.as_bytes().to_vec(), now_ms);
        node.nu = vector.or_else(|| self.try_embed(text));
        for tag in tags {
            node.add_tag(tag);
        }
        let id = node.id;
        self.storage.insert(node)?;
        Ok(id)
    }

    /// Nudge a node's confidence toward 1.0 by `amount` (clamped),
    /// via the same running-mean `observe` the feedback pipeline uses.
    pub fn strengthen(&self, id: NodeId, amount: f64) -> Result<()> {
        self.nudge_confidence(id, amount)
    }

    /// Nudge a node's confidence toward 0.0 by `amount` (clamped).
    pub fn weaken(&self, id: NodeId, amount: f64) -> Result<()> {
        self.nudge_confidence(id, -amount)
    }

    fn nudge_confidence(&self, id: NodeId, delta: f64) -> Result<()> {
        let Some(mut node) = self.storage.get(id)? else {
            return Err(MnemeError::not_found(id));
        };
        let target = (node.kappa.mu + delta).clamp(0.0, 1.0);
        node.kappa.observe(target);
        self.storage.update(node)
    }

    pub fn connect(&self, from: NodeId, to: NodeId, edge_type: EdgeType, weight: f32) -> Result<()> {
        Graph::new(&self.storage).connect(from, to, edge_type, weight)
    }

    pub fn tag(&self, id: NodeId, tag: String) -> Result<()> {
        let Some(mut node) = self.storage.get(id)? else {
            return Err(MnemeError::not_found(id));
        };
        node.add_tag(tag);
        self.storage.update(node)
    }

    pub fn untag(&self, id: NodeId, tag: &str) -> Result<()> {
        let Some(mut node) = self.storage.get(id)? else {
            return Err(MnemeError::not_found(id));
        };
        node.remove_tag(tag);
        self.storage.update(node)
    }

    /// Patch a node's text and/or tags in place. Re-embeds if new text
    /// is supplied and the embedder is ready; otherwise the existing
    /// embedding (if any) is left untouched.
    pub fn update(
        &self,
        id: NodeId,
        text: Option<&str>,
        tags: Option<Vec<String>>,
        now_ms: i64,
    ) -> Result<()> {
        let Some(mut node) = self.storage.get(id)? else {
            return Err(MnemeError::not_found(id));
        };
        if let Some(t) = text {
            node.payload = t.as_bytes().to_vec();
            if let Some(v) = self.try_embed(t) {
                node.nu = Some(v);
            }
        }
        if let Some(t) = tags {
            node.tags = t;
        }
        node.touch(now_ms);
        self.storage.update(node)
    }

    /// spec.md §4.G `forget`.
    pub fn forget(&self, id: NodeId, cascade: bool, rewire: bool, now_ms: i64) -> Result<bool> {
        dynamics::forget(
            &self.storage,
            id,
            cascade,
            rewire,
            self.config.cascade_strength,
            now_ms,
        )
    }

    /// Unconditional removal, no cascade/rewire/audit — for callers
    /// that already know they want the node gone outright.
    pub fn remove_node(&self, id: NodeId) -> Result<bool> {
        self.storage.remove(id)
    }

    // ---- Reads ------------------------------------------------------

    pub fn get(&self, id: NodeId) -> Result<Option<Node>> {
        self.storage.get(id)
    }

    pub fn text(&self, id: NodeId) -> Result<Option<String>> {
        Ok(self.storage.get(id)?.map(|n| n.text()))
    }

    pub fn query_by_type(&self, node_type: NodeType) -> Result<Vec<Node>> {
        self.storage.nodes_by_type(node_type)
    }

    /// spec.md §4.F `recall`: embeds `query_text` when the mode calls
    /// for dense candidates and no vector was supplied directly, then
    /// runs the full candidate/fusion/rerank/prime/inhibit pipeline.
    /// Session priming is updated from the top hit on return.
    pub fn recall(
        &self,
        query_text: Option<&str>,
        query_vector: Option<Vector>,
        k: usize,
        threshold: f64,
        flags: RecallFlags,
        now_ms: i64,
    ) -> Result<Vec<RecallHit>> {
        let needs_dense = matches!(flags.mode, RecallMode::Dense | RecallMode::Hybrid);
        let owned_vector = if query_vector.is_some() {
            query_vector
        } else if needs_dense {
            query_text.and_then(|t| self.try_embed(t))
        } else {
            None
        };

        let hits = {
            let state = self.lock();
            retrieval::recall(
                &self.storage,
                &state.session,
                &self.config,
                owned_vector.as_ref(),
                query_text,
                k,
                threshold,
                &flags,
                now_ms,
            )?
        };

        if let Some(top) = hits.first() {
            let mut state = self.lock();
            state.session.observe(top.id, owned_vector.as_ref());
        }
        Ok(hits)
    }

    pub fn recall_by_tag(&self, tag: &str, zoom: ZoomLevel, k: usize) -> Result<Vec<RecallHit>> {
        let mut hits = Vec::new();
        for id in self.storage.nodes_with_tag(tag) {
            if let Some(node) = self.storage.get(id)? {
                hits.push(project_public(&node, zoom));
            }
            if hits.len() >= k {
                break;
            }
        }
        Ok(hits)
    }

    /// spec.md §4.F step 6: spreading activation seeded from `recall`'s
    /// top candidates, without priming/inhibition/learning.
    pub fn resonate(&self, query_text: &str, k: usize, now_ms: i64) -> Result<Vec<(NodeId, f64)>> {
        let seeds = self.seed_activations(query_text, k, now_ms)?;
        spreading::resonate(&self.storage, &seeds, &self.config.spread_config())
    }

    /// Every stage active: dense+sparse fusion, soul-aware rerank,
    /// priming, inhibition, spreading activation, and (if `learn`) the
    /// Hebbian edge update over the final top set (spec.md §4.F "every
    /// stage is individually togglable"; `full_resonate` is all of
    /// them at once).
    pub fn full_resonate(
        &self,
        query_text: &str,
        k: usize,
        learn: bool,
        now_ms: i64,
    ) -> Result<Vec<(NodeId, f64)>> {
        let seeds = self.seed_activations(query_text, k, now_ms)?;
        let spread = spreading::resonate(&self.storage, &seeds, &self.config.spread_config())?;
        if learn {
            spreading::hebbian_update(&self.storage, &spread, self.config.hebbian_eta)?;
        }
        Ok(spread)
    }

    fn seed_activations(&self, query_text: &str, k: usize, now_ms: i64) -> Result<Vec<(NodeId, f64)>> {
        let hits = self.recall(
            Some(query_text),
            None,
            k,
            0.0,
            RecallFlags::default(),
            now_ms,
        )?;
        Ok(hits.into_iter().map(|h| (h.id, h.relevance)).collect())
    }

    // ---- Dynamics (spec.md §4.G) -------------------------------------

    /// Runs one dynamics tick (decay/coherence/triggers/feedback/
    /// dangling-GC), then opportunistically manages tier placement and
    /// settles basins toward any attractors found — both driven from
    /// the same scheduled call per spec.md §9's single-scheduled-task
    /// design note.
    pub fn tick(&self, now_ms: i64) -> Result<TickReport> {
        let report = {
            let mut state = self.lock();
            dynamics::tick(
                &self.storage,
                &mut state.clock,
                &mut state.feedback,
                &self.config,
                now_ms,
            )?
        };
        self.storage.manage_tiers(
            now_ms,
            self.config.tiers.hot_age_ms,
            self.config.tiers.warm_age_ms,
        )?;
        let attractors = dynamics::find_attractors(&self.storage, now_ms)?;
        dynamics::settle_toward_attractors(&self.storage, &attractors, self.config.settle_strength)?;
        Ok(report)
    }

    /// Captures the full node set for later rollback. Returns the
    /// snapshot id.
    pub fn snapshot(&self) -> Result<u64> {
        let nodes = self.storage.all_nodes()?;
        let mut state = self.lock();
        let id = state.next_snapshot_id;
        state.next_snapshot_id += 1;
        if state.snapshots.len() == MAX_SNAPSHOTS {
            state.snapshots.remove(0);
        }
        state.snapshots.push(Snapshot { id, nodes });
        Ok(id)
    }

    /// Restores the node set captured by `snapshot(id)`, rebuilding all
    /// indices. Errors if the id is unknown (evicted or never taken).
    pub fn rollback(&self, id: u64) -> Result<()> {
        let nodes = {
            let state = self.lock();
            state
                .snapshots
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.nodes.clone())
                .ok_or_else(|| MnemeError::bad_input(format!("unknown snapshot {id}")))?
        };
        self.storage.replace_all(nodes)
    }

    pub fn queue_feedback(&self, node_id: NodeId, kind: FeedbackKind, magnitude: f64, timestamp: i64, context: Option<String>) {
        let mut state = self.lock();
        state.feedback.push(FeedbackEvent {
            node_id,
            kind,
            magnitude,
            timestamp,
            context,
        });
    }

    /// Applies everything queued by `queue_feedback` right now, rather
    /// than waiting for the next `tick`.
    pub fn flush_feedback(&self, now_ms: i64) -> Result<usize> {
        let mut state = self.lock();
        dynamics::apply_feedback(&self.storage, &mut state.feedback, &self.config, now_ms)
    }

    pub fn find_attractors(&self, now_ms: i64) -> Result<Vec<Attractor>> {
        dynamics::find_attractors(&self.storage, now_ms)
    }

    pub fn settle_toward_attractors(&self, now_ms: i64) -> Result<usize> {
        let attractors = dynamics::find_attractors(&self.storage, now_ms)?;
        dynamics::settle_toward_attractors(&self.storage, &attractors, self.config.settle_strength)
    }

    pub fn propagate_confidence(&self, id: NodeId, delta: f64, decay: f64, depth: u32) -> Result<usize> {
        dynamics::propagate_confidence(&self.storage, id, delta, decay, depth)
    }

    pub fn synthesize_wisdom(&self, now_ms: i64) -> Result<Option<NodeId>> {
        dynamics::synthesize_wisdom(&self.storage, now_ms)
    }

    // ---- Introspection ------------------------------------------------

    pub fn coherence(&self, now_ms: i64) -> Result<Coherence> {
        Graph::new(&self.storage).compute_coherence(now_ms)
    }

    pub fn health(&self, now_ms: i64) -> Result<Ojas> {
        Graph::new(&self.storage).compute_vitality(now_ms)
    }

    pub fn session_context_is_recent(&self, id: NodeId) -> bool {
        self.lock().session.is_recent(id)
    }

    pub fn intend(&self, id: NodeId, vector: Option<&Vector>) {
        self.lock().session.intend(id, vector);
    }

    /// The session's current recent-observation and active-intention
    /// windows (spec.md §4.H Introspection: `session_context`).
    pub fn soul_context(&self) -> (Vec<NodeId>, Vec<NodeId>) {
        let state = self.lock();
        (
            state.session.recent_observations().iter().copied().collect(),
            state.session.active_intentions().iter().copied().collect(),
        )
    }

    /// A single node projected at the given zoom level, the same
    /// shaping `recall_by_tag` applies across a whole tag (spec.md
    /// §4.F "pure output shaping" reused for a single-id lookup).
    pub fn lens(&self, id: NodeId, zoom: ZoomLevel) -> Result<Option<RecallHit>> {
        Ok(self.storage.get(id)?.map(|node| project_public(&node, zoom)))
    }

    /// Coherence, vitality, a per-type census, and the weakest-held
    /// beliefs/invariants — "what does the engine currently believe,
    /// and how sure is it?"
    pub fn epistemic_state(&self, now_ms: i64) -> Result<EpistemicState> {
        let graph = Graph::new(&self.storage);
        let coherence = graph.compute_coherence(now_ms)?;
        let vitality = graph.compute_vitality(now_ms)?;

        let nodes = self.storage.all_nodes()?;
        let mut type_counts: HashMap<&'static str, usize> = HashMap::new();
        for node in &nodes {
            *type_counts.entry(node.node_type.as_str()).or_insert(0) += 1;
        }

        let mut beliefs: Vec<WeakBelief> = nodes
            .iter()
            .filter(|n| matches!(n.node_type, NodeType::Belief | NodeType::Invariant))
            .map(|n| WeakBelief {
                id: n.id,
                effective_confidence: n.kappa.effective(),
            })
            .collect();
        beliefs.sort_by(|a, b| {
            a.effective_confidence
                .partial_cmp(&b.effective_confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        beliefs.truncate(10);

        Ok(EpistemicState {
            coherence,
            vitality,
            type_counts,
            weakest_beliefs: beliefs,
        })
    }

    /// Belief/wisdom pairs that cosine-agree (> 0.7) but carry neither a
    /// `Supports`/`Similar` edge nor a `Contradicts` one — the same
    /// tension `Graph::local_coherence` samples in aggregate, here
    /// returned individually so a caller can act on each pair (e.g.
    /// connect them, or flag one for review).
    pub fn bias_scan(&self) -> Result<Vec<ContradictionPair>> {
        const SIMILARITY: f32 = 0.7;
        let nodes = self.storage.all_nodes()?;
        let belief_like: Vec<&Node> = nodes
            .iter()
            .filter(|n| matches!(n.node_type, NodeType::Belief | NodeType::Wisdom))
            .filter(|n| n.nu.is_some())
            .collect();

        let mut pairs = Vec::new();
        for i in 0..belief_like.len() {
            for j in (i + 1)..belief_like.len() {
                let a = belief_like[i];
                let b = belief_like[j];
                let cos = Vector::cosine(a.nu.as_ref().unwrap(), b.nu.as_ref().unwrap());
                if cos <= SIMILARITY {
                    continue;
                }
                let reconciled = a.edges.iter().any(|e| {
                    e.target == b.id
                        && matches!(
                            e.edge_type,
                            EdgeType::Supports | EdgeType::Similar | EdgeType::Contradicts
                        )
                });
                if !reconciled {
                    pairs.push(ContradictionPair { a: a.id, b: b.id, cosine: cos });
                }
            }
        }
        Ok(pairs)
    }

    /// Nodes explicitly tagged `project:<tag>` above a confidence floor.
    /// Requires the explicit tag rather than a substring/heuristic match
    /// over free text, so transfer across projects stays opt-in.
    pub fn cross_project(&self, project_tag: &str, min_confidence: f64) -> Result<Vec<Node>> {
        let tag = format!("project:{project_tag}");
        let mut out = Vec::new();
        for id in self.storage.nodes_with_tag(&tag) {
            if let Some(node) = self.storage.get(id)? {
                if node.kappa.effective() >= min_confidence {
                    out.push(node);
                }
            }
        }
        Ok(out)
    }

    // ---- Ledger (session-state persistence, spec.md §4.H) ------------

    /// Creates a new `Ledger` node tagged `session:<session_tag>` and,
    /// if given, `project:<project_tag>`.
    pub fn save_ledger(
        &self,
        session_tag: &str,
        project_tag: Option<&str>,
        text: &str,
        now_ms: i64,
    ) -> Result<NodeId> {
        let mut node = Node::new(NodeType::Ledger, text.as_bytes().to_vec(), now_ms);
        node.add_tag(format!("session:{session_tag}"));
        if let Some(p) = project_tag {
            node.add_tag(format!("project:{p}"));
        }
        let id = node.id;
        self.storage.insert(node)?;
        Ok(id)
    }

    /// The most recently created `Ledger` node tagged for this session
    /// ("latest" = max `tau_created`, per spec.md §4.H).
    pub fn load_ledger(&self, session_tag: &str) -> Result<Option<Node>> {
        let tag = format!("session:{session_tag}");
        let mut candidates: Vec<Node> = self
            .storage
            .nodes_with_tag(&tag)
            .into_iter()
            .filter_map(|id| self.storage.get(id).ok().flatten())
            .collect();
        candidates.sort_by_key(|n| std::cmp::Reverse(n.tau_created));
        Ok(candidates.into_iter().next())
    }

    pub fn update_ledger(&self, id: NodeId, text: &str, now_ms: i64) -> Result<()> {
        self.update(id, Some(text), None, now_ms)
    }

    pub fn list_ledgers(&self, project_tag: &str) -> Result<Vec<Node>> {
        let tag = format!("project:{project_tag}");
        let mut out: Vec<Node> = self
            .storage
            .nodes_with_tag(&tag)
            .into_iter()
            .filter_map(|id| self.storage.get(id).ok().flatten())
            .filter(|n| n.node_type == NodeType::Ledger)
            .collect();
        out.sort_by_key(|n| std::cmp::Reverse(n.tau_created));
        Ok(out)
    }

    // ---- Rate-limited observation (spec.md §5) -----------------------

    /// Marks `id` as observed by `caller` — touches it, folds it into
    /// session priming — enforcing a minimum 500ms (configurable)
    /// interval between successive observations from the same caller
    /// "to damp spam loops" (spec.md §5).
    pub fn observe(&self, caller: &str, id: NodeId, now_ms: i64) -> Result<()> {
        {
            let mut state = self.lock();
            if let Some(&last) = state.last_observed.get(caller) {
                let elapsed = now_ms - last;
                if elapsed < self.config.min_observation_interval_ms {
                    return Err(MnemeError::RateLimited {
                        retry_after_ms: (self.config.min_observation_interval_ms - elapsed) as u64,
                    });
                }
            }
            state.last_observed.insert(caller.to_string(), now_ms);
        }

        let Some(mut node) = self.storage.get(id)? else {
            return Err(MnemeError::not_found(id));
        };
        node.touch(now_ms);
        let vector = node.nu.clone();
        self.storage.update(node)?;
        self.lock().session.observe(id, vector.as_ref());
        Ok(())
    }
}

fn project_public(node: &Node, zoom: ZoomLevel) -> RecallHit {
    let full_text = node.text();
    let title: String = full_text.chars().take(60).collect();
    match zoom {
        ZoomLevel::Title => RecallHit {
            id: node.id,
            relevance: node.kappa.effective(),
            node_type: node.node_type,
            title,
            text: None,
            edges: None,
            tau_created: None,
            tau_accessed: None,
        },
        ZoomLevel::Truncated => RecallHit {
            id: node.id,
            relevance: node.kappa.effective(),
            node_type: node.node_type,
            title,
            text: Some(full_text.chars().take(280).collect()),
            edges: None,
            tau_created: None,
            tau_accessed: None,
        },
        ZoomLevel::Full => RecallHit {
            id: node.id,
            relevance: node.kappa.effective(),
            node_type: node.node_type,
            title,
            text: Some(full_text),
            edges: Some(node.edges.clone()),
            tau_created: Some(node.tau_created),
            tau_accessed: Some(node.tau_accessed),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::NullEmbedder;

    fn mind(now_ms: i64) -> Mind<NullEmbedder> {
        let storage = Storage::open_in_memory(100).unwrap();
        Mind::new(storage, NullEmbedder::new(8), Config::default(), now_ms)
    }

    #[test]
    fn remember_then_get_roundtrips() {
        let m = mind(0);
        let id = m
            .remember(NodeType::Episode, "hello world", None, vec!["t1".into()], 0)
            .unwrap();
        let node = m.get(id).unwrap().unwrap();
        assert_eq!(node.text(), "hello world");
        assert!(node.has_tag("t1"));
    }

    #[test]
    fn strengthen_raises_and_weaken_lowers_confidence() {
        let m = mind(0);
        let id = m
            .remember(NodeType::Belief, "W1", None, vec![], 0)
            .unwrap();
        let before = m.get(id).unwrap().unwrap().kappa.effective();
        m.strengthen(id, 0.3).unwrap();
        let after_strengthen = m.get(id).unwrap().unwrap().kappa.effective();
        assert!(after_strengthen > before);
        m.weaken(id, 0.3).unwrap();
        let after_weaken = m.get(id).unwrap().unwrap().kappa.effective();
        assert!(after_weaken < after_strengthen);
    }

    #[test]
    fn snapshot_and_rollback_restores_removed_node() {
        let m = mind(0);
        let id = m
            .remember(NodeType::Episode, "keep me", None, vec![], 0)
            .unwrap();
        let snap = m.snapshot().unwrap();
        m.remove_node(id).unwrap();
        assert!(m.get(id).unwrap().is_none());
        m.rollback(snap).unwrap();
        assert!(m.get(id).unwrap().is_some());
    }

    #[test]
    fn observe_rate_limits_same_caller() {
        let m = mind(0);
        let id = m
            .remember(NodeType::Episode, "seen", None, vec![], 0)
            .unwrap();
        m.observe("agent-1", id, 0).unwrap();
        let err = m.observe("agent-1", id, 100).unwrap_err();
        assert!(matches!(err, MnemeError::RateLimited { .. }));
        assert!(m.observe("agent-1", id, 600).is_ok());
    }

    #[test]
    fn ledger_latest_by_creation_time_wins() {
        let m = mind(0);
        m.save_ledger("s1", Some("proj-a"), "first", 0).unwrap();
        let second = m.save_ledger("s1", Some("proj-a"), "second", 1000).unwrap();
        let latest = m.load_ledger("s1").unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.text(), "second");
    }

    #[test]
    fn cross_project_requires_explicit_tag() {
        let m = mind(0);
        let tagged = m
            .remember(NodeType::Wisdom, "reusable pattern", None, vec!["project:alpha".into()], 0)
            .unwrap();
        m.strengthen(tagged, 0.4).unwrap();
        let _untagged = m
            .remember(NodeType::Wisdom, "alpha mentioned in passing", None, vec![], 0)
            .unwrap();

        let results = m.cross_project("alpha", 0.0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, tagged);
    }

    #[test]
    fn bias_scan_flags_unreconciled_similar_beliefs() {
        let m = mind(0);
        let a = m
            .remember(
                NodeType::Belief,
                "prefer explicit ownership",
                Some(Vector(vec![1.0, 0.0]).fit_to_dim(8)),
                vec![],
                0,
            )
            .unwrap();
        let b = m
            .remember(
                NodeType::Belief,
                "ownership should always be explicit",
                Some(Vector(vec![0.99, 0.01]).fit_to_dim(8)),
                vec![],
                0,
            )
            .unwrap();

        let pairs = m.bias_scan().unwrap();
        assert!(pairs.iter().any(|p| (p.a == a && p.b == b) || (p.a == b && p.b == a)));
    }

    #[test]
    fn tick_runs_without_error_on_empty_store() {
        let m = mind(0);
        let report = m.tick(0).unwrap();
        assert!(report.coherence.is_some());
    }
}
