//! Black-box scenarios driving `Mind` directly, one per spec.md §8 seed
//! case. Each test builds its own store rather than sharing fixtures.

use mneme_core::embeddings::{Artha, Embedder, EmbeddingSource, NullEmbedder};
use mneme_core::node::{EdgeType, NodeType};
use mneme_core::{Config, Mind, RecallFlags, Storage, Vector};

/// Deterministic stand-in for the real transformer backend: words are
/// bucketed into a handful of fixed concept axes so cosine similarity
/// behaves the way a real embedding would for these specific sentences,
/// without pulling in model weights for a unit test.
struct ConceptEmbedder {
    dim: usize,
}

impl ConceptEmbedder {
    fn new() -> Self {
        Self { dim: 5 }
    }
}

impl Embedder for ConceptEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn ready(&self) -> bool {
        true
    }

    fn transform(&self, text: &str) -> mneme_core::Result<Artha> {
        let lower = text.to_lowercase();
        // [resource-management concept, ownership term, raii term, fruit concept, float term]
        let mut v = vec![0.0f32; 5];
        for (term, idx, weight) in [
            ("memory", 0, 1.0),
            ("management", 0, 1.0),
            ("explicit", 0, 1.0),
            ("prevent", 0, 1.0),
            ("leak", 0, 1.0),
            ("ownership", 1, 0.6),
            ("raii", 2, 0.6),
            ("pineapple", 3, 1.0),
            ("float", 4, 0.6),
        ] {
            if lower.contains(term) {
                v[idx] += weight;
            }
        }
        Ok(Artha {
            vector: Vector(v),
            certainty: 1.0,
            source: EmbeddingSource::Transformer,
        })
    }
}

fn mind_with_concepts(now_ms: i64) -> Mind<ConceptEmbedder> {
    let storage = Storage::open_in_memory(10_000).unwrap();
    Mind::new(storage, ConceptEmbedder::new(), Config::default(), now_ms)
}

fn mind_with_null(now_ms: i64, hot_capacity: usize) -> Mind<NullEmbedder> {
    let storage = Storage::open_in_memory(hot_capacity).unwrap();
    let dim = Config::default().dimension;
    Mind::new(storage, NullEmbedder::new(dim), Config::default(), now_ms)
}

#[test]
fn wisdom_recall_ranks_relevant_wisdoms_above_an_unrelated_one() {
    let now = 1_700_000_000_000;
    let mind = mind_with_concepts(now);

    let w1 = mind
        .remember(NodeType::Wisdom, "prefer explicit ownership", None, vec![], now)
        .unwrap();
    let w2 = mind
        .remember(NodeType::Wisdom, "RAII prevents leaks", None, vec![], now)
        .unwrap();
    let w3 = mind
        .remember(NodeType::Wisdom, "pineapples float", None, vec![], now)
        .unwrap();

    let hits = mind
        .recall(
            Some("memory management"),
            None,
            2,
            0.0,
            RecallFlags::default(),
            now,
        )
        .unwrap();

    assert_eq!(hits.len(), 2);
    let ids: Vec<_> = hits.iter().map(|h| h.id).collect();
    assert!(ids.contains(&w1));
    assert!(ids.contains(&w2));
    assert!(!ids.contains(&w3));
}

#[test]
fn duplicate_episodes_form_an_attractor_basin() {
    let now = 1_700_000_000_000;
    let mind = mind_with_concepts(now);

    let hub = mind
        .remember(
            NodeType::Episode,
            "refactored the storage layer",
            Some(Vector(vec![1.0, 0.0, 0.0, 0.0, 0.0])),
            vec![],
            now,
        )
        .unwrap();
    // strengthen() with amount 0.3 on a fresh 0.5-confidence node lands
    // exactly at 0.8 (Confidence::observe with n=0 sets mu = target).
    mind.strengthen(hub, 0.3).unwrap();

    let mut leaves = Vec::new();
    for i in 0..5 {
        let leaf = mind
            .remember(
                NodeType::Episode,
                &format!("related detail {i}"),
                Some(Vector(vec![0.0, 1.0, 0.0, 0.0, 0.0])),
                vec![],
                now,
            )
            .unwrap();
        mind.connect(hub, leaf, EdgeType::RelatesTo, 0.5).unwrap();
        leaves.push(leaf);
    }

    // Attractors require age >= 7 days; evaluate 8 days after creation.
    let later = now + 8 * 24 * 3_600_000;
    let attractors = mind.find_attractors(later).unwrap();

    assert_eq!(attractors.len(), 1);
    let attractor = &attractors[0];
    assert_eq!(attractor.id, hub);
    assert!(attractor.basin.len() >= 2);
    for leaf in &leaves {
        assert!(attractor.basin.contains(leaf));
    }
}

#[test]
fn repeated_feedback_strictly_moves_confidence_in_the_fed_back_direction() {
    use mneme_core::dynamics::FeedbackKind;

    let now = 1_700_000_000_000;
    let mind = mind_with_concepts(now);
    let w1 = mind
        .remember(NodeType::Wisdom, "prefer explicit ownership", None, vec![], now)
        .unwrap();

    let before = mind.get(w1).unwrap().unwrap().kappa.effective();

    for i in 0..5 {
        mind.queue_feedback(w1, FeedbackKind::Helpful, 1.0, now + i, None);
    }
    mind.flush_feedback(now + 10).unwrap();
    let after_helpful = mind.get(w1).unwrap().unwrap().kappa.effective();
    assert!(after_helpful > before);

    for i in 0..7 {
        mind.queue_feedback(w1, FeedbackKind::Misleading, 1.0, now + 100 + i, None);
    }
    mind.flush_feedback(now + 200).unwrap();
    let after_misleading = mind.get(w1).unwrap().unwrap().kappa.effective();
    assert!(after_misleading < before);
}

#[test]
fn full_resonate_with_learning_creates_a_hebbian_edge_between_co_activated_nodes() {
    let now = 1_700_000_000_000;
    let mind = mind_with_concepts(now);

    let w1 = mind
        .remember(NodeType::Wisdom, "prefer explicit ownership", None, vec![], now)
        .unwrap();
    let w2 = mind
        .remember(NodeType::Wisdom, "RAII prevents leaks", None, vec![], now)
        .unwrap();
    mind.connect(w1, w2, EdgeType::Supports, 0.5).unwrap();

    mind.full_resonate("ownership", 5, true, now).unwrap();

    let w1_node = mind.get(w1).unwrap().unwrap();
    let similar_edge = w1_node
        .edges
        .iter()
        .find(|e| e.target == w2 && e.edge_type == EdgeType::Similar);
    assert!(
        similar_edge.is_some_and(|e| e.weight > 0.0),
        "expected a positive-weight Similar edge from co-activation, found {:?}",
        w1_node.edges
    );
}

#[test]
fn ledger_survives_a_daemon_restart() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("store.hot");
    let now = 1_700_000_000_000;

    {
        let storage = Storage::open(&base, 100).unwrap();
        let mind = Mind::new(storage, NullEmbedder::new(8), Config::default(), now);
        mind.save_ledger("s1", Some("p1"), "work:phase-3", now).unwrap();
    }

    // Simulate a daemon restart: reopen storage at the same path.
    let storage = Storage::open(&base, 100).unwrap();
    let mind = Mind::new(storage, NullEmbedder::new(8), Config::default(), now);
    let loaded = mind.load_ledger("s1").unwrap().unwrap();
    assert_eq!(loaded.text(), "work:phase-3");
}

#[test]
fn hot_tier_stays_capped_while_every_node_remains_retrievable_by_tag() {
    let now = 1_700_000_000_000;
    let mind = mind_with_null(now, 10_000);

    for i in 0..11_000 {
        mind.remember(
            NodeType::Episode,
            &format!("note {i}"),
            None,
            vec!["project:p1".to_string()],
            now,
        )
        .unwrap();
    }

    let by_tag = mind
        .recall_by_tag("project:p1", mneme_core::ZoomLevel::Title, 20_000)
        .unwrap();
    assert_eq!(by_tag.len(), 11_000);
}
