//! Lateral inhibition (spec.md §4.F step 5): once a candidate is
//! accepted, near-duplicate candidates ranked below it are suppressed
//! so the top of a result list isn't just the same memory restated
//! five times. Greedy, single pass over `Vec<(id, score)>`.

use crate::node::NodeId;
use crate::vector::Vector;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.9;
pub const DEFAULT_INHIBITION_STRENGTH: f32 = 0.4;

#[derive(Debug, Clone, Copy)]
pub struct InhibitionConfig {
    pub similarity_threshold: f32,
    pub inhibition_strength: f32,
    pub hard_suppression: bool,
}

impl Default for InhibitionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            inhibition_strength: DEFAULT_INHIBITION_STRENGTH,
            hard_suppression: false,
        }
    }
}

/// `candidates` must already be sorted by descending score and paired
/// with the embedding used to compute similarity (`None` vectors never
/// suppress or get suppressed).
pub fn apply_lateral_inhibition(
    candidates: Vec<(NodeId, f64, Option<Vector>)>,
    config: &InhibitionConfig,
) -> Vec<(NodeId, f64)> {
    let mut accepted: Vec<(NodeId, f64, Option<Vector>)> = Vec::with_capacity(candidates.len());

    'next: for (id, mut score, vector) in candidates {
        for (_, _, accepted_vector) in &accepted {
            if let (Some(v), Some(av)) = (&vector, accepted_vector) {
                let similarity = Vector::cosine(v, av);
                if similarity > config.similarity_threshold {
                    if config.hard_suppression {
                        continue 'next;
                    }
                    score *= (1.0 - config.inhibition_strength) as f64;
                }
            }
        }
        accepted.push((id, score, vector));
    }

    accepted.into_iter().map(|(id, score, _)| (id, score)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_duplicate_is_suppressed_not_removed_by_default() {
        let a = NodeId::new();
        let b = NodeId::new();
        let candidates = vec![
            (a, 1.0, Some(Vector(vec![1.0, 0.0]))),
            (b, 0.9, Some(Vector(vec![1.0, 0.0001]))),
        ];

        let config = InhibitionConfig::default();
        let result = apply_lateral_inhibition(candidates, &config);
        assert_eq!(result.len(), 2);
        assert!(result[1].1 < 0.9);
    }

    #[test]
    fn hard_suppression_removes_near_duplicates() {
        let a = NodeId::new();
        let b = NodeId::new();
        let candidates = vec![
            (a, 1.0, Some(Vector(vec![1.0, 0.0]))),
            (b, 0.9, Some(Vector(vec![1.0, 0.0001]))),
        ];

        let config = InhibitionConfig {
            hard_suppression: true,
            ..Default::default()
        };
        let result = apply_lateral_inhibition(candidates, &config);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, a);
    }

    #[test]
    fn dissimilar_candidates_are_unaffected() {
        let a = NodeId::new();
        let b = NodeId::new();
        let candidates = vec![
            (a, 1.0, Some(Vector(vec![1.0, 0.0]))),
            (b, 0.9, Some(Vector(vec![0.0, 1.0]))),
        ];

        let result = apply_lateral_inhibition(candidates, &InhibitionConfig::default());
        assert!((result[1].1 - 0.9).abs() < 1e-9);
    }
}
