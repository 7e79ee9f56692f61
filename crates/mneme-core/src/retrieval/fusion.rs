//! Reciprocal rank fusion of dense and sparse candidate lists (spec.md
//! §4.F step 2): per-list weight, `1 / (k_rrf + rank + 1)` scoring.

use std::collections::HashMap;

use crate::node::NodeId;

pub const DEFAULT_K_RRF: f64 = 60.0;
pub const DEFAULT_W_DENSE: f64 = 0.7;

/// Fuses two ranked candidate lists. Items outside the top `limit` of
/// either list contribute nothing from that list (spec.md: "items
/// outside the top 4k of a list contribute 0").
pub fn reciprocal_rank_fusion<A, B>(
    dense: &[(NodeId, A)],
    sparse: &[(NodeId, B)],
    k_rrf: f64,
    w_dense: f64,
    limit: usize,
) -> Vec<(NodeId, f64)> {
    let w_sparse = 1.0 - w_dense;
    let mut scores: HashMap<NodeId, f64> = HashMap::new();

    for (rank, (id, _)) in dense.iter().take(limit).enumerate() {
        *scores.entry(*id).or_insert(0.0) += w_dense / (k_rrf + rank as f64 + 1.0);
    }
    for (rank, (id, _)) in sparse.iter().take(limit).enumerate() {
        *scores.entry(*id).or_insert(0.0) += w_sparse / (k_rrf + rank as f64 + 1.0);
    }

    let mut fused: Vec<(NodeId, f64)> = scores.into_iter().collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_in_both_lists_outranks_single_list_item() {
        let a = NodeId::new();
        let b = NodeId::new();
        let c = NodeId::new();

        let dense = vec![(a, 0.9_f32), (b, 0.8)];
        let sparse = vec![(b, 5.0_f64), (c, 4.0)];

        let fused = reciprocal_rank_fusion(&dense, &sparse, DEFAULT_K_RRF, DEFAULT_W_DENSE, 10);
        assert_eq!(fused[0].0, b);
    }

    #[test]
    fn empty_sparse_list_still_ranks_dense_items() {
        let a = NodeId::new();
        let dense = vec![(a, 1.0_f32)];
        let sparse: Vec<(NodeId, f64)> = Vec::new();

        let fused = reciprocal_rank_fusion(&dense, &sparse, DEFAULT_K_RRF, DEFAULT_W_DENSE, 10);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].0, a);
    }

    #[test]
    fn items_beyond_limit_are_ignored() {
        let ids: Vec<NodeId> = (0..5).map(|_| NodeId::new()).collect();
        let dense: Vec<(NodeId, f32)> = ids.iter().map(|id| (*id, 1.0)).collect();
        let sparse: Vec<(NodeId, f64)> = Vec::new();

        let fused = reciprocal_rank_fusion(&dense, &sparse, DEFAULT_K_RRF, DEFAULT_W_DENSE, 2);
        assert_eq!(fused.len(), 2);
    }
}
