//! Session priming (spec.md §4.F step 4): a short memory of what the
//! current conversation has touched, used to nudge retrieval toward
//! the ongoing train of thought. A bounded FIFO of recent observations.

use std::collections::VecDeque;

use crate::node::NodeId;
use crate::vector::Vector;

pub const DEFAULT_CAPACITY: usize = 50;
pub const DEFAULT_ALPHA: f64 = 0.15;
pub const IDENTITY_BOOST: f64 = 0.05;

/// Bounded recent-activity window plus a drifting "goal basin" centroid.
#[derive(Debug, Clone)]
pub struct SessionContext {
    capacity: usize,
    recent_observations: VecDeque<NodeId>,
    active_intentions: VecDeque<NodeId>,
    pub basin: Option<Vector>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SessionContext {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            recent_observations: VecDeque::new(),
            active_intentions: VecDeque::new(),
            basin: None,
        }
    }

    fn push_bounded(queue: &mut VecDeque<NodeId>, capacity: usize, id: NodeId) {
        if queue.len() == capacity {
            queue.pop_front();
        }
        queue.push_back(id);
    }

    pub fn observe(&mut self, id: NodeId, vector: Option<&Vector>) {
        Self::push_bounded(&mut self.recent_observations, self.capacity, id);
        if let Some(v) = vector {
            self.drift_basin(v);
        }
    }

    pub fn intend(&mut self, id: NodeId, vector: Option<&Vector>) {
        Self::push_bounded(&mut self.active_intentions, self.capacity, id);
        if let Some(v) = vector {
            self.drift_basin(v);
        }
    }

    fn drift_basin(&mut self, vector: &Vector) {
        self.basin = Some(match &self.basin {
            Some(current) => Vector::centroid(&[current, vector]).unwrap_or_else(|| vector.clone()),
            None => vector.clone(),
        });
    }

    pub fn is_recent(&self, id: NodeId) -> bool {
        self.recent_observations.contains(&id) || self.active_intentions.contains(&id)
    }

    pub fn recent_observations(&self) -> &VecDeque<NodeId> {
        &self.recent_observations
    }

    pub fn active_intentions(&self) -> &VecDeque<NodeId> {
        &self.active_intentions
    }
}

/// Boosts a candidate by `1 + alpha * cos(nu, basin)`, plus a flat
/// bonus if the candidate is in the recent/intention sets.
pub fn prime(
    score: f64,
    node_vector: Option<&Vector>,
    node_id: NodeId,
    session: &SessionContext,
    alpha: f64,
) -> f64 {
    let mut boosted = score;
    if let (Some(basin), Some(nu)) = (&session.basin, node_vector) {
        let cos = Vector::cosine(basin, nu) as f64;
        boosted *= 1.0 + alpha * cos;
    }
    if session.is_recent(node_id) {
        boosted += IDENTITY_BOOST;
    }
    boosted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_observation_gets_flat_bonus() {
        let mut session = SessionContext::new(10);
        let id = NodeId::new();
        session.observe(id, None);

        let primed = prime(0.5, None, id, &session, DEFAULT_ALPHA);
        assert!((primed - (0.5 + IDENTITY_BOOST)).abs() < 1e-9);
    }

    #[test]
    fn capacity_evicts_oldest_observation() {
        let mut session = SessionContext::new(2);
        let a = NodeId::new();
        let b = NodeId::new();
        let c = NodeId::new();
        session.observe(a, None);
        session.observe(b, None);
        session.observe(c, None);

        assert!(!session.is_recent(a));
        assert!(session.is_recent(b));
        assert!(session.is_recent(c));
    }

    #[test]
    fn basin_aligned_candidate_is_boosted_more_than_orthogonal() {
        let mut session = SessionContext::new(10);
        session.observe(NodeId::new(), Some(&Vector(vec![1.0, 0.0])));

        let aligned = Vector(vec![1.0, 0.0]);
        let orthogonal = Vector(vec![0.0, 1.0]);
        let id = NodeId::new();

        let aligned_score = prime(0.5, Some(&aligned), id, &session, DEFAULT_ALPHA);
        let orthogonal_score = prime(0.5, Some(&orthogonal), id, &session, DEFAULT_ALPHA);
        assert!(aligned_score > orthogonal_score);
    }
}
