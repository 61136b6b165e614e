//! Move selection.
//!
//! The engine hands a strategy the legal move list for the acting player and
//! expects one edge back. The driver checks the answer against the legal
//! set, so a strategy cannot sneak in an illegal move.
//!
//! - [`RandomStrategy`]: uniform over legal moves
//! - [`PolicyStrategy`]: greedy over a learned [`MovePolicy`] with epsilon
//!   exploration, ties broken at random
//! - [`ScriptedStrategy`]: replays a fixed edge sequence (tests, demos)

use std::collections::VecDeque;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::match_state::{MatchState, PlayerId};
use super::resolver::LegalMove;
use crate::graph::{EdgeId, NodeId, Orientation, PositionGraph};

/// RNG threaded through a match. Seeded per match for reproducibility.
pub type MatchRng = ChaCha8Rng;

pub struct DecisionContext<'a> {
    pub graph: &'a PositionGraph,
    pub state: &'a MatchState,
    pub player: PlayerId,
}

impl DecisionContext<'_> {
    pub fn node(&self) -> NodeId {
        self.state.current_node()
    }

    pub fn orientation(&self) -> Orientation {
        self.state.player(self.player).orientation
    }
}

pub trait Strategy: Send {
    /// Pick one of `legal` (never empty when called by the driver).
    fn choose_move(
        &mut self,
        ctx: &DecisionContext<'_>,
        legal: &[LegalMove],
        rng: &mut MatchRng,
    ) -> Option<EdgeId>;

    fn name(&self) -> &str;
}

// ============================================================================
// Random
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomStrategy;

impl Strategy for RandomStrategy {
    fn choose_move(
        &mut self,
        _ctx: &DecisionContext<'_>,
        legal: &[LegalMove],
        rng: &mut MatchRng,
    ) -> Option<EdgeId> {
        legal.choose(rng).map(|m| m.edge)
    }

    fn name(&self) -> &str {
        "random"
    }
}

// ============================================================================
// Learned policy
// ============================================================================

/// Value estimate for a move in a decision context (e.g. a Q-table).
pub trait MovePolicy: Send + Sync {
    fn score(&self, ctx: &DecisionContext<'_>, mv: &LegalMove) -> f64;
}

impl<P: MovePolicy + ?Sized> MovePolicy for Arc<P> {
    fn score(&self, ctx: &DecisionContext<'_>, mv: &LegalMove) -> f64 {
        (**self).score(ctx, mv)
    }
}

#[derive(Debug, Clone)]
pub struct PolicyStrategy<P> {
    policy: P,
    epsilon: f64,
}

impl<P: MovePolicy> PolicyStrategy<P> {
    /// Pure exploitation.
    pub fn greedy(policy: P) -> Self {
        Self { policy, epsilon: 0.0 }
    }

    pub fn with_exploration(policy: P, epsilon: f64) -> Self {
        Self { policy, epsilon: epsilon.clamp(0.0, 1.0) }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl<P: MovePolicy> Strategy for PolicyStrategy<P> {
    fn choose_move(
        &mut self,
        ctx: &DecisionContext<'_>,
        legal: &[LegalMove],
        rng: &mut MatchRng,
    ) -> Option<EdgeId> {
        if legal.is_empty() {
            return None;
        }
        if self.epsilon > 0.0 && rng.gen_bool(self.epsilon) {
            return legal.choose(rng).map(|m| m.edge);
        }

        let scores: Vec<f64> = legal.iter().map(|m| self.policy.score(ctx, m)).collect();
        let best = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let ties: Vec<&LegalMove> = legal
            .iter()
            .zip(&scores)
            .filter(|(_, s)| **s == best)
            .map(|(m, _)| m)
            .collect();
        ties.choose(rng).map(|m| m.edge)
    }

    fn name(&self) -> &str {
        "policy"
    }
}

// ============================================================================
// Scripted
// ============================================================================

/// Plays the scripted edges in order, verbatim (an illegal entry is
/// rejected by the driver). Once the script runs out it takes the first
/// legal move.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStrategy {
    script: VecDeque<EdgeId>,
}

impl ScriptedStrategy {
    pub fn new(script: impl IntoIterator<Item = EdgeId>) -> Self {
        Self { script: script.into_iter().collect() }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Strategy for ScriptedStrategy {
    fn choose_move(
        &mut self,
        _ctx: &DecisionContext<'_>,
        legal: &[LegalMove],
        _rng: &mut MatchRng,
    ) -> Option<EdgeId> {
        self.script.pop_front().or_else(|| legal.first().map(|m| m.edge))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, Position};
    use rand::SeedableRng;

    fn fixture() -> (PositionGraph, MatchState) {
        let mut b = GraphBuilder::new();
        b.add_position(Position::new(NodeId(0), "standing")).unwrap();
        let g = b.build().unwrap();
        let s = MatchState::new(NodeId(0), ["A", "B"], Orientation::Top, PlayerId::One, 5);
        (g, s)
    }

    fn moves() -> Vec<LegalMove> {
        (0..4).map(|i| LegalMove { edge: EdgeId(i), to: NodeId(i) }).collect()
    }

    struct PreferEdge(EdgeId);

    impl MovePolicy for PreferEdge {
        fn score(&self, _ctx: &DecisionContext<'_>, mv: &LegalMove) -> f64 {
            if mv.edge == self.0 {
                1.0
            } else {
                0.0
            }
        }
    }

    #[test]
    fn test_random_picks_from_legal() {
        let (g, s) = fixture();
        let ctx = DecisionContext { graph: &g, state: &s, player: PlayerId::One };
        let mut rng = MatchRng::seed_from_u64(9);
        let legal = moves();
        for _ in 0..32 {
            let e = RandomStrategy.choose_move(&ctx, &legal, &mut rng).unwrap();
            assert!(legal.iter().any(|m| m.edge == e));
        }
        assert_eq!(RandomStrategy.choose_move(&ctx, &[], &mut rng), None);
    }

    #[test]
    fn test_greedy_policy_picks_best() {
        let (g, s) = fixture();
        let ctx = DecisionContext { graph: &g, state: &s, player: PlayerId::One };
        let mut rng = MatchRng::seed_from_u64(1);
        let mut strat = PolicyStrategy::greedy(PreferEdge(EdgeId(2)));
        for _ in 0..16 {
            assert_eq!(strat.choose_move(&ctx, &moves(), &mut rng), Some(EdgeId(2)));
        }
    }

    #[test]
    fn test_policy_through_arc() {
        let (g, s) = fixture();
        let ctx = DecisionContext { graph: &g, state: &s, player: PlayerId::One };
        let mut rng = MatchRng::seed_from_u64(1);
        let shared: Arc<PreferEdge> = Arc::new(PreferEdge(EdgeId(3)));
        let mut strat = PolicyStrategy::greedy(shared);
        assert_eq!(strat.choose_move(&ctx, &moves(), &mut rng), Some(EdgeId(3)));
    }

    #[test]
    fn test_full_exploration_still_legal() {
        let (g, s) = fixture();
        let ctx = DecisionContext { graph: &g, state: &s, player: PlayerId::One };
        let mut rng = MatchRng::seed_from_u64(5);
        let mut strat = PolicyStrategy::with_exploration(PreferEdge(EdgeId(0)), 1.0);
        let mut picked_other = false;
        for _ in 0..64 {
            let e = strat.choose_move(&ctx, &moves(), &mut rng).unwrap();
            picked_other |= e != EdgeId(0);
        }
        assert!(picked_other);
    }

    #[test]
    fn test_scripted_then_fallback() {
        let (g, s) = fixture();
        let ctx = DecisionContext { graph: &g, state: &s, player: PlayerId::One };
        let mut rng = MatchRng::seed_from_u64(0);
        let mut strat = ScriptedStrategy::new([EdgeId(3), EdgeId(42)]);
        assert_eq!(strat.choose_move(&ctx, &moves(), &mut rng), Some(EdgeId(3)));
        // verbatim, even when not legal
        assert_eq!(strat.choose_move(&ctx, &moves(), &mut rng), Some(EdgeId(42)));
        assert_eq!(strat.remaining(), 0);
        assert_eq!(strat.choose_move(&ctx, &moves(), &mut rng), Some(EdgeId(0)));
    }
}
