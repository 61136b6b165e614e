//! TurnResolver - legal move generation and move application.
//!
//! Legality only depends on the current position and the acting player's
//! orientation:
//!
//! | edge flag | top player | bottom player |
//! |-----------|------------|---------------|
//! | none      | legal      | legal         |
//! | `top`     | legal      | illegal       |
//! | `bottom`  | illegal    | legal         |
//!
//! Choosing among legal moves is left to a [`Strategy`](super::strategy::Strategy).

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::match_state::MatchState;
use super::rewards::points_for;
use crate::error::{MatchError, Result};
use crate::graph::{EdgeId, ManeuverSet, NodeId, Orientation, PositionGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegalMove {
    pub edge: EdgeId,
    pub to: NodeId,
}

/// Consequences of one applied transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub edge: EdgeId,
    pub points: u32,
    pub tapped: bool,
    pub swaps_players: bool,
    pub next_node: NodeId,
    pub maneuvers: ManeuverSet,
}

#[derive(Debug, Clone, Copy)]
pub struct TurnResolver<'g> {
    graph: &'g PositionGraph,
}

impl<'g> TurnResolver<'g> {
    pub fn new(graph: &'g PositionGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &'g PositionGraph {
        self.graph
    }

    /// Legal moves from `node`, in the node's outgoing insertion order.
    pub fn legal_moves(&self, node: NodeId, orientation: Orientation) -> Vec<LegalMove> {
        self.graph
            .outgoing_edges(node)
            .iter()
            .filter(|s| s.usable_by(orientation))
            .map(|s| LegalMove { edge: s.transition, to: s.to })
            .collect()
    }

    pub fn is_legal(&self, node: NodeId, orientation: Orientation, edge: EdgeId) -> bool {
        self.graph
            .outgoing_edges(node)
            .iter()
            .any(|s| s.transition == edge && s.usable_by(orientation))
    }

    /// Apply `edge` to the state's current position and advance it.
    ///
    /// Scores, outcome and orientation are left to the caller. The move is
    /// irrevocable once applied.
    pub fn apply_move(&self, state: &mut MatchState, edge: EdgeId) -> Result<MoveOutcome> {
        let transition = self.graph.get_edge_by_id(edge)?;
        let node = state.current_node();
        if transition.from != node {
            return Err(MatchError::IllegalMove { edge, node });
        }

        let outcome = MoveOutcome {
            edge,
            points: points_for(transition.maneuvers),
            tapped: transition.tap,
            swaps_players: transition.swaps_players,
            next_node: transition.to,
            maneuvers: transition.maneuvers,
        };
        debug!(
            edge = %edge,
            from = %node,
            to = %outcome.next_node,
            points = outcome.points,
            "applying transition '{}'",
            transition.description
        );
        state.move_to(outcome.next_node);
        Ok(outcome)
    }
}
