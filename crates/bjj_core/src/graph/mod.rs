//! PositionGraph - read-only directed graph of positions and transitions.
//!
//! ## Layout
//!
//! - positions live in an arena (`Vec<Position>`) addressed through an
//!   id → slot map
//! - transitions live in a flat `Vec<Transition>` addressed by `EdgeId`
//! - every position carries `incoming` / `outgoing` summaries computed once
//!   by [`GraphBuilder::build`]
//!
//! Nothing here is mutable after construction, so one graph can be shared
//! by reference (or `Arc`) across any number of concurrent matches.

pub mod annotate;
pub mod builder;
pub mod loader;
pub mod types;

pub use annotate::{annotate, AnnotationReport, WinAnnotation};
pub use builder::{GraphBuilder, NewTransition};
pub use loader::{graph_from_json_str, load_graph, GraphPaths, LoadedGraph};
pub use types::{
    EdgeId, EdgeSummary, Maneuver, ManeuverSet, NodeId, Orientation, Position, Transition,
};

use rustc_hash::FxHashMap;

use crate::error::MatchError;

#[derive(Debug, Clone)]
pub struct PositionGraph {
    positions: Vec<Position>,
    index: FxHashMap<NodeId, usize>,
    edges: Vec<Transition>,
}

impl PositionGraph {
    pub(crate) fn from_parts(
        positions: Vec<Position>,
        index: FxHashMap<NodeId, usize>,
        edges: Vec<Transition>,
    ) -> Self {
        Self { positions, index, edges }
    }

    pub fn node(&self, id: NodeId) -> Option<&Position> {
        self.slot_of(id).and_then(|slot| self.positions.get(slot))
    }

    pub fn get_node(&self, id: NodeId) -> Result<&Position, MatchError> {
        self.node(id).ok_or(MatchError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Transition> {
        self.edges.get(id.index())
    }

    pub fn get_edge_by_id(&self, id: EdgeId) -> Result<&Transition, MatchError> {
        self.edge(id).ok_or(MatchError::UnknownEdge(id))
    }

    /// First transition (in insertion order) from `from` to `to`.
    pub fn get_edge(&self, from: NodeId, to: NodeId) -> Option<&Transition> {
        self.outgoing_edges(from)
            .iter()
            .find(|s| s.to == to)
            .and_then(|s| self.edge(s.transition))
    }

    /// Outgoing summaries of `id`; empty for an unknown id.
    pub fn outgoing_edges(&self, id: NodeId) -> &[EdgeSummary] {
        self.node(id).map(|p| p.outgoing.as_slice()).unwrap_or(&[])
    }

    pub fn incoming_edges(&self, id: NodeId) -> &[EdgeSummary] {
        self.node(id).map(|p| p.incoming.as_slice()).unwrap_or(&[])
    }

    pub fn has_outgoing(&self, id: NodeId) -> bool {
        !self.outgoing_edges(id).is_empty()
    }

    pub fn winner_at(&self, id: NodeId) -> Option<Orientation> {
        self.node(id).and_then(|p| p.winner)
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Node ids in arena order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.positions.iter().map(|p| p.id)
    }

    /// Arena slot of `id` (dense, `0..node_count()`).
    pub fn slot_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn node_at_slot(&self, slot: usize) -> Option<NodeId> {
        self.positions.get(slot).map(|p| p.id)
    }

    /// All transitions in `EdgeId` order. This ordering is the fixed action
    /// enumeration of the RL environment.
    pub fn edges(&self) -> &[Transition] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            positions: self.positions.len(),
            transitions: self.edges.len(),
            ..GraphStats::default()
        };
        for p in &self.positions {
            if p.outgoing.is_empty() {
                stats.terminal_positions += 1;
                if p.winner.is_none() {
                    stats.dead_ends += 1;
                }
            }
            if p.winner.is_some() {
                stats.win_positions += 1;
            }
        }
        for e in &self.edges {
            if e.tap {
                stats.taps += 1;
            }
            if e.reversible {
                stats.reversible += 1;
            }
            if e.swaps_players {
                stats.swaps += 1;
            }
            if !e.maneuvers.is_empty() {
                stats.scoring += 1;
            }
        }
        stats
    }
}

/// Shape summary used by `inspect` and startup logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct GraphStats {
    pub positions: usize,
    pub transitions: usize,
    pub terminal_positions: usize,
    /// Terminal positions with no winner tag; these trigger dead-end recovery.
    pub dead_ends: usize,
    pub win_positions: usize,
    pub taps: usize,
    pub reversible: usize,
    pub swaps: usize,
    pub scoring: usize,
}
