//! Construction-time graph assembly.
//!
//! The builder is the only place positions and transitions are mutable.
//! `build()` computes the incoming/outgoing summaries and freezes the result
//! into a [`PositionGraph`].

use rustc_hash::FxHashMap;

use super::types::{EdgeId, ManeuverSet, Maneuver, NodeId, Orientation, Position, Transition};
use super::PositionGraph;
use crate::error::GraphError;

/// Transition as supplied to the builder, before an `EdgeId` is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransition {
    pub source_id: i64,
    pub from: NodeId,
    pub to: NodeId,
    pub description: String,
    pub tags: Vec<String>,
    pub properties: Vec<String>,
    pub top: bool,
    pub bottom: bool,
    pub swaps_players: bool,
    pub bidirectional: bool,
    pub tap: bool,
    pub maneuvers: ManeuverSet,
}

impl NewTransition {
    pub fn new(source_id: i64, from: NodeId, to: NodeId, description: impl Into<String>) -> Self {
        Self {
            source_id,
            from,
            to,
            description: description.into(),
            tags: Vec::new(),
            properties: Vec::new(),
            top: false,
            bottom: false,
            swaps_players: false,
            bidirectional: false,
            tap: false,
            maneuvers: ManeuverSet::EMPTY,
        }
    }

    /// Derive game flags from source-data properties.
    ///
    /// - `top` when any property mentions "top", otherwise `bottom` when any
    ///   mentions "bottom" (never both)
    /// - `bidirectional` when any property mentions it
    /// - `swaps_players` when the two endpoint reorientations disagree
    pub fn from_source(
        source_id: i64,
        from: (NodeId, bool),
        to: (NodeId, bool),
        description: impl Into<String>,
        tags: Vec<String>,
        properties: Vec<String>,
    ) -> Self {
        let top = properties.iter().any(|p| p.contains("top"));
        let bottom = !top && properties.iter().any(|p| p.contains("bottom"));
        let bidirectional = properties.iter().any(|p| p.contains("bidirectional"));
        Self {
            source_id,
            from: from.0,
            to: to.0,
            description: description.into(),
            tags,
            properties,
            top,
            bottom,
            swaps_players: from.1 != to.1,
            bidirectional,
            tap: false,
            maneuvers: ManeuverSet::EMPTY,
        }
    }

    pub fn top(mut self) -> Self {
        self.top = true;
        self.bottom = false;
        self
    }

    pub fn bottom(mut self) -> Self {
        self.bottom = true;
        self.top = false;
        self
    }

    pub fn swapping(mut self) -> Self {
        self.swaps_players = true;
        self
    }

    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }

    pub fn tap(mut self) -> Self {
        self.tap = true;
        self
    }

    pub fn maneuver(mut self, maneuver: Maneuver) -> Self {
        self.maneuvers.insert(maneuver);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Default)]
pub struct GraphBuilder {
    positions: Vec<Position>,
    index: FxHashMap<NodeId, usize>,
    edges: Vec<Transition>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_position(&mut self, mut position: Position) -> Result<(), GraphError> {
        if self.index.contains_key(&position.id) {
            return Err(GraphError::DuplicateNode(position.id));
        }
        // Summaries are derived from the edge list at build time.
        position.incoming.clear();
        position.outgoing.clear();
        self.index.insert(position.id, self.positions.len());
        self.positions.push(position);
        Ok(())
    }

    /// Add a transition. A bidirectional transition also adds its mirrored
    /// counter-edge under a fresh id; both are marked `reversible`.
    pub fn add_transition(&mut self, t: NewTransition) -> Result<Vec<EdgeId>, GraphError> {
        for node in [t.from, t.to] {
            if !self.index.contains_key(&node) {
                return Err(GraphError::UnknownNode {
                    node,
                    context: format!("transition {} '{}'", t.source_id, t.description),
                });
            }
        }

        let forward = self.push_edge(&t, t.from, t.to);
        if !t.bidirectional {
            return Ok(vec![forward]);
        }
        let reverse = self.push_edge(&t, t.to, t.from);
        Ok(vec![forward, reverse])
    }

    fn push_edge(&mut self, t: &NewTransition, from: NodeId, to: NodeId) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Transition {
            id,
            source_id: t.source_id,
            from,
            to,
            description: t.description.clone(),
            tags: t.tags.clone(),
            properties: t.properties.clone(),
            top: t.top,
            bottom: t.bottom,
            reversible: t.bidirectional,
            swaps_players: t.swaps_players,
            maneuvers: t.maneuvers,
            tap: t.tap,
        });
        id
    }

    pub fn set_winner(&mut self, node: NodeId, winner: Orientation) -> Result<(), GraphError> {
        let position = self.position_mut(node).ok_or_else(|| GraphError::UnknownNode {
            node,
            context: "win annotation".to_string(),
        })?;
        position.winner = Some(winner);
        Ok(())
    }

    pub fn position(&self, id: NodeId) -> Option<&Position> {
        self.index.get(&id).map(|&slot| &self.positions[slot])
    }

    pub fn position_mut(&mut self, id: NodeId) -> Option<&mut Position> {
        self.index.get(&id).map(|&slot| &mut self.positions[slot])
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn edges(&self) -> &[Transition] {
        &self.edges
    }

    pub(crate) fn edges_mut(&mut self) -> &mut [Transition] {
        &mut self.edges
    }

    /// Edge indices leaving `node`, in insertion order.
    pub fn outgoing_of(&self, node: NodeId) -> Vec<usize> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.from == node)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn build(mut self) -> Result<PositionGraph, GraphError> {
        if self.positions.is_empty() {
            return Err(GraphError::Empty);
        }

        for edge in &self.edges {
            let summary = edge.summary();
            let from_slot = self.slot_for(edge.from, edge)?;
            let to_slot = self.slot_for(edge.to, edge)?;
            self.positions[from_slot].outgoing.push(summary);
            self.positions[to_slot].incoming.push(summary);
        }

        Ok(PositionGraph::from_parts(self.positions, self.index, self.edges))
    }

    fn slot_for(&self, node: NodeId, edge: &Transition) -> Result<usize, GraphError> {
        self.index.get(&node).copied().ok_or_else(|| GraphError::UnknownNode {
            node,
            context: format!("transition {} '{}'", edge.source_id, edge.description),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_positions() -> GraphBuilder {
        let mut b = GraphBuilder::new();
        b.add_position(Position::new(NodeId(1), "closed guard")).unwrap();
        b.add_position(Position::new(NodeId(2), "mount")).unwrap();
        b
    }

    #[test]
    fn test_duplicate_position_rejected() {
        let mut b = two_positions();
        let err = b.add_position(Position::new(NodeId(1), "again")).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode(NodeId(1))));
    }

    #[test]
    fn test_dangling_transition_rejected() {
        let mut b = two_positions();
        let err = b
            .add_transition(NewTransition::new(7, NodeId(1), NodeId(99), "nowhere"))
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode { node: NodeId(99), .. }));
    }

    #[test]
    fn test_bidirectional_gets_fresh_id_and_reversible_flags() {
        let mut b = two_positions();
        let ids = b
            .add_transition(NewTransition::new(5, NodeId(1), NodeId(2), "shrimp").bidirectional())
            .unwrap();
        assert_eq!(ids, vec![EdgeId(0), EdgeId(1)]);

        let g = b.build().unwrap();
        let fwd = g.edge(EdgeId(0)).unwrap();
        let rev = g.edge(EdgeId(1)).unwrap();
        assert_eq!((fwd.from, fwd.to), (NodeId(1), NodeId(2)));
        assert_eq!((rev.from, rev.to), (NodeId(2), NodeId(1)));
        assert!(fwd.reversible && rev.reversible);
        assert_eq!(fwd.source_id, rev.source_id);
    }

    #[test]
    fn test_from_source_derives_flags() {
        let t = NewTransition::from_source(
            3,
            (NodeId(1), false),
            (NodeId(2), true),
            "hip bump",
            vec!["sweep".into()],
            vec!["bottom".into(), "bidirectional".into()],
        );
        assert!(t.bottom && !t.top);
        assert!(t.swaps_players);
        assert!(t.bidirectional);

        // "top" wins when both are mentioned
        let both = NewTransition::from_source(
            4,
            (NodeId(1), true),
            (NodeId(2), true),
            "odd",
            vec![],
            vec!["bottom".into(), "top".into()],
        );
        assert!(both.top && !both.bottom);
        assert!(!both.swaps_players);
    }

    #[test]
    fn test_build_populates_summaries() {
        let mut b = two_positions();
        b.add_transition(NewTransition::new(1, NodeId(1), NodeId(2), "sweep").bottom())
            .unwrap();
        let g = b.build().unwrap();

        let out = g.outgoing_edges(NodeId(1));
        assert_eq!(out.len(), 1);
        assert!(out[0].bottom);
        assert_eq!(g.incoming_edges(NodeId(2)).len(), 1);
        assert!(g.outgoing_edges(NodeId(2)).is_empty());
    }

    #[test]
    fn test_build_rejects_edited_edge_to_unknown_node() {
        let mut b = two_positions();
        b.add_transition(NewTransition::new(3, NodeId(1), NodeId(2), "arm drag")).unwrap();
        b.edges_mut()[0].to = NodeId(99);

        let err = b.build().unwrap_err();
        match err {
            GraphError::UnknownNode { node, context } => {
                assert_eq!(node, NodeId(99));
                assert!(context.contains("arm drag"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_empty_graph_rejected() {
        assert!(matches!(GraphBuilder::new().build(), Err(GraphError::Empty)));
    }
}
