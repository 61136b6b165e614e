//! Reward annotation pass.
//!
//! Runs once on a [`GraphBuilder`] before it is frozen:
//!
//! 1. win positions from the terminal win list
//! 2. submissions: a position whose only way out is a transition named
//!    `"tap"` marks that transition as a tap
//! 3. tag maneuvers (`sweep`, `throw`, `takedown`, `pass`) from transition tags
//! 4. positional maneuvers (`mount`, `back`): entering a position tagged with
//!    the name from one that is not

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::builder::GraphBuilder;
use super::types::{Maneuver, NodeId, Orientation};
use crate::error::GraphError;

pub const TAP_DESCRIPTION: &str = "tap";

/// Maneuvers detected from a substring of the transition's own tags.
pub const TAG_MANEUVERS: [Maneuver; 4] =
    [Maneuver::Sweep, Maneuver::Throw, Maneuver::Takedown, Maneuver::Pass];

/// Maneuvers detected from the tags of the endpoint positions.
pub const POSITIONAL_MANEUVERS: [Maneuver; 2] = [Maneuver::Mount, Maneuver::Back];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinAnnotation {
    pub node: NodeId,
    pub winner: Orientation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnnotationReport {
    pub win_positions: usize,
    pub taps: usize,
    pub sweep: usize,
    pub mount: usize,
    pub back: usize,
    pub throw: usize,
    pub takedown: usize,
    pub pass: usize,
}

impl AnnotationReport {
    fn bump(&mut self, maneuver: Maneuver) {
        match maneuver {
            Maneuver::Sweep => self.sweep += 1,
            Maneuver::Mount => self.mount += 1,
            Maneuver::Back => self.back += 1,
            Maneuver::Throw => self.throw += 1,
            Maneuver::Takedown => self.takedown += 1,
            Maneuver::Pass => self.pass += 1,
        }
    }
}

pub fn annotate(
    builder: &mut GraphBuilder,
    wins: &[WinAnnotation],
) -> Result<AnnotationReport, GraphError> {
    let mut report = AnnotationReport::default();

    for win in wins {
        builder.set_winner(win.node, win.winner)?;
        report.win_positions += 1;
    }

    report.taps = flag_taps(builder);

    for maneuver in TAG_MANEUVERS {
        for edge in builder.edges_mut() {
            if edge.has_tag(maneuver.name()) {
                edge.maneuvers.insert(maneuver);
                report.bump(maneuver);
            }
        }
    }

    for maneuver in POSITIONAL_MANEUVERS {
        let name = maneuver.name();
        let entering: Vec<usize> = builder
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                let from_has = builder.position(e.from).map_or(false, |p| p.has_tag(name));
                let to_has = builder.position(e.to).map_or(false, |p| p.has_tag(name));
                !from_has && to_has
            })
            .map(|(i, _)| i)
            .collect();
        for i in entering {
            builder.edges_mut()[i].maneuvers.insert(maneuver);
            report.bump(maneuver);
        }
    }

    debug!(?report, "reward annotation complete");
    Ok(report)
}

fn flag_taps(builder: &mut GraphBuilder) -> usize {
    let node_ids: Vec<NodeId> = builder.positions().iter().map(|p| p.id).collect();
    let mut taps = 0;
    for node in node_ids {
        let out = builder.outgoing_of(node);
        if let [only] = out.as_slice() {
            let edge = &mut builder.edges_mut()[*only];
            if edge.description == TAP_DESCRIPTION {
                edge.tap = true;
                taps += 1;
            }
        }
    }
    taps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NewTransition, Position};

    fn builder() -> GraphBuilder {
        let mut b = GraphBuilder::new();
        b.add_position(Position::new(NodeId(1), "closed guard").with_tags(["closed guard"]))
            .unwrap();
        b.add_position(Position::new(NodeId(2), "mount").with_tags(["mount", "top control"]))
            .unwrap();
        b.add_position(Position::new(NodeId(3), "armbar from mount").with_tags(["mount", "armbar"]))
            .unwrap();
        b.add_position(Position::new(NodeId(4), "armbar finished")).unwrap();
        b
    }

    #[test]
    fn test_positional_and_tag_maneuvers() {
        let mut b = builder();
        b.add_transition(
            NewTransition::new(1, NodeId(1), NodeId(2), "hip bump").with_tags(["hip bump sweep"]),
        )
        .unwrap();
        b.add_transition(NewTransition::new(2, NodeId(2), NodeId(3), "armbar setup")).unwrap();
        b.add_transition(NewTransition::new(3, NodeId(3), NodeId(4), "tap")).unwrap();

        let report = annotate(&mut b, &[]).unwrap();
        assert_eq!(report.sweep, 1);
        assert_eq!(report.mount, 1);
        assert_eq!(report.taps, 1);

        let g = b.build().unwrap();
        let sweep = &g.edges()[0];
        assert!(sweep.maneuvers.contains(Maneuver::Sweep));
        assert!(sweep.maneuvers.contains(Maneuver::Mount));
        // mount -> mount is not a mount
        assert!(g.edges()[1].maneuvers.is_empty());
        assert!(g.edges()[2].tap);
    }

    #[test]
    fn test_tap_requires_single_exit() {
        let mut b = builder();
        b.add_transition(NewTransition::new(1, NodeId(3), NodeId(4), "tap")).unwrap();
        b.add_transition(NewTransition::new(2, NodeId(3), NodeId(2), "armbar escape")).unwrap();
        let report = annotate(&mut b, &[]).unwrap();
        assert_eq!(report.taps, 0);
        assert!(b.edges().iter().all(|e| !e.tap));
    }

    #[test]
    fn test_win_annotations_applied() {
        let mut b = builder();
        let wins = [WinAnnotation { node: NodeId(4), winner: Orientation::Top }];
        annotate(&mut b, &wins).unwrap();
        assert_eq!(b.position(NodeId(4)).unwrap().winner, Some(Orientation::Top));

        let bad = [WinAnnotation { node: NodeId(77), winner: Orientation::Bottom }];
        assert!(matches!(
            annotate(&mut b, &bad),
            Err(GraphError::UnknownNode { node: NodeId(77), .. })
        ));
    }
}
