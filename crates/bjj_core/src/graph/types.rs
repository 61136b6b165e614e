//! Position / transition data model.
//!
//! Positions are identified by the id carried in the source data. Transitions
//! get a dense `EdgeId` from the builder; the id from the source data is kept
//! separately as `source_id` and may repeat (a bidirectional transition and
//! its mirrored copy share it).

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into the graph's flat edge array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u32);

impl EdgeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Orientation
// ============================================================================

/// Relative orientation of a player inside a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Top,
    Bottom,
}

impl Orientation {
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Orientation::Top => Orientation::Bottom,
            Orientation::Bottom => Orientation::Top,
        }
    }

    #[inline]
    pub const fn is_top(self) -> bool {
        matches!(self, Orientation::Top)
    }

    #[inline]
    pub const fn is_bottom(self) -> bool {
        matches!(self, Orientation::Bottom)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Orientation::Top => "top",
            Orientation::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Maneuvers
// ============================================================================

/// Point-scoring maneuvers a transition can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Maneuver {
    Sweep,
    Mount,
    Back,
    Throw,
    Takedown,
    Pass,
}

impl Maneuver {
    pub const ALL: [Maneuver; 6] = [
        Maneuver::Sweep,
        Maneuver::Mount,
        Maneuver::Back,
        Maneuver::Throw,
        Maneuver::Takedown,
        Maneuver::Pass,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Maneuver::Sweep => "sweep",
            Maneuver::Mount => "mount",
            Maneuver::Back => "back",
            Maneuver::Throw => "throw",
            Maneuver::Takedown => "takedown",
            Maneuver::Pass => "pass",
        }
    }

    #[inline]
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Maneuver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of maneuver flags on one transition. Several can fire at once
/// (a sweep that lands in mount).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManeuverSet(u8);

impl ManeuverSet {
    pub const EMPTY: ManeuverSet = ManeuverSet(0);

    pub fn insert(&mut self, maneuver: Maneuver) {
        self.0 |= maneuver.bit();
    }

    pub fn with(mut self, maneuver: Maneuver) -> Self {
        self.insert(maneuver);
        self
    }

    #[inline]
    pub fn contains(self, maneuver: Maneuver) -> bool {
        self.0 & maneuver.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Maneuver> {
        Maneuver::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl FromIterator<Maneuver> for ManeuverSet {
    fn from_iter<I: IntoIterator<Item = Maneuver>>(iter: I) -> Self {
        let mut set = ManeuverSet::EMPTY;
        for m in iter {
            set.insert(m);
        }
        set
    }
}

// ============================================================================
// Edge summaries / transitions / positions
// ============================================================================

/// Compact view of an edge stored on both endpoint positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSummary {
    pub transition: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub swaps_players: bool,
    pub top: bool,
    pub bottom: bool,
}

impl EdgeSummary {
    /// Top-only moves are closed to a bottom player and vice versa.
    /// Edges flagged neither way are open to both.
    #[inline]
    pub fn usable_by(&self, orientation: Orientation) -> bool {
        match orientation {
            Orientation::Top => !self.bottom,
            Orientation::Bottom => !self.top,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: EdgeId,
    /// Transition id in the source data.
    pub source_id: i64,
    pub from: NodeId,
    pub to: NodeId,
    pub description: String,
    pub tags: Vec<String>,
    pub properties: Vec<String>,
    pub top: bool,
    pub bottom: bool,
    pub reversible: bool,
    pub swaps_players: bool,
    pub maneuvers: ManeuverSet,
    pub tap: bool,
}

impl Transition {
    pub fn summary(&self) -> EdgeSummary {
        EdgeSummary {
            transition: self.id,
            from: self.from,
            to: self.to,
            swaps_players: self.swaps_players,
            top: self.top,
            bottom: self.bottom,
        }
    }

    pub fn has_tag(&self, needle: &str) -> bool {
        self.tags.iter().any(|t| t.contains(needle))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: NodeId,
    pub description: String,
    pub tags: Vec<String>,
    pub properties: Vec<String>,
    pub is_explicit_position: bool,
    pub winner: Option<Orientation>,
    pub incoming: Vec<EdgeSummary>,
    pub outgoing: Vec<EdgeSummary>,
}

impl Position {
    pub fn new(id: NodeId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            tags: Vec::new(),
            properties: Vec::new(),
            is_explicit_position: true,
            winner: None,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_winner(mut self, winner: Orientation) -> Self {
        self.winner = Some(winner);
        self
    }

    pub fn has_tag(&self, needle: &str) -> bool {
        self.tags.iter().any(|t| t.contains(needle))
    }

    /// No outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        self.outgoing.is_empty()
    }
}
