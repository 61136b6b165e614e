//! MatchState - per-match mutable state
//!
//! Holds the pointer into the (immutable) position graph, the two players'
//! scores and orientations, the turn counter and the outcome.
//!
//! ## Outcome state machine
//!
//! ```text
//! Ongoing ──tap──────────────► WonBySubmission (non-acting player)
//!    │ ──enter winner node───► WonByPosition   (holder of that orientation)
//!    │ ──turn budget spent───► WonByPoints | Tie
//!    └─ dead end / no legal move: stays Ongoing
//! ```
//!
//! Every non-`Ongoing` outcome is terminal.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::MatchConfig;
use crate::error::{MatchError, Result};
use crate::graph::{NodeId, Orientation, PositionGraph};

// ============================================================================
// Players
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerId {
    One,
    Two,
}

impl PlayerId {
    pub const BOTH: [PlayerId; 2] = [PlayerId::One, PlayerId::Two];

    #[inline]
    pub const fn other(self) -> Self {
        match self {
            PlayerId::One => PlayerId::Two,
            PlayerId::Two => PlayerId::One,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            PlayerId::One => 0,
            PlayerId::Two => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSlot {
    pub name: String,
    pub score: u32,
    pub orientation: Orientation,
}

impl PlayerSlot {
    pub fn new(name: impl Into<String>, orientation: Orientation) -> Self {
        Self { name: name.into(), score: 0, orientation }
    }

    pub fn is_top(&self) -> bool {
        self.orientation.is_top()
    }

    pub fn is_bottom(&self) -> bool {
        self.orientation.is_bottom()
    }
}

// ============================================================================
// Outcome
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MatchOutcome {
    #[default]
    Ongoing,
    WonBySubmission { winner: PlayerId },
    WonByPosition { winner: PlayerId },
    WonByPoints { winner: PlayerId },
    Tie,
}

impl MatchOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MatchOutcome::Ongoing)
    }

    pub fn winner(&self) -> Option<PlayerId> {
        match *self {
            MatchOutcome::WonBySubmission { winner }
            | MatchOutcome::WonByPosition { winner }
            | MatchOutcome::WonByPoints { winner } => Some(winner),
            MatchOutcome::Ongoing | MatchOutcome::Tie => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchOutcome::Ongoing => "ongoing",
            MatchOutcome::WonBySubmission { .. } => "submission",
            MatchOutcome::WonByPosition { .. } => "position",
            MatchOutcome::WonByPoints { .. } => "points",
            MatchOutcome::Tie => "tie",
        }
    }
}

// ============================================================================
// MatchState
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    current_node: NodeId,
    start_node: NodeId,
    turn: u32,
    max_turns: u32,
    players: [PlayerSlot; 2],
    active: PlayerId,
    outcome: MatchOutcome,
    recoveries: u32,
}

impl MatchState {
    /// Explicit setup; player two gets the opposite orientation.
    pub fn new(
        start_node: NodeId,
        names: [&str; 2],
        player_one: Orientation,
        active: PlayerId,
        max_turns: u32,
    ) -> Self {
        Self {
            current_node: start_node,
            start_node,
            turn: 0,
            max_turns,
            players: [
                PlayerSlot::new(names[0], player_one),
                PlayerSlot::new(names[1], player_one.opposite()),
            ],
            active,
            outcome: MatchOutcome::Ongoing,
            recoveries: 0,
        }
    }

    /// Random setup for a new match.
    ///
    /// - start node: the configured hub with `hub_probability`, otherwise
    ///   uniform over all positions
    /// - player one top/bottom uniform, player two the opposite
    /// - first player to act uniform
    pub fn initialize<R: Rng + ?Sized>(
        graph: &PositionGraph,
        config: &MatchConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let start = pick_start_node(graph, config, rng)?;
        let player_one = if rng.gen_bool(0.5) { Orientation::Top } else { Orientation::Bottom };
        let active = if rng.gen_bool(0.5) { PlayerId::One } else { PlayerId::Two };
        let names = [config.player_one.as_str(), config.player_two.as_str()];
        Ok(Self::new(start, names, player_one, active, config.max_turns))
    }

    pub fn current_node(&self) -> NodeId {
        self.current_node
    }

    pub fn start_node(&self) -> NodeId {
        self.start_node
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn turns_left(&self) -> u32 {
        self.max_turns.saturating_sub(self.turn)
    }

    pub fn recoveries(&self) -> u32 {
        self.recoveries
    }

    pub fn outcome(&self) -> MatchOutcome {
        self.outcome
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.outcome.winner()
    }

    pub fn active(&self) -> PlayerId {
        self.active
    }

    pub fn player(&self, id: PlayerId) -> &PlayerSlot {
        &self.players[id.index()]
    }

    pub fn active_player(&self) -> &PlayerSlot {
        self.player(self.active)
    }

    pub fn players(&self) -> &[PlayerSlot; 2] {
        &self.players
    }

    pub fn scores(&self) -> [u32; 2] {
        [self.players[0].score, self.players[1].score]
    }

    /// Score of `id` minus the opponent's.
    pub fn point_difference(&self, id: PlayerId) -> i64 {
        i64::from(self.player(id).score) - i64::from(self.player(id.other()).score)
    }

    /// Player currently holding `orientation`.
    pub fn holder_of(&self, orientation: Orientation) -> PlayerId {
        if self.players[0].orientation == orientation {
            PlayerId::One
        } else {
            PlayerId::Two
        }
    }

    pub(crate) fn ensure_ongoing(&self) -> Result<()> {
        if self.is_terminal() {
            return Err(MatchError::MatchFinished);
        }
        Ok(())
    }

    pub(crate) fn move_to(&mut self, node: NodeId) {
        self.current_node = node;
    }

    pub(crate) fn relocate(&mut self, node: NodeId) {
        self.current_node = node;
        self.recoveries += 1;
    }

    pub(crate) fn award(&mut self, player: PlayerId, points: u32) {
        self.players[player.index()].score += points;
    }

    pub(crate) fn swap_orientations(&mut self) {
        for p in &mut self.players {
            p.orientation = p.orientation.opposite();
        }
    }

    pub(crate) fn switch_active(&mut self) {
        self.active = self.active.other();
    }

    pub(crate) fn advance_turn(&mut self) {
        self.turn += 1;
    }

    pub(crate) fn budget_spent(&self) -> bool {
        self.turn >= self.max_turns
    }

    /// The acting player tapped; the opponent wins.
    pub(crate) fn record_submission(&mut self, acting: PlayerId) {
        self.outcome = MatchOutcome::WonBySubmission { winner: acting.other() };
    }

    pub(crate) fn record_position_win(&mut self, orientation: Orientation) {
        self.outcome = MatchOutcome::WonByPosition { winner: self.holder_of(orientation) };
    }

    /// Settle on points once the turn budget is spent.
    pub(crate) fn finish_on_points(&mut self) {
        if self.is_terminal() {
            return;
        }
        let [one, two] = self.scores();
        self.outcome = match one.cmp(&two) {
            std::cmp::Ordering::Greater => MatchOutcome::WonByPoints { winner: PlayerId::One },
            std::cmp::Ordering::Less => MatchOutcome::WonByPoints { winner: PlayerId::Two },
            std::cmp::Ordering::Equal => MatchOutcome::Tie,
        };
    }
}

fn pick_start_node<R: Rng + ?Sized>(
    graph: &PositionGraph,
    config: &MatchConfig,
    rng: &mut R,
) -> Result<NodeId> {
    if let Some(hub) = config.hub_node {
        if !graph.contains(hub) {
            let msg = format!("hub position {hub} is not in the graph");
            return Err(MatchError::InvalidConfig(msg));
        }
        if rng.gen_bool(config.hub_probability) {
            return Ok(hub);
        }
    }
    random_node(graph, rng)
}

/// Uniform over all positions.
pub(crate) fn random_node<R: Rng + ?Sized>(graph: &PositionGraph, rng: &mut R) -> Result<NodeId> {
    let count = graph.node_count();
    if count == 0 {
        return Err(MatchError::InvalidConfig("graph has no positions".to_string()));
    }
    let slot = rng.gen_range(0..count);
    graph
        .node_at_slot(slot)
        .ok_or_else(|| MatchError::InvalidConfig(format!("no position at slot {slot}")))
}
