//! MatchDriver - turn loop for a single match.
//!
//! One cycle:
//!
//! 1. dead-end recovery (position with no outgoing transitions)
//! 2. legal moves for the active player
//! 3. strategy choice, checked against the legal set
//! 4. apply, award points
//! 5. tap → submission, winner position → positional win
//! 6. otherwise swap orientations if the move swaps players, hand the turn
//!    to the opponent
//! 7. turn += 1; settle on points once the budget is spent
//!
//! A player with no legal move at a position that does have exits passes
//! the turn (the turn still counts). Recovery relocations happen inside the
//! turn and do not count as turns.

use std::sync::Arc;

use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::match_state::{random_node, MatchOutcome, MatchState, PlayerId};
use super::resolver::{MoveOutcome, TurnResolver};
use super::strategy::{DecisionContext, MatchRng, Strategy};
use crate::config::MatchConfig;
use crate::error::{MatchError, Result};
use crate::graph::{EdgeId, NodeId, PositionGraph};

/// What happened in one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based turn number.
    pub turn: u32,
    pub player: PlayerId,
    /// Position the player acted from (after any recovery).
    pub from: NodeId,
    /// `None` when the player had no legal move and passed.
    pub moved: Option<MoveOutcome>,
    /// Dead-end relocations performed before acting.
    pub recoveries: u32,
}

impl TurnRecord {
    pub fn points(&self) -> u32 {
        self.moved.map_or(0, |m| m.points)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub player_names: [String; 2],
    pub scores: [u32; 2],
    pub outcome: MatchOutcome,
    pub winner_name: Option<String>,
    pub turns: u32,
    pub recoveries: u32,
    pub start_node: NodeId,
    pub final_node: NodeId,
}

pub struct MatchDriver {
    graph: Arc<PositionGraph>,
    config: MatchConfig,
    state: MatchState,
    strategies: [Box<dyn Strategy>; 2],
    rng: MatchRng,
    history: Vec<TurnRecord>,
}

impl MatchDriver {
    /// New match with a random start drawn from `seed`.
    pub fn new(
        graph: Arc<PositionGraph>,
        config: MatchConfig,
        strategies: [Box<dyn Strategy>; 2],
        seed: u64,
    ) -> Result<Self> {
        config.validate_for(&graph)?;
        let mut rng = MatchRng::seed_from_u64(seed);
        let state = MatchState::initialize(&graph, &config, &mut rng)?;
        Self::with_state(graph, config, state, strategies, rng)
    }

    /// Match from an explicit state (scenarios, tests, resumed episodes).
    pub fn with_state(
        graph: Arc<PositionGraph>,
        config: MatchConfig,
        state: MatchState,
        strategies: [Box<dyn Strategy>; 2],
        rng: MatchRng,
    ) -> Result<Self> {
        graph.get_node(state.current_node())?;
        let driver = Self { graph, config, state, strategies, rng, history: Vec::new() };
        driver.narrate_start();
        Ok(driver)
    }

    fn narrate_start(&self) {
        let start = self.describe(self.state.current_node());
        info!("Starting match at '{}'", start);
        for id in PlayerId::BOTH {
            let p = self.state.player(id);
            info!("{} is on {} ({})", p.name, p.orientation, self.strategies[id.index()].name());
        }
        info!("{} acts first", self.state.active_player().name);
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn graph(&self) -> &Arc<PositionGraph> {
        &self.graph
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn history(&self) -> &[TurnRecord] {
        &self.history
    }

    pub fn resolver(&self) -> TurnResolver<'_> {
        TurnResolver::new(&self.graph)
    }

    /// Resolve one full turn for the active player using their strategy.
    ///
    /// A rejected choice leaves the match exactly as it was, including any
    /// dead-end relocation made before the strategy was asked.
    pub fn play_turn(&mut self) -> Result<TurnRecord> {
        self.state.ensure_ongoing()?;
        let checkpoint = self.checkpoint();
        let recoveries = self.settle()?;

        let player = self.state.active();
        let node = self.state.current_node();
        let orientation = self.state.player(player).orientation;
        let legal = TurnResolver::new(&self.graph).legal_moves(node, orientation);

        if legal.is_empty() {
            info!(
                "No moves available for {} on {}. Switching players.",
                self.state.player(player).name,
                orientation
            );
            return Ok(self.finish_pass(player, node, recoveries));
        }

        let ctx = DecisionContext { graph: &self.graph, state: &self.state, player };
        let strategy = &mut self.strategies[player.index()];
        let Some(chosen) = strategy.choose_move(&ctx, &legal, &mut self.rng) else {
            let err = MatchError::NoMoveChosen {
                strategy: strategy.name().to_string(),
                available: legal.len(),
            };
            self.restore(checkpoint);
            return Err(err);
        };

        if !legal.iter().any(|m| m.edge == chosen) {
            self.restore(checkpoint);
            return Err(MatchError::IllegalMove { edge: chosen, node });
        }
        self.commit(player, node, chosen, recoveries)
    }

    /// Resolve one turn with an externally chosen edge (RL boundary).
    ///
    /// The edge must be legal for the active player at the current position
    /// (after dead-end recovery); otherwise nothing changes, the recovery is
    /// undone too, and `IllegalMove` is returned.
    pub fn play_turn_with(&mut self, edge: EdgeId) -> Result<TurnRecord> {
        self.state.ensure_ongoing()?;
        let checkpoint = self.checkpoint();
        let recoveries = self.settle()?;

        let player = self.state.active();
        let node = self.state.current_node();
        let orientation = self.state.player(player).orientation;
        if !TurnResolver::new(&self.graph).is_legal(node, orientation, edge) {
            self.restore(checkpoint);
            return Err(MatchError::IllegalMove { edge, node });
        }
        self.commit(player, node, edge, recoveries)
    }

    /// Give up the active player's turn without moving. Only the RL
    /// environment uses this, to charge an out-of-mask action with the turn.
    pub(crate) fn pass_turn(&mut self) -> Result<TurnRecord> {
        self.state.ensure_ongoing()?;
        let player = self.state.active();
        let node = self.state.current_node();
        Ok(self.finish_pass(player, node, 0))
    }

    /// Play until a terminal outcome.
    pub fn run(&mut self) -> Result<MatchResult> {
        if !self.state.is_terminal() && self.state.budget_spent() {
            self.state.finish_on_points();
        }
        while !self.state.is_terminal() {
            self.play_turn()?;
        }
        self.narrate_result();
        Ok(self.result())
    }

    /// Dead-end recovery: while the current position has no way out,
    /// relocate to a uniformly random position. Bounded per turn.
    ///
    /// A dead end is a data-authoring gap (terminal position without a
    /// winner tag), so every relocation is logged at `warn`.
    pub fn settle(&mut self) -> Result<u32> {
        let mut attempts = 0;
        while !self.graph.has_outgoing(self.state.current_node()) {
            let stuck = self.state.current_node();
            if attempts >= self.config.max_recoveries_per_turn {
                return Err(MatchError::RecoveryExhausted { attempts, node: stuck });
            }
            let next = random_node(&self.graph, &mut self.rng)?;
            warn!(
                from = %stuck,
                to = %next,
                "Terminal position '{}' has no transitions; switching to random position '{}'",
                self.describe(stuck),
                self.describe(next)
            );
            self.state.relocate(next);
            attempts += 1;
        }
        Ok(attempts)
    }

    pub fn result(&self) -> MatchResult {
        let names = [
            self.state.player(PlayerId::One).name.clone(),
            self.state.player(PlayerId::Two).name.clone(),
        ];
        let winner_name = self.state.winner().map(|w| names[w.index()].clone());
        MatchResult {
            player_names: names,
            scores: self.state.scores(),
            outcome: self.state.outcome(),
            winner_name,
            turns: self.state.turn(),
            recoveries: self.state.recoveries(),
            start_node: self.state.start_node(),
            final_node: self.state.current_node(),
        }
    }

    fn commit(
        &mut self,
        player: PlayerId,
        from: NodeId,
        edge: EdgeId,
        recoveries: u32,
    ) -> Result<TurnRecord> {
        let outcome = TurnResolver::new(&self.graph).apply_move(&mut self.state, edge)?;
        self.state.award(player, outcome.points);
        self.narrate_move(player, &outcome);

        if outcome.tapped {
            self.state.record_submission(player);
            let winner = self.state.player(player.other());
            info!("{} tapped - {} has won!", self.state.player(player).name, winner.name);
        } else if let Some(orientation) = self.graph.winner_at(outcome.next_node) {
            self.state.record_position_win(orientation);
            let winner = self.state.player(self.state.holder_of(orientation));
            info!("{} won by reaching a winning position!", winner.name);
        } else {
            if outcome.swaps_players {
                self.state.swap_orientations();
                debug!("players swapped top/bottom");
            }
            self.state.switch_active();
        }

        Ok(self.end_turn(player, from, Some(outcome), recoveries))
    }

    fn checkpoint(&self) -> (MatchState, MatchRng) {
        (self.state.clone(), self.rng.clone())
    }

    fn restore(&mut self, (state, rng): (MatchState, MatchRng)) {
        self.state = state;
        self.rng = rng;
    }

    fn finish_pass(&mut self, player: PlayerId, from: NodeId, recoveries: u32) -> TurnRecord {
        self.state.switch_active();
        self.end_turn(player, from, None, recoveries)
    }

    fn end_turn(
        &mut self,
        player: PlayerId,
        from: NodeId,
        moved: Option<MoveOutcome>,
        recoveries: u32,
    ) -> TurnRecord {
        self.state.advance_turn();
        if !self.state.is_terminal() && self.state.budget_spent() {
            self.state.finish_on_points();
        }
        let record = TurnRecord { turn: self.state.turn(), player, from, moved, recoveries };
        self.history.push(record.clone());
        record
    }

    fn narrate_move(&self, player: PlayerId, outcome: &MoveOutcome) {
        let name = &self.state.player(player).name;
        let description = self
            .graph
            .edge(outcome.edge)
            .map(|e| e.description.as_str())
            .unwrap_or("?");
        info!("Turn {}: {} performed '{}'", self.state.turn() + 1, name, description);
        info!("moving to position {}", self.describe(outcome.next_node));
        for maneuver in outcome.maneuvers.iter() {
            info!("{} executed, {} wins {} points", maneuver, name, maneuver.points());
        }
    }

    fn narrate_result(&self) {
        match self.state.outcome() {
            MatchOutcome::WonByPoints { winner } => {
                info!("{} wins on points!", self.state.player(winner).name)
            }
            MatchOutcome::Tie => info!("It's a tie!"),
            _ => {}
        }
        info!("Match over! Final scores:");
        for p in self.state.players() {
            info!("{}: {}", p.name, p.score);
        }
    }

    fn describe(&self, node: NodeId) -> &str {
        self.graph.node(node).map(|p| p.description.as_str()).unwrap_or("?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::strategy::{RandomStrategy, ScriptedStrategy};
    use crate::graph::{GraphBuilder, Maneuver, NewTransition, Orientation, Position};

    const A: NodeId = NodeId(1);
    const B: NodeId = NodeId(2);
    const DEAD: NodeId = NodeId(3);
    const WIN: NodeId = NodeId(4);
    const CHOKE: NodeId = NodeId(5);
    const TAPPED: NodeId = NodeId(6);
    const HUB: NodeId = NodeId(7);

    /// Edge ids:
    /// - #0 A→B bottom only
    /// - #1 HUB→A open
    /// - #2 HUB→WIN top, swaps players
    /// - #3 HUB→CHOKE top
    /// - #4 CHOKE→TAPPED tap (bottom)
    /// - #5 HUB→HUB open, sweep (2)
    /// - #6 HUB→HUB top, pass (3)
    /// - #7 HUB→DEAD open
    fn graph() -> Arc<PositionGraph> {
        let mut b = GraphBuilder::new();
        b.add_position(Position::new(A, "closed guard")).unwrap();
        b.add_position(Position::new(B, "open guard")).unwrap();
        b.add_position(Position::new(DEAD, "scramble")).unwrap();
        b.add_position(Position::new(WIN, "crucifix choke").with_winner(Orientation::Top)).unwrap();
        b.add_position(Position::new(CHOKE, "rear naked choke")).unwrap();
        b.add_position(Position::new(TAPPED, "choke finished")).unwrap();
        b.add_position(Position::new(HUB, "standing")).unwrap();

        b.add_transition(NewTransition::new(0, A, B, "open guard").bottom()).unwrap();
        b.add_transition(NewTransition::new(1, HUB, A, "pull guard")).unwrap();
        b.add_transition(NewTransition::new(2, HUB, WIN, "crucifix roll").top().swapping())
            .unwrap();
        b.add_transition(NewTransition::new(3, HUB, CHOKE, "sink choke").top()).unwrap();
        b.add_transition(NewTransition::new(4, CHOKE, TAPPED, "tap").bottom().tap()).unwrap();
        b.add_transition(
            NewTransition::new(5, HUB, HUB, "duck under").maneuver(Maneuver::Sweep),
        )
        .unwrap();
        b.add_transition(
            NewTransition::new(6, HUB, HUB, "knee cut").top().maneuver(Maneuver::Pass),
        )
        .unwrap();
        b.add_transition(NewTransition::new(7, HUB, DEAD, "scramble")).unwrap();
        Arc::new(b.build().unwrap())
    }

    fn scripted(one: &[u32], two: &[u32]) -> [Box<dyn Strategy>; 2] {
        [
            Box::new(ScriptedStrategy::new(one.iter().map(|&e| EdgeId(e)))),
            Box::new(ScriptedStrategy::new(two.iter().map(|&e| EdgeId(e)))),
        ]
    }

    fn random() -> [Box<dyn Strategy>; 2] {
        [Box::new(RandomStrategy), Box::new(RandomStrategy)]
    }

    fn driver_at(
        node: NodeId,
        one: Orientation,
        strategies: [Box<dyn Strategy>; 2],
        max_turns: u32,
    ) -> MatchDriver {
        let state = MatchState::new(node, ["P1", "P2"], one, PlayerId::One, max_turns);
        let config = MatchConfig::default().with_max_turns(max_turns);
        MatchDriver::with_state(graph(), config, state, strategies, MatchRng::seed_from_u64(7))
            .unwrap()
    }

    #[test]
    fn test_no_legal_move_forces_switch() {
        // A's only exit is bottom-only; player one is on top.
        let mut d = driver_at(A, Orientation::Top, random(), 10);
        let record = d.play_turn().unwrap();

        assert_eq!(record.moved, None);
        assert_eq!(record.player, PlayerId::One);
        assert_eq!(d.state().current_node(), A);
        assert_eq!(d.state().active(), PlayerId::Two);
        assert_eq!(d.state().turn(), 1);
        assert!(!d.state().is_terminal());

        // Player two is bottom and can move.
        let record = d.play_turn().unwrap();
        assert_eq!(record.moved.unwrap().edge, EdgeId(0));
        assert_eq!(d.state().current_node(), B);
    }

    #[test]
    fn test_dead_end_recovery_keeps_player_and_turn() {
        let mut d = driver_at(DEAD, Orientation::Top, random(), 10);
        let record = d.play_turn().unwrap();

        assert!(record.recoveries >= 1);
        assert_eq!(record.player, PlayerId::One);
        assert_ne!(record.from, DEAD);
        // one turn for the move itself, none for the relocations
        assert_eq!(d.state().turn(), 1);
        assert_eq!(d.state().recoveries(), record.recoveries);
    }

    #[test]
    fn test_recovery_is_bounded() {
        let mut b = GraphBuilder::new();
        b.add_position(Position::new(NodeId(0), "nowhere")).unwrap();
        b.add_position(Position::new(NodeId(1), "also nowhere")).unwrap();
        let g = Arc::new(b.build().unwrap());
        let config = MatchConfig { max_recoveries_per_turn: 5, ..MatchConfig::default() };
        let state = MatchState::new(NodeId(0), ["P1", "P2"], Orientation::Top, PlayerId::One, 10);
        let rng = MatchRng::seed_from_u64(1);
        let mut d = MatchDriver::with_state(g, config, state, random(), rng).unwrap();

        let err = d.play_turn().unwrap_err();
        assert!(matches!(err, MatchError::RecoveryExhausted { attempts: 5, .. }));
        assert_eq!(d.state().turn(), 0);
    }

    #[test]
    fn test_tap_awards_opponent() {
        let mut d = driver_at(CHOKE, Orientation::Bottom, scripted(&[4], &[]), 10);
        let record = d.play_turn().unwrap();
        assert!(record.moved.unwrap().tapped);
        assert_eq!(d.state().outcome(), MatchOutcome::WonBySubmission { winner: PlayerId::Two });
        assert_eq!(d.play_turn().unwrap_err(), MatchError::MatchFinished);
    }

    #[test]
    fn test_position_win_uses_orientation_before_swap() {
        // Player one is top and rolls into a top-wins position with a
        // swapping transition; the win is resolved before any swap.
        let mut d = driver_at(HUB, Orientation::Top, scripted(&[2], &[]), 10);
        d.play_turn().unwrap();
        assert_eq!(d.state().outcome(), MatchOutcome::WonByPosition { winner: PlayerId::One });
        assert!(d.state().player(PlayerId::One).is_top());
    }

    #[test]
    fn test_swap_exchanges_orientation_and_passes_turn() {
        let mut b = GraphBuilder::new();
        b.add_position(Position::new(NodeId(0), "closed guard")).unwrap();
        b.add_position(Position::new(NodeId(1), "mount")).unwrap();
        b.add_transition(
            NewTransition::new(0, NodeId(0), NodeId(1), "hip bump")
                .bottom()
                .swapping()
                .maneuver(Maneuver::Sweep)
                .maneuver(Maneuver::Mount),
        )
        .unwrap();
        b.add_transition(NewTransition::new(1, NodeId(1), NodeId(0), "reset")).unwrap();
        let g = Arc::new(b.build().unwrap());

        let state =
            MatchState::new(NodeId(0), ["P1", "P2"], Orientation::Bottom, PlayerId::One, 10);
        let mut d = MatchDriver::with_state(
            g,
            MatchConfig::default(),
            state,
            scripted(&[0], &[]),
            MatchRng::seed_from_u64(3),
        )
        .unwrap();
        let record = d.play_turn().unwrap();

        assert_eq!(record.points(), 6);
        assert_eq!(d.state().scores(), [6, 0]);
        assert!(d.state().player(PlayerId::One).is_top());
        assert!(d.state().player(PlayerId::Two).is_bottom());
        assert_eq!(d.state().active(), PlayerId::Two);
    }

    #[test]
    fn test_illegal_choice_rejected_without_side_effects() {
        // Edge #6 is top-only; player one is bottom.
        let mut d = driver_at(HUB, Orientation::Bottom, scripted(&[6], &[]), 10);
        let before = d.state().clone();
        let err = d.play_turn().unwrap_err();
        assert_eq!(err, MatchError::IllegalMove { edge: EdgeId(6), node: HUB });
        assert_eq!(d.state(), &before);
        assert!(d.history().is_empty());
    }

    /// Node 0 has no exits; node 1 has an open loop (#0) and a bottom-only
    /// loop (#1). Player one starts on top at node 0.
    fn dead_end_driver(strategies: [Box<dyn Strategy>; 2]) -> MatchDriver {
        let mut b = GraphBuilder::new();
        b.add_position(Position::new(NodeId(0), "scramble")).unwrap();
        b.add_position(Position::new(NodeId(1), "half guard")).unwrap();
        b.add_transition(NewTransition::new(0, NodeId(1), NodeId(1), "pummel")).unwrap();
        b.add_transition(NewTransition::new(1, NodeId(1), NodeId(1), "knee shield").bottom())
            .unwrap();
        let g = Arc::new(b.build().unwrap());
        let state = MatchState::new(NodeId(0), ["P1", "P2"], Orientation::Top, PlayerId::One, 10);
        let rng = MatchRng::seed_from_u64(11);
        MatchDriver::with_state(g, MatchConfig::default(), state, strategies, rng).unwrap()
    }

    #[test]
    fn test_illegal_choice_at_dead_end_undoes_recovery() {
        let mut d = dead_end_driver(scripted(&[1], &[]));
        let before = d.state().clone();

        let err = d.play_turn().unwrap_err();
        assert_eq!(err, MatchError::IllegalMove { edge: EdgeId(1), node: NodeId(1) });
        assert_eq!(d.state(), &before);
        assert_eq!(d.state().current_node(), NodeId(0));
        assert_eq!(d.state().recoveries(), 0);
        assert!(d.history().is_empty());
    }

    #[test]
    fn test_play_turn_with_at_dead_end_undoes_recovery() {
        let mut d = dead_end_driver(random());
        let before = d.state().clone();

        let err = d.play_turn_with(EdgeId(1)).unwrap_err();
        assert_eq!(err, MatchError::IllegalMove { edge: EdgeId(1), node: NodeId(1) });
        assert_eq!(d.state(), &before);

        // the rollback also rewinds the rng, so a legal retry relocates the
        // same way and commits the recovery with the move
        let record = d.play_turn_with(EdgeId(0)).unwrap();
        assert!(record.recoveries >= 1);
        assert_eq!(record.from, NodeId(1));
        assert_eq!(d.state().recoveries(), record.recoveries);
        assert_eq!(d.state().turn(), 1);
    }

    #[test]
    fn test_play_turn_with_rejects_illegal() {
        let mut d = driver_at(HUB, Orientation::Bottom, random(), 10);
        assert!(d.play_turn_with(EdgeId(0)).is_err());
        assert!(d.play_turn_with(EdgeId(6)).is_err());
        let record = d.play_turn_with(EdgeId(5)).unwrap();
        assert_eq!(record.points(), 2);
        assert_eq!(d.state().active(), PlayerId::Two);
    }

    #[test]
    fn test_scores_equal_sum_of_turn_awards() {
        // Only the scoring self-loops are usable: no win, no dead end.
        let mut b = GraphBuilder::new();
        b.add_position(Position::new(HUB, "standing")).unwrap();
        b.add_transition(NewTransition::new(5, HUB, HUB, "duck under").maneuver(Maneuver::Sweep))
            .unwrap();
        b.add_transition(NewTransition::new(6, HUB, HUB, "knee cut").top().maneuver(Maneuver::Pass))
            .unwrap();
        b.add_transition(NewTransition::new(8, HUB, HUB, "pummel")).unwrap();
        let g = Arc::new(b.build().unwrap());

        let mut d = MatchDriver::new(g, MatchConfig::default().with_max_turns(40), random(), 99)
            .unwrap();
        let result = d.run().unwrap();

        assert_eq!(result.turns, 40);
        assert_eq!(d.history().len(), 40);
        let mut tally = [0u32; 2];
        for r in d.history() {
            tally[r.player.index()] += r.points();
        }
        assert_eq!(tally, result.scores);
        match result.outcome {
            MatchOutcome::WonByPoints { winner } => {
                assert!(result.scores[winner.index()] > result.scores[winner.other().index()])
            }
            MatchOutcome::Tie => assert_eq!(result.scores[0], result.scores[1]),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_turns_alternate_between_players() {
        let mut d = driver_at(HUB, Orientation::Top, scripted(&[5, 5], &[5, 5]), 4);
        d.run().unwrap();
        let players: Vec<_> = d.history().iter().map(|r| r.player).collect();
        assert_eq!(players, vec![PlayerId::One, PlayerId::Two, PlayerId::One, PlayerId::Two]);
        assert_eq!(d.state().outcome(), MatchOutcome::Tie);
    }

    #[test]
    fn test_same_seed_same_result() {
        let g = graph();
        let config = MatchConfig::default().with_hub(HUB);
        let a = MatchDriver::new(g.clone(), config.clone(), random(), 1234).unwrap().run().unwrap();
        let b = MatchDriver::new(g, config, random(), 1234).unwrap().run().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pass_turn_counts() {
        let mut d = driver_at(HUB, Orientation::Top, random(), 1);
        let record = d.pass_turn().unwrap();
        assert_eq!(record.moved, None);
        assert_eq!(d.state().outcome(), MatchOutcome::Tie);
    }
}
