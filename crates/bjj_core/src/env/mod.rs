//! Gym-style RL environment over the match engine.
//!
//! - action space: every transition in the graph, indexed by `EdgeId`
//! - action mask: the acting player's legal moves at the current position
//! - observation: taken from the perspective of the player about to act
//! - both players are driven through `step` (self-play)
//!
//! Reward for the player who just acted:
//!
//! | term                 | value                  |
//! |----------------------|------------------------|
//! | won the match        | +300                   |
//! | lost the match       | -300                   |
//! | point difference     | own score - opponent's |
//! | on top after move    | +0.5                   |
//! | action outside mask  | -1 (replaces the rest) |

pub mod qlearning;

pub use qlearning::{QLearner, QPolicy, QTable, TrainingReport};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MatchConfig;
use crate::engine::{MatchDriver, MatchOutcome, PlayerId, RandomStrategy, Strategy};
use crate::error::{MatchError, Result};
use crate::graph::{EdgeId, NodeId, PositionGraph};

pub const WIN_REWARD: f64 = 300.0;
pub const ILLEGAL_ACTION_REWARD: f64 = -1.0;
pub const TOP_POSITION_BONUS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub current_position: NodeId,
    pub point_difference: i64,
    pub on_top: u8,
    pub on_bottom: u8,
    pub turns_left: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub action_mask: Vec<bool>,
    pub active_player: PlayerId,
    pub turn: u32,
    pub outcome: MatchOutcome,
    pub illegal_action: bool,
    /// Dead-end relocations performed after the step.
    pub recoveries: u32,
}

impl StepInfo {
    pub fn legal_actions(&self) -> Vec<usize> {
        self.action_mask.iter().enumerate().filter(|(_, &ok)| ok).map(|(i, _)| i).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    /// Always false: an exhausted turn budget is a points decision.
    pub truncated: bool,
    pub info: StepInfo,
}

pub struct BjjEnv {
    graph: Arc<PositionGraph>,
    config: MatchConfig,
    driver: MatchDriver,
    next_seed: u64,
}

impl BjjEnv {
    pub fn new(graph: Arc<PositionGraph>, config: MatchConfig, seed: u64) -> Result<Self> {
        let mut driver = Self::fresh_driver(&graph, &config, seed)?;
        driver.settle()?;
        Ok(Self { graph, config, driver, next_seed: seed.wrapping_add(1) })
    }

    fn fresh_driver(
        graph: &Arc<PositionGraph>,
        config: &MatchConfig,
        seed: u64,
    ) -> Result<MatchDriver> {
        // Strategies are unused: every move comes through `step`.
        let strategies: [Box<dyn Strategy>; 2] =
            [Box::new(RandomStrategy), Box::new(RandomStrategy)];
        MatchDriver::new(Arc::clone(graph), config.clone(), strategies, seed)
    }

    pub fn num_actions(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn graph(&self) -> &Arc<PositionGraph> {
        &self.graph
    }

    pub fn driver(&self) -> &MatchDriver {
        &self.driver
    }

    pub fn is_done(&self) -> bool {
        self.driver.state().is_terminal()
    }

    /// Start a new episode. Without a seed, episodes draw consecutive seeds
    /// from the one passed to `new`.
    pub fn reset(&mut self, seed: Option<u64>) -> Result<(Observation, StepInfo)> {
        let seed = seed.unwrap_or(self.next_seed);
        self.next_seed = seed.wrapping_add(1);
        self.driver = Self::fresh_driver(&self.graph, &self.config, seed)?;
        let recoveries = self.driver.settle()?;
        Ok((self.observation(), self.info(false, recoveries)))
    }

    pub fn step(&mut self, action: usize) -> Result<StepResult> {
        if self.is_done() {
            return Err(MatchError::MatchFinished);
        }
        let acting = self.driver.state().active();

        let illegal = match self.edge_for(action) {
            Some(edge) => match self.driver.play_turn_with(edge) {
                Ok(_) => false,
                Err(e) if e.is_caller_error() => true,
                Err(e) => return Err(e),
            },
            None => true,
        };
        if illegal {
            debug!(action, "action outside mask; turn passes");
            self.driver.pass_turn()?;
        }

        let reward = if illegal { ILLEGAL_ACTION_REWARD } else { self.reward_for(acting) };
        self.finish_step(reward, illegal)
    }

    /// Pass without acting. Only allowed when the acting player's mask is
    /// empty; otherwise `PassWithLegalMoves` is returned and nothing changes.
    pub fn pass(&mut self) -> Result<StepResult> {
        if self.is_done() {
            return Err(MatchError::MatchFinished);
        }
        let available = self.action_mask().iter().filter(|&&ok| ok).count();
        if available > 0 {
            let node = self.driver.state().current_node();
            return Err(MatchError::PassWithLegalMoves { node, available });
        }
        let acting = self.driver.state().active();
        self.driver.pass_turn()?;
        let reward = if self.is_done() { self.reward_for(acting) } else { 0.0 };
        self.finish_step(reward, false)
    }

    fn finish_step(&mut self, reward: f64, illegal: bool) -> Result<StepResult> {
        let recoveries = if self.is_done() { 0 } else { self.driver.settle()? };
        Ok(StepResult {
            observation: self.observation(),
            reward,
            done: self.is_done(),
            truncated: false,
            info: self.info(illegal, recoveries),
        })
    }

    fn edge_for(&self, action: usize) -> Option<EdgeId> {
        (action < self.num_actions()).then(|| EdgeId(action as u32))
    }

    fn reward_for(&self, player: PlayerId) -> f64 {
        let state = self.driver.state();
        let mut reward = 0.0;
        match state.winner() {
            Some(w) if w == player => reward += WIN_REWARD,
            Some(_) => reward -= WIN_REWARD,
            None => {}
        }
        reward += state.point_difference(player) as f64;
        if state.player(player).is_top() {
            reward += TOP_POSITION_BONUS;
        }
        reward
    }

    /// Observation for the player about to act.
    pub fn observation(&self) -> Observation {
        let state = self.driver.state();
        let active = state.active();
        let me = state.player(active);
        Observation {
            current_position: state.current_node(),
            point_difference: state.point_difference(active),
            on_top: u8::from(me.is_top()),
            on_bottom: u8::from(me.is_bottom()),
            turns_left: state.turns_left(),
        }
    }

    /// `true` at every edge index the acting player may take. All false once
    /// the match is over.
    pub fn action_mask(&self) -> Vec<bool> {
        let mut mask = vec![false; self.num_actions()];
        if self.is_done() {
            return mask;
        }
        let state = self.driver.state();
        let orientation = state.active_player().orientation;
        for mv in self.driver.resolver().legal_moves(state.current_node(), orientation) {
            mask[mv.edge.index()] = true;
        }
        mask
    }

    fn info(&self, illegal_action: bool, recoveries: u32) -> StepInfo {
        let state = self.driver.state();
        StepInfo {
            action_mask: self.action_mask(),
            active_player: state.active(),
            turn: state.turn(),
            outcome: state.outcome(),
            illegal_action,
            recoveries,
        }
    }

    /// Human-readable snapshot.
    pub fn render(&self) -> String {
        let state = self.driver.state();
        let position = self
            .graph
            .node(state.current_node())
            .map(|p| p.description.as_str())
            .unwrap_or("?");
        let [one, two] = state.players();
        format!(
            "Current position: {}\n{} points: {}, {} points: {}\n{} is on {}\nTurn count: {}",
            position,
            one.name,
            one.score,
            two.name,
            two.score,
            one.name,
            one.orientation,
            state.turn()
        )
    }
}
