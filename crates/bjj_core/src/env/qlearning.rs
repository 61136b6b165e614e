//! Tabular Q-learning over [`BjjEnv`].
//!
//! State is `(position, on_top)` for the player about to act, so the table
//! has `2 * positions` rows and one column per transition. Both players
//! share the table (self-play).

use std::path::Path;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{BjjEnv, Observation};
use crate::config::TrainingConfig;
use crate::engine::{DecisionContext, LegalMove, MatchOutcome, MovePolicy, PolicyStrategy};
use crate::error::{ConfigError, MatchError, Result};
use crate::graph::{NodeId, PositionGraph};

/// Greedy (or epsilon-greedy) player backed by a shared table.
pub type QPolicy = PolicyStrategy<Arc<QTable>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    /// Row order: state `2 * i + on_top` belongs to `node_ids[i]`.
    node_ids: Vec<NodeId>,
    num_actions: usize,
    values: Vec<f64>,
}

impl QTable {
    /// Zero-initialised table shaped for `graph`.
    pub fn new(graph: &PositionGraph) -> Self {
        let mut node_ids: Vec<NodeId> = graph.node_ids().collect();
        node_ids.sort_unstable();
        let num_actions = graph.edge_count();
        let values = vec![0.0; node_ids.len() * 2 * num_actions];
        Self { node_ids, num_actions, values }
    }

    pub fn num_states(&self) -> usize {
        self.node_ids.len() * 2
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Same positions and transition count as `graph`.
    pub fn fits(&self, graph: &PositionGraph) -> bool {
        self.num_actions == graph.edge_count()
            && self.node_ids.len() == graph.node_count()
            && self.node_ids.iter().all(|id| graph.contains(*id))
    }

    pub fn state_index(&self, node: NodeId, on_top: bool) -> Option<usize> {
        self.node_ids.binary_search(&node).ok().map(|slot| slot * 2 + usize::from(on_top))
    }

    pub fn state_of(&self, obs: &Observation) -> Option<usize> {
        self.state_index(obs.current_position, obs.on_top == 1)
    }

    pub fn get(&self, state: usize, action: usize) -> f64 {
        self.values.get(state * self.num_actions + action).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, state: usize, action: usize, value: f64) {
        if let Some(v) = self.values.get_mut(state * self.num_actions + action) {
            *v = value;
        }
    }

    /// Highest-valued action among those allowed by `mask`; first wins on ties.
    pub fn best_action(&self, state: usize, mask: &[bool]) -> Option<usize> {
        mask.iter()
            .enumerate()
            .filter(|(_, &ok)| ok)
            .map(|(a, _)| (a, self.get(state, a)))
            .fold(None, |best: Option<(usize, f64)>, (a, q)| match best {
                Some((_, bq)) if bq >= q => best,
                _ => Some((a, q)),
            })
            .map(|(a, _)| a)
    }

    /// Max Q over the masked actions, 0 when none is allowed.
    pub fn best_value(&self, state: usize, mask: &[bool]) -> f64 {
        self.best_action(state, mask).map_or(0.0, |a| self.get(state, a))
    }

    /// `Q(s,a) += lr * (target - Q(s,a))`
    pub fn update(&mut self, state: usize, action: usize, target: f64, learning_rate: f64) {
        let q = self.get(state, action);
        self.set(state, action, q + learning_rate * (target - q));
    }

    pub fn save(&self, path: &Path) -> std::result::Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
    }

    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl MovePolicy for QTable {
    fn score(&self, ctx: &DecisionContext<'_>, mv: &LegalMove) -> f64 {
        self.state_index(ctx.node(), ctx.orientation().is_top())
            .map_or(0.0, |s| self.get(s, mv.edge.index()))
    }
}

// ============================================================================
// Trainer
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub episodes: u32,
    /// Mean per-episode sum of rewards (both players).
    pub mean_reward: f64,
    pub mean_turns: f64,
    pub submissions: u32,
    pub position_wins: u32,
    pub points_wins: u32,
    pub ties: u32,
    pub illegal_actions: u64,
    pub final_exploration_rate: f64,
}

pub struct QLearner {
    table: QTable,
    config: TrainingConfig,
    exploration_rate: f64,
    rng: ChaCha8Rng,
}

impl QLearner {
    pub fn new(graph: &PositionGraph, config: TrainingConfig) -> Self {
        Self::with_table(QTable::new(graph), config)
    }

    /// Continue training an existing table.
    pub fn with_table(table: QTable, config: TrainingConfig) -> Self {
        // separate stream from the env's match seeds
        let rng = ChaCha8Rng::seed_from_u64(config.seed ^ 0x5eed_a11e);
        Self { exploration_rate: config.exploration_rate, table, config, rng }
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn into_table(self) -> QTable {
        self.table
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    /// Epsilon-greedy over the legal actions.
    fn choose(&mut self, state: usize, mask: &[bool]) -> Option<usize> {
        if self.rng.gen::<f64>() < self.exploration_rate {
            let legal: Vec<usize> =
                mask.iter().enumerate().filter(|(_, &ok)| ok).map(|(a, _)| a).collect();
            legal.choose(&mut self.rng).copied()
        } else {
            self.table.best_action(state, mask)
        }
    }

    /// Run `config.episodes` episodes on `env`. Episode `i` uses match seed
    /// `config.seed + i`; exploration decays once per episode.
    pub fn train(&mut self, env: &mut BjjEnv) -> Result<TrainingReport> {
        if !self.table.fits(env.graph()) {
            return Err(MatchError::InvalidConfig(
                "Q-table shape does not match the position graph".to_string(),
            ));
        }
        let lr = self.config.learning_rate;
        let gamma = self.config.discount_factor;
        let mut report = TrainingReport { episodes: self.config.episodes, ..Default::default() };
        let mut total_reward = 0.0;
        let mut total_turns = 0u64;

        for episode in 0..self.config.episodes {
            let seed = self.config.seed.wrapping_add(u64::from(episode));
            let (mut obs, mut info) = env.reset(Some(seed))?;
            let mut episode_reward = 0.0;

            while !env.is_done() {
                let state = self
                    .table
                    .state_of(&obs)
                    .ok_or(MatchError::UnknownNode(obs.current_position))?;
                let step = match self.choose(state, &info.action_mask) {
                    Some(action) => {
                        let step = env.step(action)?;
                        let mask = &step.info.action_mask;
                        let future = if step.done {
                            0.0
                        } else {
                            self.table
                                .state_of(&step.observation)
                                .map_or(0.0, |next| self.table.best_value(next, mask))
                        };
                        self.table.update(state, action, step.reward + gamma * future, lr);
                        step
                    }
                    None => env.pass()?,
                };
                if step.info.illegal_action {
                    report.illegal_actions += 1;
                }
                episode_reward += step.reward;
                obs = step.observation;
                info = step.info;
            }

            match info.outcome {
                MatchOutcome::WonBySubmission { .. } => report.submissions += 1,
                MatchOutcome::WonByPosition { .. } => report.position_wins += 1,
                MatchOutcome::WonByPoints { .. } => report.points_wins += 1,
                MatchOutcome::Tie => report.ties += 1,
                MatchOutcome::Ongoing => {}
            }
            total_reward += episode_reward;
            total_turns += u64::from(info.turn);

            let decayed = self.exploration_rate * self.config.exploration_decay;
            self.exploration_rate = decayed.max(self.config.exploration_min);

            if (episode + 1) % 100 == 0 {
                info!(
                    episode = episode + 1,
                    epsilon = self.exploration_rate,
                    "Episode {}: total reward {:.1}",
                    episode + 1,
                    episode_reward
                );
            } else {
                debug!(
                    episode = episode + 1,
                    reward = episode_reward,
                    turns = info.turn,
                    "episode done"
                );
            }
        }

        let n = f64::from(self.config.episodes.max(1));
        report.mean_reward = total_reward / n;
        report.mean_turns = total_turns as f64 / n;
        report.final_exploration_rate = self.exploration_rate;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::engine::{MatchState, PlayerId};
    use crate::graph::{EdgeId, GraphBuilder, Maneuver, NewTransition, Orientation, Position};

    /// Top can score 4 by mounting or 0 by stalling; bottom can only stall
    /// or escape the mount.
    fn graph() -> PositionGraph {
        let mut b = GraphBuilder::new();
        b.add_position(Position::new(NodeId(10), "side control")).unwrap();
        b.add_position(Position::new(NodeId(20), "mount").with_tags(["mount"])).unwrap();
        b.add_transition(NewTransition::new(0, NodeId(10), NodeId(10), "stall")).unwrap();
        b.add_transition(
            NewTransition::new(1, NodeId(10), NodeId(20), "step over")
                .top()
                .maneuver(Maneuver::Mount),
        )
        .unwrap();
        b.add_transition(NewTransition::new(2, NodeId(20), NodeId(10), "shrimp out").bottom())
            .unwrap();
        b.add_transition(NewTransition::new(3, NodeId(20), NodeId(20), "hold")).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_state_index_layout() {
        let t = QTable::new(&graph());
        assert_eq!(t.num_states(), 4);
        assert_eq!(t.num_actions(), 4);
        assert_eq!(t.state_index(NodeId(10), false), Some(0));
        assert_eq!(t.state_index(NodeId(10), true), Some(1));
        assert_eq!(t.state_index(NodeId(20), true), Some(3));
        assert_eq!(t.state_index(NodeId(99), true), None);
    }

    #[test]
    fn test_best_action_respects_mask() {
        let mut t = QTable::new(&graph());
        t.set(1, 0, 5.0);
        t.set(1, 1, 9.0);
        assert_eq!(t.best_action(1, &[true, true, false, false]), Some(1));
        assert_eq!(t.best_action(1, &[true, false, false, false]), Some(0));
        assert_eq!(t.best_action(1, &[false; 4]), None);
        assert_eq!(t.best_value(1, &[false; 4]), 0.0);
    }

    #[test]
    fn test_update_moves_toward_target() {
        let mut t = QTable::new(&graph());
        t.update(0, 0, 10.0, 0.5);
        assert_eq!(t.get(0, 0), 5.0);
        t.update(0, 0, 10.0, 0.5);
        assert_eq!(t.get(0, 0), 7.5);
    }

    #[test]
    fn test_policy_scores_from_table() {
        let g = graph();
        let mut t = QTable::new(&g);
        t.set(1, 1, 3.0);
        let state = MatchState::new(NodeId(10), ["A", "B"], Orientation::Top, PlayerId::One, 10);
        let ctx = DecisionContext { graph: &g, state: &state, player: PlayerId::One };
        let mv = LegalMove { edge: EdgeId(1), to: NodeId(20) };
        assert_eq!(t.score(&ctx, &mv), 3.0);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        let mut t = QTable::new(&graph());
        t.set(2, 3, -1.25);
        t.save(&path).unwrap();
        assert_eq!(QTable::load(&path).unwrap(), t);
    }

    #[test]
    fn test_training_updates_table() {
        let g = Arc::new(graph());
        let match_config = MatchConfig {
            hub_node: Some(NodeId(10)),
            hub_probability: 1.0,
            ..MatchConfig::training()
        };
        let config = TrainingConfig {
            match_config: match_config.with_max_turns(20),
            episodes: 200,
            exploration_rate: 0.5,
            exploration_decay: 0.99,
            seed: 3,
            ..TrainingConfig::default()
        };
        let mut env =
            BjjEnv::new(Arc::clone(&g), config.match_config.clone(), config.seed).unwrap();
        let mut learner = QLearner::new(&g, config);
        let report = learner.train(&mut env).unwrap();

        assert_eq!(report.episodes, 200);
        assert_eq!(report.illegal_actions, 0);
        let decided = report.submissions + report.position_wins + report.points_wins;
        assert_eq!(decided + report.ties, 200);
        assert!(report.final_exploration_rate < 0.5);

        let t = learner.table();
        assert_ne!(t, &QTable::new(&g));
        // the mount is worth at least its 4 points plus the top bonus up front
        let top_side = t.state_index(NodeId(10), true).unwrap();
        assert_ne!(t.get(top_side, 1), 0.0);
    }

    #[test]
    fn test_mismatched_table_rejected() {
        let g = Arc::new(graph());
        let mut other = GraphBuilder::new();
        other.add_position(Position::new(NodeId(10), "only")).unwrap();
        let small = QTable::new(&other.build().unwrap());
        let mut env = BjjEnv::new(Arc::clone(&g), MatchConfig::training(), 0).unwrap();
        let mut learner = QLearner::with_table(small, TrainingConfig::default());
        assert!(matches!(learner.train(&mut env), Err(MatchError::InvalidConfig(_))));
    }
}
