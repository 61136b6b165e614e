//! # Configuration
//!
//! Match, simulation and training settings. Every struct has sane defaults
//! (`#[serde(default)]`), so a config file only needs the keys it changes.
//!
//! ```rust
//! use bjj_core::config::MatchConfig;
//!
//! let config = MatchConfig::default();
//! let training = MatchConfig::training();
//! assert!(training.max_turns < config.max_turns);
//! ```

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
pub use validator::Validate;

use crate::error::{ConfigError, MatchError};
use crate::graph::{NodeId, PositionGraph};

pub const DEFAULT_MAX_TURNS: u32 = 100;
pub const DEFAULT_HUB_PROBABILITY: f64 = 0.5;
pub const DEFAULT_MAX_RECOVERIES: u32 = 64;

// ============================================================================
// MatchConfig
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MatchConfig {
    /// Turn budget; the match is settled on points when it runs out.
    #[validate(range(min = 1, max = 1_000_000))]
    pub max_turns: u32,

    /// Canonical starting position (e.g. symmetric staggered standing).
    pub hub_node: Option<NodeId>,

    /// Chance of starting at `hub_node` instead of a uniform random position.
    #[validate(range(min = 0.0, max = 1.0))]
    pub hub_probability: f64,

    /// Dead-end relocations allowed within a single turn before the turn
    /// fails with `RecoveryExhausted`.
    #[validate(range(min = 1))]
    pub max_recoveries_per_turn: u32,

    #[validate(length(min = 1))]
    pub player_one: String,

    #[validate(length(min = 1))]
    pub player_two: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            hub_node: None,
            hub_probability: DEFAULT_HUB_PROBABILITY,
            max_recoveries_per_turn: DEFAULT_MAX_RECOVERIES,
            player_one: "Player 1".to_string(),
            player_two: "Player 2".to_string(),
        }
    }
}

impl MatchConfig {
    /// Shorter matches, always random starts. Used for RL episodes.
    pub fn training() -> Self {
        Self { max_turns: 50, hub_probability: 0.0, ..Self::default() }
    }

    pub fn with_hub(mut self, hub: NodeId) -> Self {
        self.hub_node = Some(hub);
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Field validation plus checks against the graph the match will use.
    pub fn validate_for(&self, graph: &PositionGraph) -> Result<(), MatchError> {
        self.validate().map_err(|e| MatchError::InvalidConfig(e.to_string()))?;
        if let Some(hub) = self.hub_node {
            if !graph.contains(hub) {
                return Err(MatchError::InvalidConfig(format!(
                    "hub position {hub} is not in the graph"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SimulationConfig
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SimulationConfig {
    #[validate]
    pub match_config: MatchConfig,

    #[validate(range(min = 1))]
    pub num_matches: u32,

    /// Match `i` is seeded with `seed + i`.
    pub seed: u64,

    /// Worker threads; `None` uses the global rayon pool.
    #[validate(range(min = 1))]
    pub threads: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { match_config: MatchConfig::default(), num_matches: 100, seed: 0, threads: None }
    }
}

// ============================================================================
// TrainingConfig
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrainingConfig {
    #[validate]
    pub match_config: MatchConfig,

    #[validate(range(min = 1))]
    pub episodes: u32,

    #[validate(range(min = 0.0, max = 1.0))]
    pub learning_rate: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub discount_factor: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub exploration_rate: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub exploration_decay: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub exploration_min: f64,

    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            match_config: MatchConfig::training(),
            episodes: 1_000,
            learning_rate: 0.1,
            discount_factor: 0.95,
            exploration_rate: 1.0,
            exploration_decay: 0.995,
            exploration_min: 0.01,
            seed: 0,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load and validate a config from `.yaml`/`.yml` or `.json`.
pub fn load_config<T>(path: &Path) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Validate,
{
    let text = fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    let config: T = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&text)?,
        "json" => serde_json::from_str(&text)?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };
    config.validate()?;
    Ok(config)
}
