//! Turn-state-machine engine.
//!
//! - `rewards`: maneuver → points table
//! - `resolver`: legal move generation and move application
//! - `match_state`: per-match state and outcome state machine
//! - `strategy`: pluggable move selection
//! - `driver`: turn loop, dead-end recovery, termination

pub mod driver;
pub mod match_state;
pub mod resolver;
pub mod rewards;
pub mod strategy;

pub use driver::{MatchDriver, MatchResult, TurnRecord};
pub use match_state::{MatchOutcome, MatchState, PlayerId, PlayerSlot};
pub use resolver::{LegalMove, MoveOutcome, TurnResolver};
pub use rewards::{points_for, REWARD_TABLE};
pub use strategy::{
    DecisionContext, MatchRng, MovePolicy, PolicyStrategy, RandomStrategy, ScriptedStrategy,
    Strategy,
};
