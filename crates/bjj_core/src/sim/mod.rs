//! Batch simulation: many independent matches on a rayon pool.
//!
//! Match `i` is seeded with `seed + i`, so the results do not depend on the
//! thread count or scheduling order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SimulationConfig;
use crate::engine::{MatchDriver, MatchOutcome, MatchResult, PlayerId, Strategy};
use crate::error::{MatchError, Result};
use crate::graph::PositionGraph;

/// Below this many matches the pool overhead is not worth it.
const PARALLEL_THRESHOLD: u32 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub index: u32,
    pub seed: u64,
    pub result: MatchResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub created_at: DateTime<Utc>,
    pub matches: u32,
    pub player_names: [String; 2],
    pub wins: [u32; 2],
    pub ties: u32,
    pub submissions: u32,
    pub position_wins: u32,
    pub points_wins: u32,
    pub mean_turns: f64,
    pub min_turns: u32,
    pub max_turns: u32,
    pub mean_scores: [f64; 2],
    pub total_recoveries: u32,
}

impl SimulationSummary {
    pub fn from_records(records: &[MatchRecord]) -> Self {
        let mut summary = Self {
            created_at: Utc::now(),
            matches: records.len() as u32,
            player_names: records
                .first()
                .map(|r| r.result.player_names.clone())
                .unwrap_or_default(),
            wins: [0; 2],
            ties: 0,
            submissions: 0,
            position_wins: 0,
            points_wins: 0,
            mean_turns: 0.0,
            min_turns: records.iter().map(|r| r.result.turns).min().unwrap_or(0),
            max_turns: records.iter().map(|r| r.result.turns).max().unwrap_or(0),
            mean_scores: [0.0; 2],
            total_recoveries: 0,
        };

        let mut turns = 0u64;
        let mut scores = [0u64; 2];
        for r in records {
            let res = &r.result;
            match res.outcome {
                MatchOutcome::WonBySubmission { .. } => summary.submissions += 1,
                MatchOutcome::WonByPosition { .. } => summary.position_wins += 1,
                MatchOutcome::WonByPoints { .. } => summary.points_wins += 1,
                MatchOutcome::Tie => summary.ties += 1,
                MatchOutcome::Ongoing => {}
            }
            if let Some(w) = res.outcome.winner() {
                summary.wins[w.index()] += 1;
            }
            turns += u64::from(res.turns);
            scores[0] += u64::from(res.scores[0]);
            scores[1] += u64::from(res.scores[1]);
            summary.total_recoveries += res.recoveries;
        }

        if !records.is_empty() {
            let n = records.len() as f64;
            summary.mean_turns = turns as f64 / n;
            summary.mean_scores = [scores[0] as f64 / n, scores[1] as f64 / n];
        }
        summary
    }

    pub fn win_rate(&self, player: PlayerId) -> f64 {
        if self.matches == 0 {
            0.0
        } else {
            f64::from(self.wins[player.index()]) / f64::from(self.matches)
        }
    }
}

pub struct SimulationReport {
    pub records: Vec<MatchRecord>,
    pub summary: SimulationSummary,
}

pub struct Simulation {
    graph: Arc<PositionGraph>,
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(graph: Arc<PositionGraph>, config: SimulationConfig) -> Result<Self> {
        validator::Validate::validate(&config)
            .map_err(|e| MatchError::InvalidConfig(e.to_string()))?;
        config.match_config.validate_for(&graph)?;
        Ok(Self { graph, config })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Play every match. `strategies` builds a fresh strategy for each seat of
    /// each match.
    pub fn run<F>(&self, strategies: F) -> Result<SimulationReport>
    where
        F: Fn(PlayerId) -> Box<dyn Strategy> + Sync,
    {
        let n = self.config.num_matches;
        info!(matches = n, seed = self.config.seed, "Running simulation");

        let records = match self.config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| MatchError::WorkerPool(e.to_string()))?;
                pool.install(|| self.play_all(n, &strategies))?
            }
            None => self.play_all(n, &strategies)?,
        };

        let summary = SimulationSummary::from_records(&records);
        info!(
            matches = summary.matches,
            ties = summary.ties,
            mean_turns = summary.mean_turns,
            "{} wins {}, {} wins {}",
            summary.player_names[0],
            summary.wins[0],
            summary.player_names[1],
            summary.wins[1]
        );
        Ok(SimulationReport { records, summary })
    }

    fn play_all<F>(&self, n: u32, strategies: &F) -> Result<Vec<MatchRecord>>
    where
        F: Fn(PlayerId) -> Box<dyn Strategy> + Sync,
    {
        if n > PARALLEL_THRESHOLD {
            (0..n).into_par_iter().map(|i| self.play_one(i, strategies)).collect()
        } else {
            (0..n).map(|i| self.play_one(i, strategies)).collect()
        }
    }

    fn play_one<F>(&self, index: u32, strategies: &F) -> Result<MatchRecord>
    where
        F: Fn(PlayerId) -> Box<dyn Strategy> + Sync,
    {
        let seed = self.config.seed.wrapping_add(u64::from(index));
        let mut driver = MatchDriver::new(
            Arc::clone(&self.graph),
            self.config.match_config.clone(),
            [strategies(PlayerId::One), strategies(PlayerId::Two)],
            seed,
        )?;
        let result = driver.run()?;
        Ok(MatchRecord { index, seed, result })
    }
}
