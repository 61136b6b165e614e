//! bjj - grappling match engine CLI
//!
//! - `play`: one narrated match
//! - `simulate`: batch of matches with an aggregate summary
//! - `train`: tabular Q-learning, writes the table as JSON
//! - `inspect`: graph shape and reward annotations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bjj_core::config::{load_config, MatchConfig, SimulationConfig, TrainingConfig};
use bjj_core::engine::{PlayerId, RandomStrategy, Strategy};
use bjj_core::graph::{
    load_graph, AnnotationReport, GraphPaths, GraphStats, LoadedGraph, NodeId,
};
use bjj_core::{BjjEnv, MatchDriver, QLearner, QPolicy, QTable, Simulation};

#[derive(Parser)]
#[command(name = "bjj")]
#[command(about = "Graph-based grappling match engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Directory holding nodes.json, transitions.json and (optionally)
    /// terminal_node_winstate.json
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// More output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the summary as JSON on stdout
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one match and narrate it
    Play {
        /// Match config (.yaml/.yml/.json)
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "0")]
        seed: u64,

        #[arg(long)]
        max_turns: Option<u32>,

        /// Q-table JSON; players using `policy` play greedily from it
        #[arg(long)]
        policy: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "random")]
        player_one: Brain,

        #[arg(long, value_enum, default_value = "random")]
        player_two: Brain,
    },

    /// Run many matches in parallel
    Simulate {
        /// Simulation config (.yaml/.yml/.json)
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        matches: Option<u32>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        threads: Option<usize>,

        #[arg(long)]
        max_turns: Option<u32>,

        #[arg(long)]
        policy: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "random")]
        player_one: Brain,

        #[arg(long, value_enum, default_value = "random")]
        player_two: Brain,

        /// Write every match result as JSON
        #[arg(long)]
        records: Option<PathBuf>,
    },

    /// Train a Q-table by self-play
    Train {
        /// Training config (.yaml/.yml/.json)
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        episodes: Option<u32>,

        #[arg(long)]
        seed: Option<u64>,

        /// Continue from an existing table
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Output Q-table JSON path
        #[arg(long, default_value = "q_table.json")]
        out: PathBuf,
    },

    /// Show graph statistics
    Inspect {
        /// Also list the transitions leaving this position
        #[arg(long)]
        node: Option<u32>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Brain {
    Random,
    Policy,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let loaded = load(&cli.global.data_dir)?;

    match cli.command {
        Commands::Play { config, seed, max_turns, policy, player_one, player_two } => {
            let mut match_config = match config {
                Some(path) => read_config::<MatchConfig>(&path)?,
                None => MatchConfig::default(),
            };
            if let Some(turns) = max_turns {
                match_config.max_turns = turns;
            }
            let table = read_policy(policy.as_deref(), &loaded)?;
            let strategies = [
                brain(player_one, table.as_ref())?,
                brain(player_two, table.as_ref())?,
            ];

            let graph = Arc::new(loaded.graph);
            let mut driver = MatchDriver::new(graph, match_config, strategies, seed)?;
            let result = driver.run()?;

            if cli.global.json {
                print_json(&result)?;
            } else {
                println!("\nOutcome: {}", result.outcome.label());
                if let Some(name) = &result.winner_name {
                    println!("Winner:  {}", name);
                }
                println!(
                    "Scores:  {} {} - {} {}",
                    result.player_names[0],
                    result.scores[0],
                    result.scores[1],
                    result.player_names[1]
                );
                println!("Turns:   {}", result.turns);
            }
        }

        Commands::Simulate {
            config,
            matches,
            seed,
            threads,
            max_turns,
            policy,
            player_one,
            player_two,
            records,
        } => {
            let mut sim_config = match config {
                Some(path) => read_config::<SimulationConfig>(&path)?,
                None => SimulationConfig::default(),
            };
            if let Some(n) = matches {
                sim_config.num_matches = n;
            }
            if let Some(s) = seed {
                sim_config.seed = s;
            }
            if threads.is_some() {
                sim_config.threads = threads;
            }
            if let Some(turns) = max_turns {
                sim_config.match_config.max_turns = turns;
            }
            let table = read_policy(policy.as_deref(), &loaded)?.map(Arc::new);
            // fail early on a missing table rather than inside the pool
            brain(player_one, table.as_deref())?;
            brain(player_two, table.as_deref())?;

            let sim = Simulation::new(Arc::new(loaded.graph), sim_config)?;
            let report = sim.run(|seat| {
                let which = match seat {
                    PlayerId::One => player_one,
                    PlayerId::Two => player_two,
                };
                match (which, &table) {
                    (Brain::Policy, Some(t)) => {
                        Box::new(QPolicy::greedy(Arc::clone(t))) as Box<dyn Strategy>
                    }
                    _ => Box::new(RandomStrategy),
                }
            })?;

            if let Some(path) = records {
                write_json(&path, &report.records)?;
                info!("match records written to {}", path.display());
            }

            let s = &report.summary;
            if cli.global.json {
                print_json(s)?;
            } else {
                println!("\nMatches:      {}", s.matches);
                for seat in PlayerId::BOTH {
                    println!(
                        "{:<13} {} wins ({:.1}%), mean score {:.2}",
                        format!("{}:", s.player_names[seat.index()]),
                        s.wins[seat.index()],
                        s.win_rate(seat) * 100.0,
                        s.mean_scores[seat.index()]
                    );
                }
                println!("Ties:         {}", s.ties);
                println!(
                    "By method:    {} submission, {} position, {} points",
                    s.submissions, s.position_wins, s.points_wins
                );
                println!(
                    "Turns:        mean {:.1}, min {}, max {}",
                    s.mean_turns, s.min_turns, s.max_turns
                );
                println!("Recoveries:   {}", s.total_recoveries);
            }
        }

        Commands::Train { config, episodes, seed, resume, out } => {
            let mut train_config = match config {
                Some(path) => read_config::<TrainingConfig>(&path)?,
                None => TrainingConfig::default(),
            };
            if let Some(n) = episodes {
                train_config.episodes = n;
            }
            if let Some(s) = seed {
                train_config.seed = s;
            }

            let graph = Arc::new(loaded.graph);
            let mut learner = match resume {
                Some(path) => {
                    let table = QTable::load(&path)
                        .with_context(|| format!("loading Q-table {}", path.display()))?;
                    QLearner::with_table(table, train_config.clone())
                }
                None => QLearner::new(&graph, train_config.clone()),
            };
            let mut env = BjjEnv::new(
                Arc::clone(&graph),
                train_config.match_config.clone(),
                train_config.seed,
            )?;
            let report = learner.train(&mut env)?;

            learner
                .table()
                .save(&out)
                .with_context(|| format!("writing Q-table {}", out.display()))?;
            info!("Q-table written to {}", out.display());

            if cli.global.json {
                print_json(&report)?;
            } else {
                println!("\nEpisodes:      {}", report.episodes);
                println!("Mean reward:   {:.2}", report.mean_reward);
                println!("Mean turns:    {:.1}", report.mean_turns);
                println!(
                    "Outcomes:      {} submission, {} position, {} points, {} tie",
                    report.submissions, report.position_wins, report.points_wins, report.ties
                );
                println!("Final epsilon: {:.4}", report.final_exploration_rate);
                println!("Q-table:       {}", out.display());
            }
        }

        Commands::Inspect { node } => {
            let summary = InspectSummary {
                stats: loaded.graph.stats(),
                annotations: loaded.annotations.clone(),
            };
            if cli.global.json {
                print_json(&summary)?;
            } else {
                print_inspect(&summary);
            }
            if let Some(id) = node {
                print_outgoing(&loaded, NodeId(id))?;
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load(dir: &Path) -> Result<LoadedGraph> {
    load_graph(&GraphPaths::in_dir(dir))
        .with_context(|| format!("loading position graph from {}", dir.display()))
}

fn read_config<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned + bjj_core::config::Validate,
{
    load_config(path).with_context(|| format!("loading config {}", path.display()))
}

fn read_policy(path: Option<&Path>, loaded: &LoadedGraph) -> Result<Option<QTable>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let table =
        QTable::load(path).with_context(|| format!("loading Q-table {}", path.display()))?;
    if !table.fits(&loaded.graph) {
        anyhow::bail!("Q-table {} was trained on a different graph", path.display());
    }
    Ok(Some(table))
}

fn brain(which: Brain, table: Option<&QTable>) -> Result<Box<dyn Strategy>> {
    match (which, table) {
        (Brain::Random, _) => Ok(Box::new(RandomStrategy)),
        (Brain::Policy, Some(t)) => Ok(Box::new(QPolicy::greedy(Arc::new(t.clone())))),
        (Brain::Policy, None) => {
            anyhow::bail!("--policy <Q-table JSON> is required for a policy player")
        }
    }
}

#[derive(Serialize)]
struct InspectSummary {
    stats: GraphStats,
    annotations: AnnotationReport,
}

fn print_inspect(s: &InspectSummary) {
    let st = &s.stats;
    let an = &s.annotations;
    println!("Positions:         {}", st.positions);
    println!("Transitions:       {} ({} reversible)", st.transitions, st.reversible);
    println!("Terminal:          {} ({} dead ends)", st.terminal_positions, st.dead_ends);
    println!("Win positions:     {}", st.win_positions);
    println!("Taps:              {}", st.taps);
    println!("Player swaps:      {}", st.swaps);
    println!("Scoring edges:     {}", st.scoring);
    println!(
        "Maneuvers:         sweep {}, mount {}, back {}, throw {}, takedown {}, pass {}",
        an.sweep, an.mount, an.back, an.throw, an.takedown, an.pass
    );
}

fn print_outgoing(loaded: &LoadedGraph, id: NodeId) -> Result<()> {
    let g = &loaded.graph;
    let position = g.get_node(id)?;
    println!("\n[{}] {}", id, position.description);
    if let Some(w) = position.winner {
        println!("  winning position for {}", w);
    }
    for summary in g.outgoing_edges(id) {
        let Some(edge) = g.edge(summary.transition) else {
            continue;
        };
        let who = if edge.top {
            "top"
        } else if edge.bottom {
            "bottom"
        } else {
            "either"
        };
        let mut flags = Vec::new();
        if edge.tap {
            flags.push("tap".to_string());
        }
        if edge.swaps_players {
            flags.push("swap".to_string());
        }
        flags.extend(edge.maneuvers.iter().map(|m| m.to_string()));
        println!(
            "  #{:<4} -> [{}] {:<32} {:<6} {}",
            edge.id,
            edge.to,
            edge.description,
            who,
            flags.join(", ")
        );
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
