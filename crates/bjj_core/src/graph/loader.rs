//! JSON ingestion of GrappleMap-derived position and transition lists.
//!
//! Input documents:
//!
//! - `nodes.json`: `[{id, description, tags, properties, ...}]`
//! - `transitions.json`: `[{id, description, properties, tags,
//!   from: {node, reo: {swap_players}}, to: {node, reo: {swap_players}}}]`
//! - `terminal_node_winstate.json` (optional): `[{node, winner}]`
//!
//! Keys the engine does not use (3D `position` data, `frames`, `line_nr`,
//! pre-computed `incoming`/`outgoing`) are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use super::annotate::{annotate, AnnotationReport, WinAnnotation};
use super::builder::{GraphBuilder, NewTransition};
use super::types::{NodeId, Position};
use super::PositionGraph;
use crate::error::GraphError;

pub const NODES_FILE: &str = "nodes.json";
pub const TRANSITIONS_FILE: &str = "transitions.json";
pub const WINS_FILE: &str = "terminal_node_winstate.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphPaths {
    pub nodes: PathBuf,
    pub transitions: PathBuf,
    pub wins: Option<PathBuf>,
}

impl GraphPaths {
    /// Standard file names inside `dir`. The win list is used only if present.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let wins = dir.join(WINS_FILE);
        Self {
            nodes: dir.join(NODES_FILE),
            transitions: dir.join(TRANSITIONS_FILE),
            wins: wins.exists().then_some(wins),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedGraph {
    pub graph: PositionGraph,
    pub annotations: AnnotationReport,
}

// ============================================================================
// Wire records
// ============================================================================

#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: u32,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    properties: Vec<String>,
    #[serde(default = "default_explicit")]
    is_explicit_position: bool,
}

fn default_explicit() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Description {
    One(String),
    Many(Vec<String>),
}

impl Description {
    /// A list carries the name first, followed by free-text notes.
    fn into_name(self) -> String {
        match self {
            Description::One(s) => s,
            Description::Many(v) => v.into_iter().next().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Reorientation {
    #[serde(default)]
    swap_players: bool,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    node: u32,
    #[serde(default)]
    reo: Reorientation,
}

#[derive(Debug, Deserialize)]
struct TransitionRecord {
    id: i64,
    description: Description,
    #[serde(default)]
    properties: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    from: Endpoint,
    to: Endpoint,
}

// ============================================================================
// Entry points
// ============================================================================

pub fn load_graph(paths: &GraphPaths) -> Result<LoadedGraph, GraphError> {
    let nodes = read(&paths.nodes)?;
    let transitions = read(&paths.transitions)?;
    let wins = match &paths.wins {
        Some(p) => Some(read(p)?),
        None => None,
    };
    let loaded = graph_from_json_str(&nodes, &transitions, wins.as_deref())?;
    let stats = loaded.graph.stats();
    info!(
        positions = stats.positions,
        transitions = stats.transitions,
        dead_ends = stats.dead_ends,
        taps = stats.taps,
        "position graph loaded from {}",
        paths.nodes.display()
    );
    Ok(loaded)
}

pub fn graph_from_json_str(
    nodes_json: &str,
    transitions_json: &str,
    wins_json: Option<&str>,
) -> Result<LoadedGraph, GraphError> {
    let nodes: Vec<NodeRecord> = serde_json::from_str(nodes_json)?;
    let transitions: Vec<TransitionRecord> = serde_json::from_str(transitions_json)?;
    let wins: Vec<WinAnnotation> = match wins_json {
        Some(s) => serde_json::from_str(s)?,
        None => Vec::new(),
    };

    let mut builder = GraphBuilder::new();
    for n in nodes {
        let mut position = Position::new(NodeId(n.id), n.description.replace('\n', " "));
        position.tags = n.tags;
        position.properties = n.properties;
        position.is_explicit_position = n.is_explicit_position;
        builder.add_position(position)?;
    }

    for t in transitions {
        builder.add_transition(NewTransition::from_source(
            t.id,
            (NodeId(t.from.node), t.from.reo.swap_players),
            (NodeId(t.to.node), t.to.reo.swap_players),
            t.description.into_name(),
            t.tags,
            t.properties,
        ))?;
    }

    let annotations = annotate(&mut builder, &wins)?;
    let graph = builder.build()?;
    Ok(LoadedGraph { graph, annotations })
}

fn read(path: &Path) -> Result<String, GraphError> {
    fs::read_to_string(path).map_err(|source| GraphError::Io { path: path.to_path_buf(), source })
}
