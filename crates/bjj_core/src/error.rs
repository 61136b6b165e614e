use std::path::PathBuf;

use thiserror::Error;

use crate::graph::{EdgeId, NodeId};

/// Construction-time failures. A graph that fails to build is never handed
/// to the engine.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed graph JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate position id {0}")]
    DuplicateNode(NodeId),

    #[error("unknown position id {node} referenced by {context}")]
    UnknownNode { node: NodeId, context: String },

    #[error("graph has no positions")]
    Empty,
}

/// Turn-resolution failures. These are caller contract violations or an
/// exhausted recovery budget; normal match endings are not errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("transition {edge} is not a legal move from position {node}")]
    IllegalMove { edge: EdgeId, node: NodeId },

    #[error("unknown position id {0}")]
    UnknownNode(NodeId),

    #[error("unknown transition id {0}")]
    UnknownEdge(EdgeId),

    #[error("match is already finished")]
    MatchFinished,

    #[error("cannot pass at position {node}: {available} legal moves available")]
    PassWithLegalMoves { node: NodeId, available: usize },

    #[error("dead-end recovery gave up after {attempts} relocations (last position {node})")]
    RecoveryExhausted { attempts: u32, node: NodeId },

    #[error("strategy '{strategy}' returned no move from {available} legal moves")]
    NoMoveChosen { strategy: String, available: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl MatchError {
    /// Errors caused by the move chooser rather than the engine or the data.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            MatchError::IllegalMove { .. }
                | MatchError::UnknownEdge(_)
                | MatchError::MatchFinished
                | MatchError::PassWithLegalMoves { .. }
                | MatchError::NoMoveChosen { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("unsupported config format: {0} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, MatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors_are_classified() {
        assert!(MatchError::IllegalMove { edge: EdgeId(1), node: NodeId(2) }.is_caller_error());
        assert!(MatchError::UnknownEdge(EdgeId(9)).is_caller_error());
        assert!(MatchError::MatchFinished.is_caller_error());
        assert!(MatchError::PassWithLegalMoves { node: NodeId(0), available: 2 }.is_caller_error());

        assert!(!MatchError::RecoveryExhausted { attempts: 3, node: NodeId(4) }.is_caller_error());
        assert!(!MatchError::InvalidConfig("max_turns".into()).is_caller_error());
        assert!(!MatchError::WorkerPool("closed".into()).is_caller_error());
        assert!(!MatchError::UnknownNode(NodeId(5)).is_caller_error());
    }

    #[test]
    fn test_pass_error_message() {
        let err = MatchError::PassWithLegalMoves { node: NodeId(3), available: 2 };
        assert_eq!(err.to_string(), "cannot pass at position 3: 2 legal moves available");
    }
}
