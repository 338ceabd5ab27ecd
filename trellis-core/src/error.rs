//! Error types
//!
//! Every failure in the crate is reported through [`Error`]. The type is
//! `Clone` because one execution failure is delivered to every task waiting
//! on the affected node.

use std::time::Duration;

use thiserror::Error;

use crate::graph::NodeId;

/// Crate result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by graph construction, depth resolution and execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A node was found on its own active traversal path.
    #[error("cycle detected at {node}: {}", format_path(.path))]
    CycleDetected { node: NodeId, path: Vec<NodeId> },

    /// The graph is malformed (dangling child, input with children, ...).
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// The identity is not reachable in the graph.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// No layout block has this index.
    #[error("unknown block: {0}")]
    UnknownBlock(usize),

    /// The runtime reported a failure for one node.
    #[error("node {node} failed: {reason}")]
    NodeFailed { node: NodeId, reason: String },

    /// The runtime reported a failure for the whole run.
    #[error("execution failed: {0}")]
    RunFailed(String),

    #[error("execution cancelled")]
    Cancelled,

    #[error("execution timed out after {0:?}")]
    TimedOut(Duration),

    /// `submit` was called outside a tokio runtime.
    #[error("no tokio runtime available to drive the execution")]
    RuntimeUnavailable,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether the error ends the whole run rather than a single node.
    pub fn is_run_wide(&self) -> bool {
        matches!(
            self,
            Error::RunFailed(_) | Error::Cancelled | Error::TimedOut(_)
        )
    }
}

fn format_path(path: &[NodeId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
