//! Engine-level error types.

use nodes::NodeError;
use thiserror::Error;

/// Errors produced by the workflow engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the graph.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    // ------ Execution errors ------

    /// The graph has nothing to start from. No execution is recorded.
    #[error("workflow has no trigger node")]
    NoTriggerNode,

    /// A node's `type` has no registered handler.
    #[error("no handler for node type '{node_type}'")]
    UnknownNodeType {
        node_id: String,
        node_type: String,
    },

    /// A handler failed; its message is the execution's error verbatim.
    #[error("{source}")]
    Node {
        node_id: String,
        source: NodeError,
    },

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}

impl EngineError {
    /// The node the error is attributed to, if any.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::UnknownNodeType { node_id, .. } | Self::Node { node_id, .. } => Some(node_id),
            Self::UnknownNodeReference { node_id, .. } | Self::DuplicateNodeId(node_id) => {
                Some(node_id)
            }
            Self::NoTriggerNode | Self::Database(_) => None,
        }
    }
}
