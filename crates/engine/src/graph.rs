//! Adjacency index and structural checks over a [`WorkflowGraph`].
//!
//! The engine only needs [`Adjacency`] and [`trigger_nodes`]. Stricter
//! checks live in [`validate_graph`], which callers run before persisting
//! or executing a definition; the walk itself tolerates dangling edges.

use std::collections::{HashMap, HashSet};

use nodes::is_trigger_type;

use crate::{
    models::{Edge, Node, WorkflowGraph},
    EngineError,
};

/// Source node id → outgoing edges, in edge-list order.
#[derive(Debug, Default)]
pub struct Adjacency<'g> {
    outgoing: HashMap<&'g str, Vec<&'g Edge>>,
}

impl<'g> Adjacency<'g> {
    pub fn build(edges: &'g [Edge]) -> Self {
        let mut outgoing: HashMap<&str, Vec<&Edge>> = HashMap::new();
        for edge in edges {
            outgoing.entry(edge.source.as_str()).or_default().push(edge);
        }
        Self { outgoing }
    }

    pub fn outgoing(&self, node_id: &str) -> &[&'g Edge] {
        self.outgoing.get(node_id).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Nodes whose type starts a run, in graph order.
pub fn trigger_nodes(graph: &WorkflowGraph) -> Vec<&Node> {
    graph
        .nodes
        .iter()
        .filter(|node| is_trigger_type(&node.node_type))
        .collect()
}

/// Check a graph before it is stored or run.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] if an edge references a missing node.
/// - [`EngineError::NoTriggerNode`] if no node can start a run.
pub fn validate_graph(graph: &WorkflowGraph) -> Result<(), EngineError> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &graph.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    for edge in &graph.edges {
        if !seen_ids.contains(edge.source.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.source.clone(),
                side: "source",
            });
        }
        if !seen_ids.contains(edge.target.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.target.clone(),
                side: "target",
            });
        }
    }

    if trigger_nodes(graph).is_empty() {
        return Err(EngineError::NoTriggerNode);
    }

    Ok(())
}
