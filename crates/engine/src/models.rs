//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow graph looks like
//! in memory. A graph's `nodes` and `edges` are stored as the JSONB
//! `definition` column of the `workflows` table.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use nodes::{Params, DEFAULT_HANDLE};

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single vertex in the workflow graph.
///
/// On the wire the handler's configuration sits under `data`, the way the
/// editor saves it: `{ id, type, position?, data: { label?, params? } }`.
/// A top-level `params` / `label` is accepted as a fallback on input.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique identifier within this graph (referenced by edges).
    pub id: String,
    /// Selects the registered handler.
    pub node_type: String,
    /// Opaque configuration handed to the handler.
    pub params: Params,
    pub label: Option<String>,
    /// Editor layout, carried through untouched.
    pub position: Option<Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, params: Params) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            params,
            label: None,
            position: None,
        }
    }
}

#[derive(Deserialize)]
struct NodeRecord {
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    position: Option<Value>,
    #[serde(default)]
    data: Option<NodeData>,
    #[serde(default)]
    params: Option<Params>,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Default, Deserialize)]
struct NodeData {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    params: Option<Params>,
}

#[derive(Serialize)]
struct NodeRecordRef<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    node_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<&'a Value>,
    data: NodeDataRef<'a>,
}

#[derive(Serialize)]
struct NodeDataRef<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<&'a str>,
    params: &'a Params,
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = NodeRecord::deserialize(deserializer)?;
        let data = record.data.unwrap_or_default();
        Ok(Self {
            id: record.id,
            node_type: record.node_type,
            params: data.params.or(record.params).unwrap_or_default(),
            label: data.label.or(record.label),
            position: record.position,
        })
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NodeRecordRef {
            id: &self.id,
            node_type: &self.node_type,
            position: self.position.as_ref(),
            data: NodeDataRef {
                label: self.label.as_deref(),
                params: &self.params,
            },
        }
        .serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge from one node's output handle to another node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Carried for editors; routing ignores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    /// The output handle this edge leaves through.
    pub fn handle(&self) -> &str {
        self.source_handle.as_deref().unwrap_or(DEFAULT_HANDLE)
    }
}

// ---------------------------------------------------------------------------
// WorkflowGraph
// ---------------------------------------------------------------------------

/// The per-run snapshot of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    pub fn new(id: Uuid, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { id, nodes, edges }
    }

    /// Rebuild a stored workflow's graph from its `definition` column.
    pub fn from_definition(id: Uuid, definition: Value) -> Result<Self, serde_json::Error> {
        let mut graph: WorkflowGraph = serde_json::from_value(definition)?;
        graph.id = id;
        Ok(graph)
    }

    /// The `{nodes, edges}` object persisted in the `definition` column.
    pub fn definition(&self) -> Value {
        serde_json::json!({
            "nodes": self.nodes,
            "edges": self.edges,
        })
    }
}
