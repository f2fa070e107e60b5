//! The `NodeHandler` trait — the contract every node type must fulfil.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::NodeError;

/// One schema-less record flowing through the graph.
pub type Item = Map<String, Value>;

/// An ordered batch of items.
pub type Items = Vec<Item>;

/// A node's untyped configuration bag.
pub type Params = Map<String, Value>;

/// Output handle used when an edge does not name one.
pub const DEFAULT_HANDLE: &str = "default";

/// Per-invocation context handed to every handler.
///
/// Defined here (in the nodes crate) so both the engine and individual
/// handlers can use it without a circular dependency.
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// ID of the workflow being run.
    pub workflow_id: Uuid,
    /// ID of the current execution.
    pub execution_id: Uuid,
    /// ID of the node being invoked.
    pub node_id: String,
}

impl NodeContext {
    /// Emit a structured log line tagged with the run and node.
    pub fn log(&self, message: &str, meta: Value) {
        info!(
            workflow_id = %self.workflow_id,
            execution_id = %self.execution_id,
            node_id = %self.node_id,
            meta = %meta,
            "{message}"
        );
    }
}

/// What a handler returns.
///
/// When `outputs` is present it alone decides routing and `default` is
/// ignored; otherwise `default` is sent down every outgoing edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Items>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<BTreeMap<String, Items>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<String>>,
}

impl NodeOutput {
    /// A result broadcasting `items` on every edge.
    pub fn from_default(items: Items) -> Self {
        Self {
            default: Some(items),
            ..Self::default()
        }
    }

    /// A result routing by named handle.
    pub fn from_outputs(outputs: BTreeMap<String, Items>) -> Self {
        Self {
            outputs: Some(outputs),
            ..Self::default()
        }
    }

    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Items delivered along an edge leaving through `handle`.
    ///
    /// A handle missing from `outputs` yields nothing.
    pub fn items_for_handle(&self, handle: &str) -> Items {
        match &self.outputs {
            Some(outputs) => outputs.get(handle).cloned().unwrap_or_default(),
            None => self.default.clone().unwrap_or_default(),
        }
    }

    /// The routed result as recorded on a step: the `outputs` map, else the
    /// `default` list, else an empty list.
    pub fn routed_value(&self) -> Value {
        let routed = match (&self.outputs, &self.default) {
            (Some(outputs), _) => serde_json::to_value(outputs),
            (None, Some(default)) => serde_json::to_value(default),
            (None, None) => Ok(Value::Array(Vec::new())),
        };
        routed.unwrap_or(Value::Null)
    }

    /// The step output payload: the routed result, wrapped together with the
    /// logs when the handler returned any.
    pub fn step_payload(&self) -> Value {
        let routed = self.routed_value();
        match &self.logs {
            Some(logs) => serde_json::json!({ "output": routed, "logs": logs }),
            None => routed,
        }
    }
}

/// The core handler trait.
///
/// Handlers must not keep state between invocations and must validate their
/// own params at the point of use.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Run the node over the items accumulated for this visit.
    async fn execute(
        &self,
        params: &Params,
        items: Items,
        ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError>;
}
