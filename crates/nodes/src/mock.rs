//! `MockNode` — a test double for `NodeHandler`.
//!
//! Useful in unit and integration tests where a real handler is either
//! unavailable or irrelevant.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::{Items, NodeContext, NodeError, NodeHandler, NodeOutput, Params};

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Return the input items unchanged as the default output.
    Passthrough,
    /// Return the input items, each tagged with `"via": <name>`.
    Tag,
    /// Return a fixed result.
    Return(NodeOutput),
    /// Fail with `NodeError::Failed`.
    Fail(String),
}

/// A mock handler that records every batch it receives and answers with a
/// programmer-specified result.
pub struct MockNode {
    /// Label used in test assertions.
    pub name: String,
    /// What the node will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// All input batches seen by this node (in call order).
    pub calls: Arc<Mutex<Vec<Items>>>,
}

impl MockNode {
    fn with_behaviour(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock that forwards its input.
    pub fn passthrough(name: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::Passthrough)
    }

    /// A mock that forwards its input with `"via": name` set on every item.
    pub fn tagging(name: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::Tag)
    }

    /// A mock that always returns `output`.
    pub fn returning(name: impl Into<String>, output: NodeOutput) -> Self {
        Self::with_behaviour(name, MockBehaviour::Return(output))
    }

    /// A mock that always fails with `msg`.
    pub fn failing(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::Fail(msg.into()))
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Snapshot of every input batch received so far.
    pub fn calls(&self) -> Vec<Items> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl NodeHandler for MockNode {
    async fn execute(
        &self,
        _params: &Params,
        items: Items,
        _ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(items.clone());

        match &self.behaviour {
            MockBehaviour::Passthrough => Ok(NodeOutput::from_default(items)),
            MockBehaviour::Tag => Ok(NodeOutput::from_default(
                items
                    .into_iter()
                    .map(|mut item| {
                        item.insert("via".into(), Value::String(self.name.clone()));
                        item
                    })
                    .collect(),
            )),
            MockBehaviour::Return(output) => Ok(output.clone()),
            MockBehaviour::Fail(msg) => Err(NodeError::Failed(msg.clone())),
        }
    }
}
