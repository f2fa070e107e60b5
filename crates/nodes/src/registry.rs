//! Node type → handler dispatch table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sandbox::SandboxConfig;

use crate::builtin::{CodeNode, HttpRequestNode, IfNode, SetNode, TriggerNode};
use crate::NodeHandler;

// ---------------------------------------------------------------------------
// BuiltinNode
// ---------------------------------------------------------------------------

/// The node types shipped with the engine, one variant per type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinNode {
    ManualTrigger,
    CronTrigger,
    WebhookTrigger,
    HttpRequest,
    Code,
    If,
    Set,
}

impl BuiltinNode {
    pub const ALL: [BuiltinNode; 7] = [
        Self::ManualTrigger,
        Self::CronTrigger,
        Self::WebhookTrigger,
        Self::HttpRequest,
        Self::Code,
        Self::If,
        Self::Set,
    ];

    /// The `type` tag used in workflow graphs.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::ManualTrigger => "manualTrigger",
            Self::CronTrigger => "cronTrigger",
            Self::WebhookTrigger => "webhookTrigger",
            Self::HttpRequest => "httpRequest",
            Self::Code => "code",
            Self::If => "if",
            Self::Set => "set",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.type_name() == name)
    }

    /// Whether nodes of this type originate a run.
    pub fn is_trigger(self) -> bool {
        matches!(
            self,
            Self::ManualTrigger | Self::CronTrigger | Self::WebhookTrigger
        )
    }
}

impl fmt::Display for BuiltinNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Whether a graph node with this `type` tag is a walk origin.
pub fn is_trigger_type(node_type: &str) -> bool {
    BuiltinNode::from_type_name(node_type).is_some_and(BuiltinNode::is_trigger)
}

// ---------------------------------------------------------------------------
// NodeRegistry
// ---------------------------------------------------------------------------

/// Maps `type` tags to handler implementations.
///
/// Adding a node type only takes a [`NodeRegistry::register`] call; the
/// engine needs no change.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every [`BuiltinNode`] registered.
    ///
    /// `sandbox` bounds the code node.
    pub fn builtin(sandbox: SandboxConfig) -> Self {
        let client = reqwest::Client::new();
        let mut registry = Self::new();
        for node in BuiltinNode::ALL {
            let handler: Arc<dyn NodeHandler> = match node {
                BuiltinNode::ManualTrigger
                | BuiltinNode::CronTrigger
                | BuiltinNode::WebhookTrigger => Arc::new(TriggerNode),
                BuiltinNode::HttpRequest => Arc::new(HttpRequestNode::new(client.clone())),
                BuiltinNode::Code => Arc::new(CodeNode::new(sandbox.clone())),
                BuiltinNode::If => Arc::new(IfNode),
                BuiltinNode::Set => Arc::new(SetNode),
            };
            registry.register(node.type_name(), handler);
        }
        registry
    }

    /// Register (or replace) the handler for `node_type`, returning the
    /// previous one.
    pub fn register(
        &mut self,
        node_type: impl Into<String>,
        handler: Arc<dyn NodeHandler>,
    ) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.insert(node_type.into(), handler)
    }

    /// Builder-style [`NodeRegistry::register`].
    pub fn with(mut self, node_type: impl Into<String>, handler: Arc<dyn NodeHandler>) -> Self {
        self.register(node_type, handler);
        self
    }

    pub fn get(&self, node_type: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.get(node_type).cloned()
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// Registered type tags, sorted.
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockNode;

    #[test]
    fn builtin_registry_covers_every_type() {
        let registry = NodeRegistry::builtin(SandboxConfig::default());
        for node in BuiltinNode::ALL {
            assert!(registry.contains(node.type_name()), "missing {node}");
        }
        assert_eq!(registry.node_types().len(), BuiltinNode::ALL.len());
    }

    #[test]
    fn trigger_types_are_recognised() {
        assert!(is_trigger_type("manualTrigger"));
        assert!(is_trigger_type("cronTrigger"));
        assert!(is_trigger_type("webhookTrigger"));
        assert!(!is_trigger_type("httpRequest"));
        assert!(!is_trigger_type("somethingElse"));
    }

    #[test]
    fn custom_handlers_can_be_added_and_replaced() {
        let mut registry = NodeRegistry::new().with("custom", Arc::new(MockNode::passthrough("a")));
        assert!(registry.contains("custom"));

        let previous = registry.register("custom", Arc::new(MockNode::passthrough("b")));
        assert!(previous.is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn type_names_round_trip() {
        for node in BuiltinNode::ALL {
            assert_eq!(BuiltinNode::from_type_name(node.type_name()), Some(node));
        }
        assert_eq!(BuiltinNode::from_type_name("nope"), None);
    }
}
