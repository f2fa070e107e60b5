//! Static catalog of the built-in node types, served to editors and the CLI.

use serde::Serialize;
use serde_json::{json, Value};

use crate::BuiltinNode;

/// Declared kind of a param, as shown by editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Json,
    Code,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamSchema {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

impl ParamSchema {
    fn new(name: &'static str, param_type: ParamType) -> Self {
        Self {
            name,
            param_type,
            default: None,
            required: false,
            description: None,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeDefinition {
    #[serde(rename = "type")]
    pub node_type: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSchema>,
    /// Named output handles; `None` means the single `default` handle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<&'static str>>,
}

fn definition(node: BuiltinNode) -> NodeDefinition {
    use ParamType as P;

    let (label, description, params, outputs) = match node {
        BuiltinNode::ManualTrigger => ("Manual Trigger", "Starts a workflow manually.", vec![], None),
        BuiltinNode::CronTrigger => (
            "Cron Trigger",
            "Schedule workflow execution with cron.",
            vec![ParamSchema::new("cronExpression", P::String)
                .required()
                .describe("Cron expression to trigger workflow.")],
            None,
        ),
        BuiltinNode::WebhookTrigger => (
            "Webhook Trigger",
            "Start workflow from an incoming webhook request.",
            vec![
                ParamSchema::new("path", P::String)
                    .required()
                    .describe("Webhook path (without /api/webhooks/ prefix)."),
                ParamSchema::new("method", P::String)
                    .default_value(json!("POST"))
                    .describe("HTTP method."),
            ],
            None,
        ),
        BuiltinNode::HttpRequest => (
            "HTTP Request",
            "Perform an HTTP request.",
            vec![
                ParamSchema::new("method", P::String).default_value(json!("GET")),
                ParamSchema::new("url", P::String).required(),
                ParamSchema::new("headers", P::Json),
                ParamSchema::new("query", P::Json),
                ParamSchema::new("body", P::Json),
                ParamSchema::new("authType", P::String).describe("basic or bearer"),
                ParamSchema::new("authUsername", P::String),
                ParamSchema::new("authPassword", P::String),
                ParamSchema::new("authToken", P::String),
            ],
            None,
        ),
        BuiltinNode::Code => (
            "Code",
            "Run JavaScript to transform items.",
            vec![ParamSchema::new("code", P::Code)
                .required()
                .describe("JavaScript: (items) => items")],
            None,
        ),
        BuiltinNode::If => (
            "IF",
            "Conditional branching.",
            vec![
                ParamSchema::new("field", P::String)
                    .required()
                    .describe("Field to check (dot notation)."),
                ParamSchema::new("operator", P::String)
                    .default_value(json!("equals"))
                    .describe("equals | notEquals | exists"),
                ParamSchema::new("value", P::String).describe("Value to compare."),
            ],
            Some(vec!["true", "false"]),
        ),
        BuiltinNode::Set => (
            "Set",
            "Set or overwrite fields.",
            vec![ParamSchema::new("fields", P::Json).describe("Object of fields to set.")],
            None,
        ),
    };

    NodeDefinition {
        node_type: node.type_name(),
        label,
        description,
        params,
        outputs,
    }
}

/// Definitions for every built-in node type, in registry order.
pub fn node_definitions() -> Vec<NodeDefinition> {
    BuiltinNode::ALL.into_iter().map(definition).collect()
}
