//! `code` node: run user JavaScript `items => items` in the sandbox.

use async_trait::async_trait;
use sandbox::{JsSandbox, SandboxConfig};
use serde_json::{json, Value};

use super::param_string;
use crate::{Items, NodeContext, NodeError, NodeHandler, NodeOutput, Params};

/// Evaluates `params.code` to a function and applies it to the whole batch.
///
/// The function must return an array of objects. Console output is returned
/// as the step's logs and forwarded to the context logger.
#[derive(Debug, Clone, Default)]
pub struct CodeNode {
    sandbox: JsSandbox,
}

impl CodeNode {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            sandbox: JsSandbox::new(config),
        }
    }
}

/// Check the sandbox result against the item contract.
fn into_items(value: Value) -> Result<Items, NodeError> {
    let Value::Array(values) = value else {
        return Err(NodeError::ContractViolation(
            "code node must return an array of items".into(),
        ));
    };

    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::Object(item) => Ok(item),
            _ => Err(NodeError::ContractViolation(format!(
                "code node returned a non-object item at index {index}"
            ))),
        })
        .collect()
}

#[async_trait]
impl NodeHandler for CodeNode {
    async fn execute(
        &self,
        params: &Params,
        items: Items,
        ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let code = param_string(params, "code")
            .filter(|code| !code.trim().is_empty())
            .ok_or_else(|| NodeError::InvalidParams("code node requires code".into()))?;

        let input = Value::Array(items.into_iter().map(Value::Object).collect());
        let output = self.sandbox.execute(&code, &input).await?;

        ctx.log("code node logs", json!({ "logs": output.logs }));

        let items = into_items(output.value)?;
        Ok(NodeOutput::from_default(items).with_logs(output.logs))
    }
}
