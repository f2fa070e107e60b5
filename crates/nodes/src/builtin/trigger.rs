//! Trigger nodes: `manualTrigger`, `cronTrigger`, `webhookTrigger`.

use async_trait::async_trait;

use crate::{Items, NodeContext, NodeError, NodeHandler, NodeOutput, Params};

/// Marks a walk origin. Items pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerNode;

#[async_trait]
impl NodeHandler for TriggerNode {
    async fn execute(
        &self,
        _params: &Params,
        items: Items,
        _ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::from_default(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn trigger_returns_items_unchanged() {
        let ctx = NodeContext {
            workflow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            node_id: "t".into(),
        };
        let items: Items = vec![json!({ "a": 1 }).as_object().cloned().unwrap()];

        let out = TriggerNode
            .execute(&Params::new(), items.clone(), &ctx)
            .await
            .unwrap();

        assert_eq!(out, NodeOutput::from_default(items));
    }
}
