//! `set` node: merge a fixed field map into every item.

use async_trait::async_trait;

use super::param_object;
use crate::{Items, NodeContext, NodeError, NodeHandler, NodeOutput, Params};

/// Overwrites the fields from `params.fields` on each item.
///
/// Output length always equals input length.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetNode;

#[async_trait]
impl NodeHandler for SetNode {
    async fn execute(
        &self,
        params: &Params,
        items: Items,
        _ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let fields = param_object(params, "fields");

        let merged = items
            .into_iter()
            .map(|mut item| {
                for (key, value) in &fields {
                    item.insert(key.clone(), value.clone());
                }
                item
            })
            .collect();

        Ok(NodeOutput::from_default(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use uuid::Uuid;

    fn ctx() -> NodeContext {
        NodeContext {
            workflow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            node_id: "set".into(),
        }
    }

    fn items(v: Value) -> Items {
        serde_json::from_value(v).unwrap()
    }

    fn params(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn merges_fields_into_every_item() {
        let out = SetNode
            .execute(
                &params(json!({ "fields": { "hello": "world", "id": 9 } })),
                items(json!([{ "id": 1 }, { "id": 2, "keep": true }])),
                &ctx(),
            )
            .await
            .unwrap();

        assert_eq!(
            out.default.unwrap(),
            items(json!([
                { "id": 9, "hello": "world" },
                { "id": 9, "keep": true, "hello": "world" }
            ]))
        );
    }

    #[tokio::test]
    async fn output_length_matches_input_for_any_field_map() {
        let inputs = items(json!([{ "a": 1 }, {}, { "b": [1, 2] }]));
        for fields in [json!({}), json!({ "a": null }), json!("not an object"), json!({ "x": { "y": 1 } })] {
            let p = params(json!({ "fields": fields.clone() }));
            let out = SetNode.execute(&p, inputs.clone(), &ctx()).await.unwrap();
            let out = out.default.unwrap();

            assert_eq!(out.len(), inputs.len());
            for (i, item) in out.iter().enumerate() {
                let mut expected = inputs[i].clone();
                if let Some(map) = fields.as_object() {
                    for (k, v) in map {
                        expected.insert(k.clone(), v.clone());
                    }
                }
                assert_eq!(item, &expected);
            }
        }
    }

    #[tokio::test]
    async fn missing_fields_param_is_identity() {
        let inputs = items(json!([{ "a": 1 }]));
        let out = SetNode.execute(&Params::new(), inputs.clone(), &ctx()).await.unwrap();
        assert_eq!(out.default.unwrap(), inputs);
    }
}
