//! `if` node: partition items into `"true"` and `"false"` outputs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use super::param_string;
use crate::{Item, Items, NodeContext, NodeError, NodeHandler, NodeOutput, Params};

/// Comparison applied to the value found at `params.field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Path resolves to a defined, non-null value.
    Exists,
    /// Resolved value differs from `params.value`.
    NotEquals,
    /// Resolved value equals `params.value`.
    Equals,
}

impl Operator {
    /// Unknown or missing operators fall back to `Equals`.
    pub fn parse(name: Option<&str>) -> Self {
        match name {
            Some("exists") => Self::Exists,
            Some("notEquals") => Self::NotEquals,
            _ => Self::Equals,
        }
    }

    /// `resolved` and `expected` are `None` when undefined.
    pub fn matches(self, resolved: Option<&Value>, expected: Option<&Value>) -> bool {
        match self {
            Self::Exists => resolved.is_some_and(|v| !v.is_null()),
            Self::NotEquals => resolved != expected,
            Self::Equals => resolved == expected,
        }
    }
}

/// Walk a dotted path through nested objects.
///
/// Returns `None` as soon as a segment is missing or the current value is not
/// an object. An empty path resolves to nothing.
pub fn resolve_path<'a>(item: &'a Item, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = item.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Routes each item to `"true"` or `"false"`; both outputs are always present.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfNode;

#[async_trait]
impl NodeHandler for IfNode {
    async fn execute(
        &self,
        params: &Params,
        items: Items,
        _ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let field = param_string(params, "field").unwrap_or_default();
        let operator = Operator::parse(params.get("operator").and_then(Value::as_str));
        let expected = params.get("value");

        let (truthy, falsy): (Items, Items) = items
            .into_iter()
            .partition(|item| operator.matches(resolve_path(item, &field), expected));

        let mut outputs = BTreeMap::new();
        outputs.insert("true".to_string(), truthy);
        outputs.insert("false".to_string(), falsy);
        Ok(NodeOutput::from_outputs(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn ctx() -> NodeContext {
        NodeContext {
            workflow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            node_id: "if".into(),
        }
    }

    fn items(v: Value) -> Items {
        serde_json::from_value(v).unwrap()
    }

    fn params(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    async fn split(p: Value, input: Value) -> (Items, Items) {
        let mut out = IfNode
            .execute(&params(p), items(input), &ctx())
            .await
            .unwrap()
            .outputs
            .unwrap();
        (out.remove("true").unwrap(), out.remove("false").unwrap())
    }

    #[tokio::test]
    async fn equals_partitions_input() {
        let input = json!([
            { "status": "ok", "n": 1 },
            { "status": "fail", "n": 2 },
            { "n": 3 },
            { "status": "ok", "n": 4 }
        ]);
        let (truthy, falsy) = split(
            json!({ "field": "status", "operator": "equals", "value": "ok" }),
            input.clone(),
        )
        .await;

        for item in &truthy {
            assert_eq!(resolve_path(item, "status"), Some(&json!("ok")));
        }
        for item in &falsy {
            assert_ne!(resolve_path(item, "status"), Some(&json!("ok")));
        }

        // Together the two outputs are exactly the input, each item once.
        let mut all: Vec<i64> = truthy
            .iter()
            .chain(falsy.iter())
            .map(|i| i["n"].as_i64().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, vec![1, 2, 3, 4]);
        assert_eq!(truthy.len(), 2);
        assert_eq!(falsy.len(), 2);
    }

    #[tokio::test]
    async fn missing_operator_defaults_to_equals() {
        let (truthy, falsy) = split(
            json!({ "field": "a.b", "value": 1 }),
            json!([{ "a": { "b": 1 } }, { "a": { "b": 2 } }]),
        )
        .await;
        assert_eq!(truthy, items(json!([{ "a": { "b": 1 } }])));
        assert_eq!(falsy, items(json!([{ "a": { "b": 2 } }])));
    }

    #[tokio::test]
    async fn exists_requires_defined_non_null_value() {
        let (truthy, falsy) = split(
            json!({ "field": "user.email", "operator": "exists" }),
            json!([
                { "user": { "email": "a@b.c" } },
                { "user": { "email": null } },
                { "user": {} },
                { "user": "not an object" },
                {}
            ]),
        )
        .await;
        assert_eq!(truthy.len(), 1);
        assert_eq!(falsy.len(), 4);
    }

    #[tokio::test]
    async fn not_equals_is_the_complement_of_equals() {
        let input = json!([{ "x": 1 }, { "x": 2 }, {}]);
        let (eq_true, eq_false) =
            split(json!({ "field": "x", "operator": "equals", "value": 1 }), input.clone()).await;
        let (ne_true, ne_false) =
            split(json!({ "field": "x", "operator": "notEquals", "value": 1 }), input).await;
        assert_eq!(eq_true, ne_false);
        assert_eq!(eq_false, ne_true);
    }

    #[test]
    fn path_resolution_stops_at_non_objects() {
        let item = items(json!([{ "a": { "b": [1, 2], "c": { "d": true } } }])).remove(0);
        assert_eq!(resolve_path(&item, "a.c.d"), Some(&json!(true)));
        assert_eq!(resolve_path(&item, "a.b.0"), None);
        assert_eq!(resolve_path(&item, "a.missing.d"), None);
        assert_eq!(resolve_path(&item, ""), None);
    }

    #[test]
    fn undefined_equals_undefined() {
        assert!(Operator::Equals.matches(None, None));
        assert!(!Operator::Equals.matches(Some(&Value::Null), None));
        assert!(Operator::NotEquals.matches(Some(&json!(1)), None));
    }
}
