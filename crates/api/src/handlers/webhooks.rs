use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method},
    Json,
};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use db::repository::workflows as wf_repo;
use db::WorkflowRow;
use engine::WorkflowGraph;
use nodes::{BuiltinNode, Item};

use crate::{ApiError, AppState};

/// Normalised webhook path: no leading `/`.
fn normalise_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Whether `graph` has a webhook trigger answering `method` on `path`.
///
/// A node without a `path` never matches; `method` defaults to POST.
fn answers(graph: &WorkflowGraph, path: &str, method: &Method) -> bool {
    graph
        .nodes
        .iter()
        .filter(|node| node.node_type == BuiltinNode::WebhookTrigger.type_name())
        .any(|node| {
            let node_path = node
                .params
                .get("path")
                .and_then(Value::as_str)
                .map(normalise_path)
                .unwrap_or_default();
            let node_method = node
                .params
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or("POST");
            !node_path.is_empty()
                && node_path == path
                && node_method.eq_ignore_ascii_case(method.as_str())
        })
}

/// The first active workflow whose webhook trigger matches the request.
pub fn find_webhook_workflow(
    workflows: Vec<WorkflowRow>,
    path: &str,
    method: &Method,
) -> Option<WorkflowGraph> {
    let path = normalise_path(path);
    workflows
        .into_iter()
        .filter(|row| row.active)
        .filter_map(|row| match WorkflowGraph::from_definition(row.id, row.definition) {
            Ok(graph) => Some(graph),
            Err(e) => {
                warn!(workflow_id = %row.id, error = %e, "unreadable workflow definition");
                None
            }
        })
        .find(|graph| answers(graph, path, method))
}

/// The single item a webhook run starts with: `{body, headers, query}`.
pub fn webhook_item(headers: &HeaderMap, query: BTreeMap<String, String>, body: &[u8]) -> Item {
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
    };
    let headers: Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            )
        })
        .collect();

    let mut item = Item::new();
    item.insert("body".into(), body);
    item.insert("headers".into(), Value::Object(headers));
    item.insert("query".into(), json!(query));
    item
}

/// `ANY /api/webhooks/*path`
pub async fn handle_webhook(
    Path(path): Path<String>,
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let workflows = wf_repo::list_active_workflows(&state.pool).await?;
    let graph = find_webhook_workflow(workflows, &path, &method)
        .ok_or(ApiError::NotFound("Webhook not found"))?;

    let item = webhook_item(&headers, query, &body);
    let execution_id = state.executor.run(&graph, vec![item]).await?;
    info!(workflow_id = %graph.id, %execution_id, %method, %path, "webhook run finished");
    Ok(Json(json!({ "executionId": execution_id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Utc;
    use uuid::Uuid;

    fn row(active: bool, params: Value) -> WorkflowRow {
        WorkflowRow {
            id: Uuid::new_v4(),
            name: "hook".into(),
            active,
            definition: json!({
                "nodes": [{ "id": "w", "type": "webhookTrigger", "data": { "params": params } }],
                "edges": []
            }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn matches_on_path_and_default_post() {
        let wf = row(true, json!({ "path": "/orders" }));
        let id = wf.id;

        let found = find_webhook_workflow(vec![wf.clone()], "orders", &Method::POST).unwrap();
        assert_eq!(found.id, id);
        assert!(find_webhook_workflow(vec![wf.clone()], "/orders", &Method::POST).is_some());
        assert!(find_webhook_workflow(vec![wf.clone()], "orders", &Method::GET).is_none());
        assert!(find_webhook_workflow(vec![wf], "other", &Method::POST).is_none());
    }

    #[test]
    fn method_is_case_insensitive_and_inactive_workflows_are_ignored() {
        let get_hook = row(true, json!({ "path": "ping", "method": "get" }));
        assert!(find_webhook_workflow(vec![get_hook], "ping", &Method::GET).is_some());

        let inactive = row(false, json!({ "path": "ping" }));
        assert!(find_webhook_workflow(vec![inactive], "ping", &Method::POST).is_none());

        let no_path = row(true, json!({}));
        assert!(find_webhook_workflow(vec![no_path], "", &Method::POST).is_none());
    }

    #[test]
    fn item_carries_body_headers_and_query() {
        let mut headers = HeaderMap::new();
        headers.insert("x-token", HeaderValue::from_static("abc"));
        let query = BTreeMap::from([("page".to_string(), "2".to_string())]);

        let item = webhook_item(&headers, query, br#"{"id": 7}"#);
        assert_eq!(
            Value::Object(item),
            json!({ "body": { "id": 7 }, "headers": { "x-token": "abc" }, "query": { "page": "2" } })
        );

        let text = webhook_item(&HeaderMap::new(), BTreeMap::new(), b"plain");
        assert_eq!(text["body"], json!("plain"));
        let empty = webhook_item(&HeaderMap::new(), BTreeMap::new(), b"");
        assert_eq!(empty["body"], Value::Null);
    }
}
