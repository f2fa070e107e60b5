//! Router tests against a local server.
//!
//! Execution routes read through the executor's store, so a `MemoryStore`
//! stands in for Postgres; the pool is lazy and never connects.

use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use db::MemoryStore;
use engine::{Node, WorkflowExecutor, WorkflowGraph};
use nodes::{NodeRegistry, Params};

use crate::{router, AppState};

async fn spawn_app(store: Arc<MemoryStore>) -> (String, AppState) {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://flowctl@127.0.0.1:1/flowctl")
        .unwrap();
    let executor = WorkflowExecutor::new(store, Arc::new(NodeRegistry::builtin(Default::default())));
    let state = AppState::new(pool, executor, CancellationToken::new());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

fn trigger_graph() -> WorkflowGraph {
    WorkflowGraph::new(
        Uuid::new_v4(),
        vec![Node::new("t", "manualTrigger", Params::new())],
        vec![],
    )
}

#[tokio::test]
async fn node_catalog_is_served() {
    let (base, _) = spawn_app(Arc::new(MemoryStore::new())).await;
    let body: Value = reqwest::get(format!("{base}/api/nodes"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let types: Vec<_> = body["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["type"].as_str().unwrap().to_owned())
        .collect();
    assert!(types.contains(&"webhookTrigger".to_string()));
    assert!(types.contains(&"code".to_string()));
}

#[tokio::test]
async fn execution_detail_includes_steps() {
    let store = Arc::new(MemoryStore::new());
    let (base, state) = spawn_app(store).await;
    let graph = trigger_graph();
    let execution_id = state
        .executor
        .run(&graph, vec![json!({ "n": 1 }).as_object().cloned().unwrap()])
        .await
        .unwrap();

    let body: Value = reqwest::get(format!("{base}/api/executions/{execution_id}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["id"], json!(execution_id));
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["steps"][0]["nodeId"], json!("t"));
    assert_eq!(body["steps"][0]["input"], json!([{ "n": 1 }]));

    let list: Value = reqwest::get(format!("{base}/api/executions?workflowId={}", graph.id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);

    let other: Value = reqwest::get(format!("{base}/api/executions?workflowId={}", Uuid::new_v4()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(other, json!([]));
}

#[tokio::test]
async fn unknown_execution_is_a_404_with_error_body() {
    let (base, _) = spawn_app(Arc::new(MemoryStore::new())).await;
    let response = reqwest::get(format!("{base}/api/executions/{}", Uuid::new_v4()))
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": { "message": "Execution not found" } }));
}
