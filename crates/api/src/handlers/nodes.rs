use axum::Json;
use serde_json::{json, Value};

/// `GET /api/nodes`: the built-in node catalog.
pub async fn list() -> Json<Value> {
    Json(json!({ "nodes": nodes::node_definitions() }))
}
