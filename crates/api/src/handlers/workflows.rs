use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use db::repository::{executions as exec_repo, workflows as wf_repo};
use db::WorkflowRow;
use engine::{validate_graph, Edge, Node, WorkflowGraph};

use crate::{reschedule, ApiError, AppState};

/// Body of `POST /api/workflows` and `PUT /api/workflows/:id`.
#[derive(Debug, Deserialize)]
pub struct WorkflowPayload {
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowPayload {
    /// The `definition` column value, after structural validation.
    fn validated_definition(&self) -> Result<Value, ApiError> {
        let graph = WorkflowGraph::new(Uuid::nil(), self.nodes.clone(), self.edges.clone());
        validate_graph(&graph).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(graph.definition())
    }
}

/// A stored workflow with its definition flattened back into `nodes` and
/// `edges`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowView {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<WorkflowRow> for WorkflowView {
    type Error = ApiError;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        let graph = WorkflowGraph::from_definition(row.id, row.definition).map_err(|e| {
            ApiError::Internal(format!("stored workflow {} is malformed: {e}", row.id))
        })?;
        Ok(Self {
            id: row.id,
            name: row.name,
            active: row.active,
            nodes: graph.nodes,
            edges: graph.edges,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Load a stored workflow as a runnable graph.
pub(crate) async fn load_graph(state: &AppState, id: Uuid) -> Result<WorkflowGraph, ApiError> {
    let row = wf_repo::get_workflow(&state.pool, id)
        .await
        .map_err(|e| ApiError::lookup(e, "Workflow not found"))?;
    WorkflowGraph::from_definition(row.id, row.definition)
        .map_err(|e| ApiError::Internal(format!("stored workflow {id} is malformed: {e}")))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<WorkflowView>>, ApiError> {
    let rows = wf_repo::list_workflows(&state.pool).await?;
    let views = rows
        .into_iter()
        .map(WorkflowView::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(views))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowView>, ApiError> {
    let row = wf_repo::get_workflow(&state.pool, id)
        .await
        .map_err(|e| ApiError::lookup(e, "Workflow not found"))?;
    Ok(Json(row.try_into()?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<WorkflowPayload>,
) -> Result<(StatusCode, Json<WorkflowView>), ApiError> {
    let definition = payload.validated_definition()?;
    let row = wf_repo::create_workflow(&state.pool, &payload.name, payload.active, definition).await?;
    reschedule(&state).await?;
    Ok((StatusCode::CREATED, Json(row.try_into()?)))
}

pub async fn update(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<WorkflowPayload>,
) -> Result<Json<WorkflowView>, ApiError> {
    let definition = payload.validated_definition()?;
    let row = wf_repo::update_workflow(&state.pool, id, &payload.name, payload.active, definition)
        .await
        .map_err(|e| ApiError::lookup(e, "Workflow not found"))?;
    reschedule(&state).await?;
    Ok(Json(row.try_into()?))
}

/// Deletes the workflow together with its execution history.
pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    exec_repo::delete_executions_for_workflow(&state.pool, id).await?;
    wf_repo::delete_workflow(&state.pool, id)
        .await
        .map_err(|e| ApiError::lookup(e, "Workflow not found"))?;
    reschedule(&state).await?;
    Ok(Json(json!({ "ok": true })))
}
