use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use db::{ExecutionRow, ExecutionStore, StepRow};

use super::workflows::load_graph;
use crate::{ApiError, AppState};

/// `POST /api/workflows/:id/run`: manual run with no items.
///
/// Waits for the run to finish; a failed run answers 500 with the
/// execution's error message.
pub async fn run(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let graph = load_graph(&state, id).await?;
    let execution_id = state.executor.run(&graph, Vec::new()).await?;
    info!(workflow_id = %id, %execution_id, "manual run finished");
    Ok(Json(json!({ "executionId": execution_id })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub workflow_id: Option<Uuid>,
}

/// `GET /api/executions?workflowId=`: newest first.
pub async fn list(
    Query(query): Query<ListQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExecutionRow>>, ApiError> {
    let rows = state
        .executor
        .store()
        .list_executions(query.workflow_id)
        .await?;
    Ok(Json(rows))
}

#[derive(Debug, Serialize)]
pub struct ExecutionDetail {
    #[serde(flatten)]
    pub execution: ExecutionRow,
    pub steps: Vec<StepRow>,
}

/// `GET /api/executions/:id`: the execution with its steps in order.
pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<ExecutionDetail>, ApiError> {
    let store = state.executor.store();
    let execution = store
        .get_execution(id)
        .await
        .map_err(|e| ApiError::lookup(e, "Execution not found"))?;
    let steps = store.list_steps(id).await?;
    Ok(Json(ExecutionDetail { execution, steps }))
}
