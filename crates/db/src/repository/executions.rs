//! Execution and step repository functions.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    DbError,
    models::{ExecutionRow, ExecutionStatus, StepRow},
};

const EXECUTION_COLUMNS: &str = "id, workflow_id, status, started_at, finished_at, error";
const STEP_COLUMNS: &str =
    "id, execution_id, node_id, status, started_at, finished_at, input, output, logs, error";

// ---------------------------------------------------------------------------
// executions
// ---------------------------------------------------------------------------

/// Create a new execution record in `running` status.
pub async fn create_execution(
    pool: &PgPool,
    workflow_id: Uuid,
) -> Result<ExecutionRow, DbError> {
    let row = sqlx::query_as::<_, ExecutionRow>(&format!(
        "INSERT INTO executions (id, workflow_id, status, started_at)
         VALUES ($1, $2, $3, $4)
         RETURNING {EXECUTION_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(workflow_id)
    .bind(ExecutionStatus::Running.as_str())
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Move a running execution to `status`.
///
/// Returns [`DbError::ExecutionFinished`] when the execution is already
/// terminal and [`DbError::NotFound`] when it does not exist.
pub async fn update_execution(
    pool: &PgPool,
    execution_id: Uuid,
    status: ExecutionStatus,
    finished_at: Option<DateTime<Utc>>,
    error: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE executions
         SET status = $1, finished_at = $2, error = $3
         WHERE id = $4 AND status = 'running'",
    )
    .bind(status.as_str())
    .bind(finished_at)
    .bind(error)
    .bind(execution_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        // Distinguish "gone" from "already finished".
        get_execution(pool, execution_id).await?;
        return Err(DbError::ExecutionFinished(execution_id));
    }

    Ok(())
}

/// Fetch a single execution by its primary key.
pub async fn get_execution(pool: &PgPool, execution_id: Uuid) -> Result<ExecutionRow, DbError> {
    sqlx::query_as::<_, ExecutionRow>(&format!(
        "SELECT {EXECUTION_COLUMNS} FROM executions WHERE id = $1"
    ))
    .bind(execution_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// List executions, newest first, optionally for one workflow.
pub async fn list_executions(
    pool: &PgPool,
    workflow_id: Option<Uuid>,
) -> Result<Vec<ExecutionRow>, DbError> {
    let rows = sqlx::query_as::<_, ExecutionRow>(&format!(
        "SELECT {EXECUTION_COLUMNS} FROM executions
         WHERE $1::uuid IS NULL OR workflow_id = $1
         ORDER BY started_at DESC"
    ))
    .bind(workflow_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Delete every execution (and, by cascade, every step) of a workflow.
pub async fn delete_executions_for_workflow(
    pool: &PgPool,
    workflow_id: Uuid,
) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM executions WHERE workflow_id = $1")
        .bind(workflow_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// execution_steps
// ---------------------------------------------------------------------------

/// Insert a `running` step with its input snapshot.
pub async fn create_step(
    pool: &PgPool,
    execution_id: Uuid,
    node_id: &str,
    input: serde_json::Value,
) -> Result<StepRow, DbError> {
    let row = sqlx::query_as::<_, StepRow>(&format!(
        "INSERT INTO execution_steps (id, execution_id, node_id, status, started_at, input)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {STEP_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(execution_id)
    .bind(node_id)
    .bind(ExecutionStatus::Running.as_str())
    .bind(Utc::now())
    .bind(input)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Record a step's outcome.
pub async fn update_step(
    pool: &PgPool,
    step_id: Uuid,
    status: ExecutionStatus,
    output: Option<serde_json::Value>,
    logs: Option<serde_json::Value>,
    error: Option<&str>,
    finished_at: Option<DateTime<Utc>>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE execution_steps
         SET status = $1, output = $2, logs = $3, error = $4, finished_at = $5
         WHERE id = $6",
    )
    .bind(status.as_str())
    .bind(output)
    .bind(logs)
    .bind(error)
    .bind(finished_at)
    .bind(step_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// All steps of an execution in creation order.
pub async fn list_steps(pool: &PgPool, execution_id: Uuid) -> Result<Vec<StepRow>, DbError> {
    let rows = sqlx::query_as::<_, StepRow>(&format!(
        "SELECT {STEP_COLUMNS} FROM execution_steps
         WHERE execution_id = $1
         ORDER BY seq ASC"
    ))
    .bind(execution_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
