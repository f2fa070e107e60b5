//! Workflow CRUD operations.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::WorkflowRow};

const WORKFLOW_COLUMNS: &str = "id, name, active, definition, created_at, updated_at";

/// Insert a new workflow into the database.
///
/// `definition` must be a JSON object with `nodes` and `edges`, as produced
/// by serialising the graph types of the `engine` crate.
pub async fn create_workflow(
    pool: &PgPool,
    name: &str,
    active: bool,
    definition: serde_json::Value,
) -> Result<WorkflowRow, DbError> {
    let now = Utc::now();

    let row = sqlx::query_as::<_, WorkflowRow>(&format!(
        "INSERT INTO workflows (id, name, active, definition, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $5)
         RETURNING {WORKFLOW_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(active)
    .bind(definition)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single workflow by its primary key.
pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    sqlx::query_as::<_, WorkflowRow>(&format!(
        "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Return all workflows ordered by creation time (newest first).
pub async fn list_workflows(pool: &PgPool) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowRow>(&format!(
        "SELECT {WORKFLOW_COLUMNS} FROM workflows ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Return the workflows that answer webhooks and cron schedules.
pub async fn list_active_workflows(pool: &PgPool) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowRow>(&format!(
        "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE active ORDER BY created_at ASC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Replace a workflow's name, active flag and definition.
pub async fn update_workflow(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    active: bool,
    definition: serde_json::Value,
) -> Result<WorkflowRow, DbError> {
    sqlx::query_as::<_, WorkflowRow>(&format!(
        "UPDATE workflows
         SET name = $1, active = $2, definition = $3, updated_at = $4
         WHERE id = $5
         RETURNING {WORKFLOW_COLUMNS}"
    ))
    .bind(name)
    .bind(active)
    .bind(definition)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Permanently delete a workflow by its primary key.
///
/// Returns `DbError::NotFound` if no row was deleted.
pub async fn delete_workflow(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
