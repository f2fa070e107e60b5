//! The recording seam between the engine and storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    models::{ExecutionRow, ExecutionStatus, StepRow},
    repository::executions,
    DbError, DbPool,
};

/// Terminal state written to an execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUpdate {
    pub status: ExecutionStatus,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ExecutionUpdate {
    pub fn success() -> Self {
        Self {
            status: ExecutionStatus::Success,
            finished_at: Some(Utc::now()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            finished_at: Some(Utc::now()),
            error: Some(error.into()),
        }
    }
}

/// Outcome written to a step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepUpdate {
    pub status: ExecutionStatus,
    pub output: Option<Value>,
    pub logs: Option<Vec<String>>,
    pub error: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepUpdate {
    pub fn success(output: Value, logs: Option<Vec<String>>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            output: Some(output),
            logs,
            error: None,
            finished_at: Some(Utc::now()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            output: None,
            logs: None,
            error: Some(error.into()),
            finished_at: Some(Utc::now()),
        }
    }

    pub(crate) fn logs_json(&self) -> Option<Value> {
        self.logs
            .as_ref()
            .map(|lines| Value::Array(lines.iter().cloned().map(Value::String).collect()))
    }
}

/// Where executions and their steps are recorded.
///
/// Implementations must refuse to update an execution that is already
/// terminal with [`DbError::ExecutionFinished`].
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create_execution(&self, workflow_id: Uuid) -> Result<ExecutionRow, DbError>;

    async fn update_execution(
        &self,
        execution_id: Uuid,
        update: ExecutionUpdate,
    ) -> Result<(), DbError>;

    async fn create_step(
        &self,
        execution_id: Uuid,
        node_id: &str,
        input: Value,
    ) -> Result<StepRow, DbError>;

    async fn update_step(&self, step_id: Uuid, update: StepUpdate) -> Result<(), DbError>;

    async fn get_execution(&self, execution_id: Uuid) -> Result<ExecutionRow, DbError>;

    /// Newest first, optionally restricted to one workflow.
    async fn list_executions(&self, workflow_id: Option<Uuid>)
        -> Result<Vec<ExecutionRow>, DbError>;

    /// Steps of one execution in creation order.
    async fn list_steps(&self, execution_id: Uuid) -> Result<Vec<StepRow>, DbError>;
}

/// [`ExecutionStore`] backed by the Postgres pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl ExecutionStore for PgStore {
    async fn create_execution(&self, workflow_id: Uuid) -> Result<ExecutionRow, DbError> {
        executions::create_execution(&self.pool, workflow_id).await
    }

    async fn update_execution(
        &self,
        execution_id: Uuid,
        update: ExecutionUpdate,
    ) -> Result<(), DbError> {
        executions::update_execution(
            &self.pool,
            execution_id,
            update.status,
            update.finished_at,
            update.error.as_deref(),
        )
        .await
    }

    async fn create_step(
        &self,
        execution_id: Uuid,
        node_id: &str,
        input: Value,
    ) -> Result<StepRow, DbError> {
        executions::create_step(&self.pool, execution_id, node_id, input).await
    }

    async fn update_step(&self, step_id: Uuid, update: StepUpdate) -> Result<(), DbError> {
        let logs = update.logs_json();
        executions::update_step(
            &self.pool,
            step_id,
            update.status,
            update.output,
            logs,
            update.error.as_deref(),
            update.finished_at,
        )
        .await
    }

    async fn get_execution(&self, execution_id: Uuid) -> Result<ExecutionRow, DbError> {
        executions::get_execution(&self.pool, execution_id).await
    }

    async fn list_executions(
        &self,
        workflow_id: Option<Uuid>,
    ) -> Result<Vec<ExecutionRow>, DbError> {
        executions::list_executions(&self.pool, workflow_id).await
    }

    async fn list_steps(&self, execution_id: Uuid) -> Result<Vec<StepRow>, DbError> {
        executions::list_steps(&self.pool, execution_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_update_carries_message_and_finish_time() {
        let update = ExecutionUpdate::failed("boom");
        assert_eq!(update.status, ExecutionStatus::Failed);
        assert_eq!(update.error.as_deref(), Some("boom"));
        assert!(update.finished_at.is_some());
    }

    #[test]
    fn step_logs_serialise_as_a_json_array() {
        let update = StepUpdate::success(Value::Null, Some(vec!["a".into(), "b".into()]));
        assert_eq!(update.logs_json(), Some(serde_json::json!(["a", "b"])));
        assert_eq!(StepUpdate::failed("x").logs_json(), None);
    }
}
