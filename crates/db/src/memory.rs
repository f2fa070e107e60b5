//! In-process [`ExecutionStore`] for tests and one-shot CLI runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    models::{ExecutionRow, ExecutionStatus, StepRow},
    store::{ExecutionStore, ExecutionUpdate, StepUpdate},
    DbError,
};

#[derive(Debug, Default)]
struct Inner {
    executions: Vec<ExecutionRow>,
    /// Steps in insertion order; the index doubles as the sequence number.
    steps: Vec<StepRow>,
    step_index: HashMap<Uuid, usize>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executions recorded so far.
    pub async fn execution_count(&self) -> usize {
        self.inner.lock().await.executions.len()
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(&self, workflow_id: Uuid) -> Result<ExecutionRow, DbError> {
        let row = ExecutionRow {
            id: Uuid::new_v4(),
            workflow_id,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        };
        self.inner.lock().await.executions.push(row.clone());
        Ok(row)
    }

    async fn update_execution(
        &self,
        execution_id: Uuid,
        update: ExecutionUpdate,
    ) -> Result<(), DbError> {
        let mut inner = self.inner.lock().await;
        let row = inner
            .executions
            .iter_mut()
            .find(|row| row.id == execution_id)
            .ok_or(DbError::NotFound)?;

        if row.status.is_terminal() {
            return Err(DbError::ExecutionFinished(execution_id));
        }

        row.status = update.status;
        row.finished_at = update.finished_at;
        row.error = update.error;
        Ok(())
    }

    async fn create_step(
        &self,
        execution_id: Uuid,
        node_id: &str,
        input: Value,
    ) -> Result<StepRow, DbError> {
        let mut inner = self.inner.lock().await;
        if !inner.executions.iter().any(|row| row.id == execution_id) {
            return Err(DbError::NotFound);
        }

        let row = StepRow {
            id: Uuid::new_v4(),
            execution_id,
            node_id: node_id.to_owned(),
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            input,
            output: None,
            logs: None,
            error: None,
        };
        let index = inner.steps.len();
        inner.step_index.insert(row.id, index);
        inner.steps.push(row.clone());
        Ok(row)
    }

    async fn update_step(&self, step_id: Uuid, update: StepUpdate) -> Result<(), DbError> {
        let logs = update.logs_json();
        let mut inner = self.inner.lock().await;
        let index = *inner.step_index.get(&step_id).ok_or(DbError::NotFound)?;
        let row = &mut inner.steps[index];

        row.status = update.status;
        row.output = update.output;
        row.logs = logs;
        row.error = update.error;
        row.finished_at = update.finished_at;
        Ok(())
    }

    async fn get_execution(&self, execution_id: Uuid) -> Result<ExecutionRow, DbError> {
        self.inner
            .lock()
            .await
            .executions
            .iter()
            .find(|row| row.id == execution_id)
            .cloned()
            .ok_or(DbError::NotFound)
    }

    async fn list_executions(
        &self,
        workflow_id: Option<Uuid>,
    ) -> Result<Vec<ExecutionRow>, DbError> {
        let inner = self.inner.lock().await;
        // Insertion order is start order, so reversing gives newest first.
        Ok(inner
            .executions
            .iter()
            .rev()
            .filter(|row| workflow_id.map_or(true, |id| row.workflow_id == id))
            .cloned()
            .collect())
    }

    async fn list_steps(&self, execution_id: Uuid) -> Result<Vec<StepRow>, DbError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .steps
            .iter()
            .filter(|row| row.execution_id == execution_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn execution_lifecycle() {
        let store = MemoryStore::new();
        let wf = Uuid::new_v4();

        let exec = store.create_execution(wf).await.unwrap();
        assert_eq!(exec.status, ExecutionStatus::Running);
        assert!(exec.finished_at.is_none());

        store
            .update_execution(exec.id, ExecutionUpdate::success())
            .await
            .unwrap();

        let stored = store.get_execution(exec.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Success);
        assert!(stored.finished_at.is_some());
        assert!(stored.error.is_none());
    }

    #[tokio::test]
    async fn finished_executions_cannot_be_updated() {
        let store = MemoryStore::new();
        let exec = store.create_execution(Uuid::new_v4()).await.unwrap();
        store
            .update_execution(exec.id, ExecutionUpdate::failed("boom"))
            .await
            .unwrap();

        let err = store
            .update_execution(exec.id, ExecutionUpdate::success())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ExecutionFinished(id) if id == exec.id));

        let stored = store.get_execution(exec.id).await.unwrap();
        assert_eq!(stored.status, ExecutionStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let store = MemoryStore::new();
        let missing = Uuid::new_v4();

        assert!(matches!(store.get_execution(missing).await, Err(DbError::NotFound)));
        assert!(matches!(
            store.update_execution(missing, ExecutionUpdate::success()).await,
            Err(DbError::NotFound)
        ));
        assert!(matches!(
            store.create_step(missing, "a", json!([])).await,
            Err(DbError::NotFound)
        ));
        assert!(matches!(
            store.update_step(missing, StepUpdate::failed("x")).await,
            Err(DbError::NotFound)
        ));
    }

    #[tokio::test]
    async fn steps_are_listed_in_creation_order() {
        let store = MemoryStore::new();
        let exec = store.create_execution(Uuid::new_v4()).await.unwrap();
        let other = store.create_execution(Uuid::new_v4()).await.unwrap();

        let a = store.create_step(exec.id, "a", json!([{ "x": 1 }])).await.unwrap();
        store.create_step(other.id, "z", json!([])).await.unwrap();
        store.create_step(exec.id, "b", json!([])).await.unwrap();

        store
            .update_step(a.id, StepUpdate::success(json!([{ "x": 1 }]), Some(vec!["hi".into()])))
            .await
            .unwrap();

        let steps = store.list_steps(exec.id).await.unwrap();
        let ids: Vec<_> = steps.iter().map(|s| s.node_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(steps[0].status, ExecutionStatus::Success);
        assert_eq!(steps[0].logs, Some(json!(["hi"])));
        assert_eq!(steps[1].status, ExecutionStatus::Running);
    }

    #[tokio::test]
    async fn executions_list_newest_first_and_filter_by_workflow() {
        let store = MemoryStore::new();
        let wf = Uuid::new_v4();
        let first = store.create_execution(wf).await.unwrap();
        store.create_execution(Uuid::new_v4()).await.unwrap();
        let third = store.create_execution(wf).await.unwrap();

        let all = store.list_executions(None).await.unwrap();
        assert_eq!(all.len(), 3);

        let mine: Vec<_> = store
            .list_executions(Some(wf))
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.id)
            .collect();
        assert_eq!(mine, [third.id, first.id]);
    }
}
