//! Cron trigger source: fires active workflows that contain a
//! `cronTrigger` node.
//!
//! Every reload cancels the previous generation of jobs and spawns one task
//! per valid cron node. Each firing runs the workflow with no items.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use db::WorkflowRow;
use engine::{WorkflowExecutor, WorkflowGraph};
use nodes::BuiltinNode;

/// Parse a cron expression. Five-field expressions (no seconds) are
/// accepted and fire at second zero.
pub fn parse_schedule(expression: &str) -> Result<Schedule, cron::error::Error> {
    let expression = expression.trim();
    if expression.split_whitespace().count() == 5 {
        Schedule::from_str(&format!("0 {expression}"))
    } else {
        Schedule::from_str(expression)
    }
}

pub struct CronScheduler {
    executor: WorkflowExecutor,
    shutdown: CancellationToken,
    generation: Mutex<CancellationToken>,
}

impl CronScheduler {
    pub fn new(executor: WorkflowExecutor, shutdown: CancellationToken) -> Self {
        let generation = Mutex::new(shutdown.child_token());
        Self {
            executor,
            shutdown,
            generation,
        }
    }

    /// Replace every scheduled job with those found in `workflows`.
    ///
    /// Inactive workflows, unparsable definitions and invalid expressions
    /// are skipped. Returns the number of jobs now scheduled.
    pub async fn reload(&self, workflows: &[WorkflowRow]) -> usize {
        let mut generation = self.generation.lock().await;
        generation.cancel();
        *generation = self.shutdown.child_token();

        let mut scheduled = 0;
        for row in workflows.iter().filter(|row| row.active) {
            let graph = match WorkflowGraph::from_definition(row.id, row.definition.clone()) {
                Ok(graph) => Arc::new(graph),
                Err(e) => {
                    warn!(workflow_id = %row.id, error = %e, "unreadable workflow definition, skipping");
                    continue;
                }
            };

            let cron_nodes = graph
                .nodes
                .iter()
                .filter(|node| node.node_type == BuiltinNode::CronTrigger.type_name());

            for node in cron_nodes {
                let Some(expression) = node
                    .params
                    .get("cronExpression")
                    .and_then(Value::as_str)
                    .filter(|e| !e.trim().is_empty())
                else {
                    continue;
                };

                match parse_schedule(expression) {
                    Ok(schedule) => {
                        info!(workflow_id = %row.id, node_id = %node.id, expression, "cron job registered");
                        tokio::spawn(run_job(
                            self.executor.clone(),
                            graph.clone(),
                            schedule,
                            generation.clone(),
                        ));
                        scheduled += 1;
                    }
                    Err(e) => {
                        warn!(
                            workflow_id = %row.id,
                            node_id = %node.id,
                            expression,
                            error = %e,
                            "invalid cron expression, skipping job"
                        );
                    }
                }
            }
        }

        info!(scheduled, "cron schedule reloaded");
        scheduled
    }
}

async fn run_job(
    executor: WorkflowExecutor,
    graph: Arc<WorkflowGraph>,
    schedule: Schedule,
    cancel: CancellationToken,
) {
    let mut last_fire: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        let from = last_fire.map_or(now, |last| last.max(now));
        let Some(fire_at) = schedule.after(&from).next() else {
            break;
        };
        let delay = (fire_at - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                last_fire = Some(fire_at);
                let executor = executor.clone();
                let graph = graph.clone();
                tokio::spawn(async move {
                    match executor.run(&graph, Vec::new()).await {
                        Ok(execution_id) => info!(workflow_id = %graph.id, %execution_id, "cron run finished"),
                        Err(e) => error!(workflow_id = %graph.id, error = %e, "cron run failed"),
                    }
                });
            }
            _ = cancel.cancelled() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::{ExecutionStore, MemoryStore};
    use nodes::NodeRegistry;
    use serde_json::json;
    use uuid::Uuid;

    fn row(active: bool, expression: &str) -> WorkflowRow {
        WorkflowRow {
            id: Uuid::new_v4(),
            name: "cron".into(),
            active,
            definition: json!({
                "nodes": [{
                    "id": "c",
                    "type": "cronTrigger",
                    "position": { "x": 0, "y": 0 },
                    "data": { "label": "Every tick", "params": { "cronExpression": expression } }
                }],
                "edges": []
            }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn scheduler(store: Arc<MemoryStore>) -> CronScheduler {
        let executor = WorkflowExecutor::new(
            store,
            Arc::new(NodeRegistry::builtin(Default::default())),
        );
        CronScheduler::new(executor, CancellationToken::new())
    }

    #[test]
    fn five_and_six_field_expressions_parse() {
        assert!(parse_schedule("*/5 * * * *").is_ok());
        assert!(parse_schedule("0 */5 * * * *").is_ok());
        assert!(parse_schedule("every minute").is_err());
    }

    #[tokio::test]
    async fn reload_skips_inactive_and_invalid_jobs() {
        let cron = scheduler(Arc::new(MemoryStore::new()));
        let rows = vec![
            row(true, "0 0 * * *"),
            row(false, "0 0 * * *"),
            row(true, "not a schedule"),
            row(true, ""),
        ];
        assert_eq!(cron.reload(&rows).await, 1);
        assert_eq!(cron.reload(&[]).await, 0);
    }

    #[tokio::test]
    async fn scheduled_workflow_fires_and_stops_on_reload() {
        let store = Arc::new(MemoryStore::new());
        let cron = scheduler(store.clone());
        let workflow = row(true, "* * * * * *");
        cron.reload(std::slice::from_ref(&workflow)).await;

        let mut fired = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if store.execution_count().await > 0 {
                fired = true;
                break;
            }
        }
        assert!(fired, "cron job never fired");

        let runs = store.list_executions(Some(workflow.id)).await.unwrap();
        assert!(runs.iter().all(|run| run.workflow_id == workflow.id));

        cron.reload(&[]).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let settled = store.execution_count().await;
        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert_eq!(store.execution_count().await, settled);
    }
}
