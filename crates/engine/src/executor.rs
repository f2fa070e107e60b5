//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the central orchestrator:
//! 1. Finds the trigger nodes and seeds a FIFO queue with them.
//! 2. Dequeues one node at a time, hands it every item delivered to it so
//!    far and dispatches it through the [`NodeRegistry`].
//! 3. Routes the handler's result along the node's outgoing edges, either by
//!    named handle (`outputs`) or by broadcasting `default`.
//! 4. Records the execution and one step per visit via an [`ExecutionStore`].
//!
//! The first failure aborts the run. Nothing is retried.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use db::{ExecutionStore, ExecutionUpdate, StepUpdate};
use nodes::{Items, NodeContext, NodeOutput, NodeRegistry};

use crate::graph::{trigger_nodes, Adjacency};
use crate::models::{Node, WorkflowGraph};
use crate::EngineError;

/// Snapshot of a batch as stored in a step's `input` column.
fn items_value(items: &Items) -> Value {
    Value::Array(items.iter().cloned().map(Value::Object).collect())
}

// ---------------------------------------------------------------------------
// Walk state
// ---------------------------------------------------------------------------

/// Mutable state of one graph walk. Borrowed from the graph, so it lives
/// exactly as long as the run.
struct Walk<'g> {
    nodes: HashMap<&'g str, &'g Node>,
    adjacency: Adjacency<'g>,
    queue: VecDeque<&'g str>,
    buffers: HashMap<&'g str, Items>,
}

impl<'g> Walk<'g> {
    fn new(graph: &'g WorkflowGraph) -> Self {
        Self {
            // First node wins on duplicate ids.
            nodes: graph.nodes.iter().rev().map(|n| (n.id.as_str(), n)).collect(),
            adjacency: Adjacency::build(&graph.edges),
            queue: VecDeque::new(),
            buffers: HashMap::new(),
        }
    }

    /// Append `items` to `node_id`'s buffer and schedule a visit.
    fn deliver(&mut self, node_id: &'g str, items: Items) {
        self.buffers.entry(node_id).or_default().extend(items);
        self.queue.push_back(node_id);
    }

    /// Everything delivered to `node_id` so far. Buffers only grow, so a
    /// revisited node sees earlier deliveries again.
    fn inputs(&self, node_id: &str) -> Items {
        self.buffers.get(node_id).cloned().unwrap_or_default()
    }

    /// Push a node's result along each of its outgoing edges, in order.
    fn route(&mut self, node_id: &str, output: &NodeOutput) {
        let edges = self.adjacency.outgoing(node_id).to_vec();
        for edge in edges {
            self.deliver(edge.target.as_str(), output.items_for_handle(edge.handle()));
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Stateless orchestrator; one instance can serve any number of concurrent
/// runs.
#[derive(Clone)]
pub struct WorkflowExecutor {
    store: Arc<dyn ExecutionStore>,
    registry: Arc<NodeRegistry>,
}

impl std::fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutor")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl WorkflowExecutor {
    /// Create a new executor.
    pub fn new(store: Arc<dyn ExecutionStore>, registry: Arc<NodeRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<dyn ExecutionStore> {
        &self.store
    }

    /// Run `graph` from its trigger nodes, each seeded with `items`, and
    /// return the id of the recorded execution.
    ///
    /// # Errors
    /// [`EngineError::NoTriggerNode`] before anything is recorded. Every
    /// other error leaves the execution `failed` with the error's message.
    pub async fn run(&self, graph: &WorkflowGraph, items: Items) -> Result<Uuid, EngineError> {
        let execution_id = self.begin(graph).await?;
        self.execute(graph, execution_id, items).await?;
        Ok(execution_id)
    }

    /// Check that `graph` can start and record a `running` execution for it.
    ///
    /// # Errors
    /// [`EngineError::NoTriggerNode`], or a database error from creating the
    /// execution. Nothing is recorded in either case.
    pub async fn begin(&self, graph: &WorkflowGraph) -> Result<Uuid, EngineError> {
        if trigger_nodes(graph).is_empty() {
            return Err(EngineError::NoTriggerNode);
        }
        let execution_id = self.store.create_execution(graph.id).await?.id;
        info!(workflow_id = %graph.id, %execution_id, "execution started");
        Ok(execution_id)
    }

    /// Walk `graph` for an execution created by [`begin`](Self::begin) and
    /// record its outcome.
    ///
    /// # Errors
    /// The error that stopped the walk; the execution is then `failed` with
    /// its message.
    #[instrument(skip(self, graph, items), fields(workflow_id = %graph.id))]
    pub async fn execute(
        &self,
        graph: &WorkflowGraph,
        execution_id: Uuid,
        items: Items,
    ) -> Result<(), EngineError> {
        let mut walk = Walk::new(graph);
        for trigger in trigger_nodes(graph) {
            walk.deliver(trigger.id.as_str(), items.clone());
        }

        match self.drain(graph.id, execution_id, &mut walk).await {
            Ok(visits) => {
                self.store
                    .update_execution(execution_id, ExecutionUpdate::success())
                    .await?;
                info!(visits, "execution succeeded");
                Ok(())
            }
            Err(err) => {
                error!(node_id = err.node_id(), "execution failed: {err}");
                if let Err(db_err) = self
                    .store
                    .update_execution(execution_id, ExecutionUpdate::failed(err.to_string()))
                    .await
                {
                    warn!("could not mark execution failed: {db_err}");
                }
                Err(err)
            }
        }
    }

    /// Process the queue until it is empty; returns the number of visits.
    async fn drain<'g>(
        &self,
        workflow_id: Uuid,
        execution_id: Uuid,
        walk: &mut Walk<'g>,
    ) -> Result<usize, EngineError> {
        let mut visits = 0;

        while let Some(node_id) = walk.queue.pop_front() {
            let Some(node) = walk.nodes.get(node_id).copied() else {
                warn!(node_id, "edge targets an unknown node, skipping");
                continue;
            };
            let items = walk.inputs(node_id);

            let handler = self.registry.get(&node.node_type).ok_or_else(|| {
                EngineError::UnknownNodeType {
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                }
            })?;

            let step = self
                .store
                .create_step(execution_id, &node.id, items_value(&items))
                .await?;

            let ctx = NodeContext {
                workflow_id,
                execution_id,
                node_id: node.id.clone(),
            };
            let span = info_span!("node", node_id = %node.id, node_type = %node.node_type);
            let result = handler
                .execute(&node.params, items, &ctx)
                .instrument(span)
                .await
                .map_err(|source| EngineError::Node {
                    node_id: node.id.clone(),
                    source,
                });

            let recorded = match result {
                Ok(output) => self
                    .store
                    .update_step(
                        step.id,
                        StepUpdate::success(output.step_payload(), output.logs.clone()),
                    )
                    .await
                    .map(|()| output)
                    .map_err(EngineError::from),
                Err(err) => Err(err),
            };

            let output = match recorded {
                Ok(output) => output,
                Err(err) => {
                    if let Err(db_err) = self
                        .store
                        .update_step(step.id, StepUpdate::failed(err.to_string()))
                        .await
                    {
                        warn!(step_id = %step.id, "could not mark step failed: {db_err}");
                    }
                    return Err(err);
                }
            };

            walk.route(node_id, &output);
            visits += 1;
        }

        Ok(visits)
    }
}
