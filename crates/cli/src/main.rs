//! `flowctl` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server and cron scheduler.
//! - `migrate`  — run pending database migrations.
//! - `validate` — validate a workflow graph JSON file.
//! - `run`      — execute a workflow graph JSON file once.
//! - `nodes`    — print the built-in node catalog.
//!
//! `sandbox-worker` is internal: code nodes re-invoke the binary with it to
//! evaluate one script in a process that can be killed at the deadline.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use db::{ExecutionStore, MemoryStore, PgStore};
use engine::{WorkflowExecutor, WorkflowGraph};
use nodes::{Items, NodeRegistry};
use sandbox::SandboxConfig;

#[derive(Parser)]
#[command(name = "flowctl", about = "Workflow execution engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct DatabaseArgs {
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
    #[arg(long, env = "FLOWCTL_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,
}

#[derive(Args)]
struct EngineArgs {
    /// Wall-clock limit for each code node, in milliseconds.
    #[arg(long, env = "FLOWCTL_CODE_TIMEOUT_MS", default_value_t = 1000)]
    code_timeout_ms: u64,
}

impl EngineArgs {
    fn registry(&self) -> NodeRegistry {
        let sandbox = SandboxConfig::with_timeout(Duration::from_millis(self.code_timeout_ms));
        NodeRegistry::builtin(sandbox)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "FLOWCTL_BIND", default_value = "0.0.0.0:4000")]
        bind: SocketAddr,
        #[command(flatten)]
        database: DatabaseArgs,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Run pending database migrations.
    Migrate {
        #[command(flatten)]
        database: DatabaseArgs,
    },
    /// Validate a workflow graph JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Execute a workflow graph JSON file and print its steps.
    ///
    /// Runs are recorded in Postgres when DATABASE_URL is set, otherwise in
    /// memory.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// JSON array of initial items.
        #[arg(long)]
        items: Option<PathBuf>,
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Print the built-in node catalog as JSON.
    Nodes,
    /// Evaluate one code-node script read from stdin.
    #[command(hide = true)]
    SandboxWorker,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

async fn run_once(
    path: &Path,
    items: Option<&Path>,
    database_url: Option<&str>,
    engine: &EngineArgs,
) -> anyhow::Result<()> {
    let graph: WorkflowGraph = read_json(path)?;
    let items: Items = match items {
        Some(items) => read_json(items)?,
        None => Vec::new(),
    };

    let store: Arc<dyn ExecutionStore> = match database_url {
        Some(url) => Arc::new(PgStore::new(db::pool::connect(url, 2).await?)),
        None => Arc::new(MemoryStore::new()),
    };
    run_graph(store, engine.registry(), &graph, items).await
}

/// Run `graph` once and print the execution it recorded, if any.
async fn run_graph(
    store: Arc<dyn ExecutionStore>,
    registry: NodeRegistry,
    graph: &WorkflowGraph,
    items: Items,
) -> anyhow::Result<()> {
    let executor = WorkflowExecutor::new(store.clone(), Arc::new(registry));
    let execution_id = executor
        .begin(graph)
        .await
        .context("workflow could not start")?;

    let result = executor.execute(graph, execution_id, items).await;
    if let Err(e) = print_execution(store.as_ref(), execution_id).await {
        warn!(%execution_id, "could not read back execution: {e:#}");
    }
    result.context("workflow run failed")
}

async fn print_execution(store: &dyn ExecutionStore, execution_id: Uuid) -> anyhow::Result<()> {
    let execution = store.get_execution(execution_id).await?;
    println!("execution {} {}", execution.id, execution.status);
    for step in store.list_steps(execution_id).await? {
        println!("  {} {}", step.node_id, step.status);
        if let Some(output) = &step.output {
            println!("    output: {output}");
        }
        if let Some(error) = &step.error {
            println!("    error: {error}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; a sandbox worker's stdout carries its reply.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            database,
            engine,
        } => {
            let pool = db::pool::connect(&database.database_url, database.max_connections)
                .await
                .context("failed to connect to database")?;
            let store = Arc::new(PgStore::new(pool.clone()));
            let executor = WorkflowExecutor::new(store, Arc::new(engine.registry()));

            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down...");
                signal.cancel();
            });

            let state = api::AppState::new(pool, executor, shutdown.clone());
            api::serve(&api::ServerConfig { bind }, state, shutdown).await?;
        }
        Command::Migrate { database } => {
            let pool = db::pool::connect(&database.database_url, database.max_connections)
                .await
                .context("failed to connect to database")?;
            db::pool::migrate(&pool).await.context("migration failed")?;
            info!("Migrations applied successfully");
        }
        Command::Validate { path } => {
            let graph: WorkflowGraph = read_json(&path)?;
            match engine::validate_graph(&graph) {
                Ok(()) => println!(
                    "Workflow is valid: {} nodes, {} edges, {} trigger(s)",
                    graph.nodes.len(),
                    graph.edges.len(),
                    engine::trigger_nodes(&graph).len()
                ),
                Err(e) => bail!("validation failed: {e}"),
            }
        }
        Command::Run {
            path,
            items,
            database_url,
            engine,
        } => {
            run_once(&path, items.as_deref(), database_url.as_deref(), &engine).await?;
        }
        Command::Nodes => {
            let catalog = serde_json::to_string_pretty(&nodes::node_definitions())?;
            println!("{catalog}");
        }
        Command::SandboxWorker => {
            sandbox::worker::serve_stdio().context("sandbox worker failed")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use db::{DbError, ExecutionRow, ExecutionUpdate, StepRow, StepUpdate};
    use engine::{Edge, Node};
    use nodes::mock::MockNode;
    use nodes::Params;
    use serde_json::Value;

    /// A store whose database is unreachable when a run starts.
    struct Unreachable(MemoryStore);

    #[async_trait]
    impl ExecutionStore for Unreachable {
        async fn create_execution(&self, _workflow_id: Uuid) -> Result<ExecutionRow, DbError> {
            Err(DbError::NotFound)
        }
        async fn update_execution(&self, id: Uuid, update: ExecutionUpdate) -> Result<(), DbError> {
            self.0.update_execution(id, update).await
        }
        async fn create_step(&self, id: Uuid, node_id: &str, input: Value) -> Result<StepRow, DbError> {
            self.0.create_step(id, node_id, input).await
        }
        async fn update_step(&self, id: Uuid, update: StepUpdate) -> Result<(), DbError> {
            self.0.update_step(id, update).await
        }
        async fn get_execution(&self, id: Uuid) -> Result<ExecutionRow, DbError> {
            self.0.get_execution(id).await
        }
        async fn list_executions(&self, id: Option<Uuid>) -> Result<Vec<ExecutionRow>, DbError> {
            self.0.list_executions(id).await
        }
        async fn list_steps(&self, id: Uuid) -> Result<Vec<StepRow>, DbError> {
            self.0.list_steps(id).await
        }
    }

    fn two_step_graph() -> WorkflowGraph {
        WorkflowGraph::new(
            Uuid::new_v4(),
            vec![
                Node::new("t", "manualTrigger", Params::new()),
                Node::new("x", "boom", Params::new()),
            ],
            vec![Edge {
                id: "e".into(),
                source: "t".into(),
                target: "x".into(),
                source_handle: None,
                target_handle: None,
            }],
        )
    }

    fn registry() -> NodeRegistry {
        NodeRegistry::new()
            .with("manualTrigger", Arc::new(MockNode::passthrough("t")))
            .with("boom", Arc::new(MockNode::failing("boom", "upstream refused")))
    }

    #[tokio::test]
    async fn start_failure_is_reported_as_is() {
        let store = Arc::new(Unreachable(MemoryStore::new()));
        let err = run_graph(store, registry(), &two_step_graph(), vec![])
            .await
            .unwrap_err();

        let chain = format!("{err:#}");
        assert!(chain.contains("workflow could not start"), "{chain}");
        assert!(chain.contains("record not found"), "{chain}");
    }

    #[tokio::test]
    async fn node_failure_is_returned_after_the_execution_is_recorded() {
        let store = Arc::new(MemoryStore::new());
        let graph = two_step_graph();
        let err = run_graph(store.clone(), registry(), &graph, vec![])
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("upstream refused"));
        let executions = store.list_executions(Some(graph.id)).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].error.as_deref(), Some("upstream refused"));
    }
}
