//! `api` crate — HTTP REST API and the cron trigger source.
//!
//! Exposes:
//!   GET    /api/nodes
//!   GET    /api/workflows
//!   POST   /api/workflows
//!   GET    /api/workflows/:id
//!   PUT    /api/workflows/:id
//!   DELETE /api/workflows/:id
//!   POST   /api/workflows/:id/run
//!   GET    /api/executions?workflowId=
//!   GET    /api/executions/:id
//!   ANY    /api/webhooks/*path

pub mod error;
pub mod handlers;
pub mod scheduler;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{any, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use db::{repository::workflows as wf_repo, DbPool};
use engine::WorkflowExecutor;

pub use error::ApiError;
pub use scheduler::CronScheduler;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Workflow definitions.
    pub pool: DbPool,
    /// Runs workflows and records them in its store.
    pub executor: WorkflowExecutor,
    pub scheduler: Arc<CronScheduler>,
}

impl AppState {
    /// `shutdown` also stops every cron job.
    pub fn new(pool: DbPool, executor: WorkflowExecutor, shutdown: CancellationToken) -> Self {
        let scheduler = Arc::new(CronScheduler::new(executor.clone(), shutdown));
        Self {
            pool,
            executor,
            scheduler,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

/// Reload cron jobs from the active workflows.
pub async fn reschedule(state: &AppState) -> Result<(), ApiError> {
    let workflows = wf_repo::list_active_workflows(&state.pool).await?;
    state.scheduler.reload(&workflows).await;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    use handlers::{executions, nodes, webhooks, workflows};

    Router::new()
        .route("/api/nodes", get(nodes::list))
        .route("/api/workflows", get(workflows::list).post(workflows::create))
        .route(
            "/api/workflows/:id",
            get(workflows::get)
                .put(workflows::update)
                .delete(workflows::delete),
        )
        .route("/api/workflows/:id/run", post(executions::run))
        .route("/api/executions", get(executions::list))
        .route("/api/executions/:id", get(executions::get))
        .route("/api/webhooks/*path", any(webhooks::handle_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until `shutdown` is cancelled.
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Err(e) = reschedule(&state).await {
        warn!(error = %e, "could not load cron schedules");
    }

    let listener = TcpListener::bind(config.bind).await?;
    info!(bind = %config.bind, "API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("API shut down");
    Ok(())
}

#[cfg(test)]
mod tests;
