use thiserror::Error;
use uuid::Uuid;

/// Failures surfaced by the stores and repository functions.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The workflow, execution or step does not exist.
    #[error("record not found")]
    NotFound,

    /// An update targeted an execution that already reached success/failed.
    #[error("execution {0} is already finished")]
    ExecutionFinished(Uuid),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
