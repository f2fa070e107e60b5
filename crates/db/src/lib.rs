//! `db` crate — the persistence gateway.
//!
//! Provides the [`ExecutionStore`] trait the engine records runs through, a
//! Postgres implementation backed by a connection pool, an in-memory
//! implementation for tests and one-shot runs, typed row structs, and
//! repository functions for every table. No business logic lives here.

pub mod error;
pub mod memory;
pub mod models;
pub mod pool;
pub mod repository;
pub mod store;

pub use error::DbError;
pub use memory::MemoryStore;
pub use models::{ExecutionRow, ExecutionStatus, StepRow, UnknownStatus, WorkflowRow};
pub use pool::DbPool;
pub use store::{ExecutionStore, ExecutionUpdate, PgStore, StepUpdate};
