//! `engine` crate — graph models, the adjacency index, and the execution
//! engine that walks a workflow graph.

pub mod models;
pub mod error;
pub mod graph;
pub mod executor;

pub use models::{Edge, Node, WorkflowGraph};
pub use error::EngineError;
pub use graph::{trigger_nodes, validate_graph, Adjacency};
pub use executor::WorkflowExecutor;
