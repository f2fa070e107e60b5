//! `nodes` crate — the `NodeHandler` contract, the handler registry, and the
//! built-in node implementations.
//!
//! Every node type, built-in or registered by an embedder, implements
//! [`NodeHandler`]. The engine crate dispatches through the [`NodeRegistry`]
//! and never looks at a node's params itself.

pub mod builtin;
pub mod definitions;
pub mod error;
pub mod mock;
pub mod registry;
pub mod traits;

pub use definitions::{node_definitions, NodeDefinition, ParamSchema};
pub use error::NodeError;
pub use registry::{is_trigger_type, BuiltinNode, NodeRegistry};
pub use traits::{Item, Items, NodeContext, NodeHandler, NodeOutput, Params, DEFAULT_HANDLE};
