//! Route handlers, one module per resource.

pub mod executions;
pub mod nodes;
pub mod webhooks;
pub mod workflows;
