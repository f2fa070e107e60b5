//! `sandbox` crate — isolated, time-bounded execution of user-supplied JavaScript.
//!
//! Scripts run inside a fresh `boa_engine` context, normally in a short-lived
//! worker process that is killed at the deadline. The context has no host
//! bindings: nothing in it can reach the network, the filesystem, the process
//! environment or a module loader. The only inputs a script sees are the
//! items value and a buffering `console`.

pub mod error;
pub mod js;
pub mod worker;

pub use error::SandboxError;
pub use js::{Isolation, JsSandbox, SandboxConfig, SandboxOutput, WorkerCommand, WORKER_SUBCOMMAND};
