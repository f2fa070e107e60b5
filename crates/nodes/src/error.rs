//! Node-level error type.

use thiserror::Error;

/// Errors returned by a handler's `execute` method.
///
/// Every variant is fatal for the run: the engine records the message on the
/// execution verbatim and stops. Nothing is retried.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Params are missing or malformed (e.g. an HTTP node without a url).
    #[error("{0}")]
    InvalidParams(String),

    /// The handler produced something that breaks the item contract.
    #[error("{0}")]
    ContractViolation(String),

    /// The outbound request could not be completed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// User code timed out, threw, or could not be run.
    #[error(transparent)]
    Sandbox(#[from] sandbox::SandboxError),

    /// Any other handler failure.
    #[error("{0}")]
    Failed(String),
}
