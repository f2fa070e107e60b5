//! Sandbox error type.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while running a script in the sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Source exceeds the configured size limit; nothing was executed.
    #[error("code is too large ({actual} bytes, max {max})")]
    CodeTooLarge { max: usize, actual: usize },

    /// The script did not finish before the deadline.
    #[error("code execution timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The script threw, or the interpreter hit one of its runtime limits.
    #[error("code execution failed: {0}")]
    Execution(String),

    /// Items could not be passed in, or the result could not be read back.
    #[error("sandbox serialization error: {0}")]
    Serialization(String),

    /// The sandbox thread could not be started or vanished without a result.
    #[error("sandbox internal error: {0}")]
    Internal(String),
}
