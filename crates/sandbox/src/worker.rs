//! Child-process side of the sandbox, and the parent that drives it.
//!
//! A worker reads one JSON [`WorkerRequest`] from stdin, evaluates it and
//! writes one JSON [`WorkerReply`] to stdout before exiting. The parent
//! kills the worker if no reply arrives before the deadline.

use std::io::{Read, Write};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::js::{evaluate, WorkerCommand};
use crate::{SandboxError, SandboxOutput};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    pub code: String,
    pub items: Value,
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum WorkerReply {
    Finished { value: Value, logs: Vec<String> },
    /// The script threw or hit an interpreter limit.
    Threw { message: String },
    /// The request or the script's result could not be (de)serialized.
    Invalid { message: String },
}

impl From<Result<SandboxOutput, SandboxError>> for WorkerReply {
    fn from(result: Result<SandboxOutput, SandboxError>) -> Self {
        match result {
            Ok(SandboxOutput { value, logs }) => Self::Finished { value, logs },
            Err(SandboxError::Execution(message)) => Self::Threw { message },
            Err(other) => Self::Invalid {
                message: other.to_string(),
            },
        }
    }
}

impl WorkerReply {
    fn into_result(self) -> Result<SandboxOutput, SandboxError> {
        match self {
            Self::Finished { value, logs } => Ok(SandboxOutput { value, logs }),
            Self::Threw { message } => Err(SandboxError::Execution(message)),
            Self::Invalid { message } => Err(SandboxError::Serialization(message)),
        }
    }
}

/// Serve a single request over stdin/stdout. This is the whole body of a
/// worker process.
pub fn serve_stdio() -> std::io::Result<()> {
    let mut input = Vec::new();
    std::io::stdin().lock().read_to_end(&mut input)?;

    let reply = match serde_json::from_slice::<WorkerRequest>(&input) {
        Ok(request) => WorkerReply::from(evaluate(&request)),
        Err(e) => WorkerReply::Invalid {
            message: format!("malformed worker request: {e}"),
        },
    };

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &reply)?;
    stdout.flush()
}

/// Start a worker, hand it `request` and wait at most `timeout` for the reply.
pub(crate) async fn run_in_worker(
    command: &WorkerCommand,
    request: &WorkerRequest,
    timeout: Duration,
) -> Result<SandboxOutput, SandboxError> {
    let payload =
        serde_json::to_vec(request).map_err(|e| SandboxError::Serialization(e.to_string()))?;
    let program = command
        .resolve_program()
        .map_err(|e| SandboxError::Internal(format!("cannot locate sandbox worker: {e}")))?;

    let mut child = Command::new(&program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            SandboxError::Internal(format!("failed to start sandbox worker {}: {e}", program.display()))
        })?;

    let (Some(mut stdin), Some(mut stdout)) = (child.stdin.take(), child.stdout.take()) else {
        terminate(&mut child).await;
        return Err(SandboxError::Internal("sandbox worker pipes unavailable".into()));
    };

    let exchange = async move {
        stdin.write_all(&payload).await?;
        drop(stdin);
        let mut reply = Vec::new();
        stdout.read_to_end(&mut reply).await?;
        Ok::<_, std::io::Error>(reply)
    };

    let reply = match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => {
            terminate(&mut child).await;
            return Err(SandboxError::Internal(format!("sandbox worker i/o failed: {e}")));
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "sandbox deadline exceeded, killing worker");
            terminate(&mut child).await;
            return Err(SandboxError::Timeout(timeout));
        }
    };

    let status = child
        .wait()
        .await
        .map_err(|e| SandboxError::Internal(format!("sandbox worker wait failed: {e}")))?;
    debug!(%status, "sandbox worker exited");

    serde_json::from_slice::<WorkerReply>(&reply)
        .map_err(|e| {
            SandboxError::Internal(format!("sandbox worker exited with {status} without a reply: {e}"))
        })?
        .into_result()
}

/// SIGKILL the worker and reap it.
async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!("could not kill sandbox worker: {e}");
    }
}
