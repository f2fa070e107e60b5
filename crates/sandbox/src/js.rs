//! JavaScript sandbox backed by `boa_engine`.
//!
//! User code is a single expression evaluating to a function `items => items`.
//! It is spliced into a wrapper script that parses the items from JSON text,
//! calls the function, and hands the result and the buffered console lines
//! back as JSON text. Nothing but strings crosses the boundary.
//!
//! By default the script runs in a child worker process (see
//! [`crate::worker`]) that is killed when the deadline passes.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use boa_engine::{Context, Source};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::worker::{self, WorkerRequest};
use crate::SandboxError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Argument that turns an executable into a sandbox worker.
pub const WORKER_SUBCOMMAND: &str = "sandbox-worker";

/// Program and arguments that start a sandbox worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    /// `None` re-invokes the running executable.
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// A dedicated worker binary that takes no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
            args: Vec::new(),
        }
    }

    /// `<running executable> sandbox-worker`, as served by `flowctl`.
    pub fn current_exe() -> Self {
        Self {
            program: None,
            args: vec![WORKER_SUBCOMMAND.to_owned()],
        }
    }

    pub(crate) fn resolve_program(&self) -> std::io::Result<PathBuf> {
        match &self.program {
            Some(program) => Ok(program.clone()),
            None => std::env::current_exe(),
        }
    }
}

/// Where scripts are evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Isolation {
    /// A fresh child process per call, killed at the deadline.
    Process(WorkerCommand),
    /// A fresh thread in the calling process. A script that outlives the
    /// deadline keeps its thread until an interpreter limit stops it.
    InProcess,
}

/// Limits applied to every script execution.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Hard wall-clock deadline.
    pub timeout: Duration,
    /// Interpreter-level cap on iterations of a single loop.
    pub loop_iteration_limit: u64,
    /// Interpreter-level cap on call depth.
    pub recursion_limit: usize,
    /// Maximum accepted source length in bytes.
    pub max_code_length: usize,
    pub isolation: Isolation,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            loop_iteration_limit: 10_000_000,
            recursion_limit: 512,
            max_code_length: 256 * 1024,
            isolation: Isolation::Process(WorkerCommand::current_exe()),
        }
    }
}

impl SandboxConfig {
    /// Default limits with a different deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Default limits, evaluated on a thread of the calling process.
    pub fn in_process() -> Self {
        Self {
            isolation: Isolation::InProcess,
            ..Self::default()
        }
    }

    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// What a finished script produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxOutput {
    /// The function's return value, `Value::Null` when it returned `undefined`.
    pub value: Value,
    /// Lines written through `console.*`, in call order.
    pub logs: Vec<String>,
}

// ---------------------------------------------------------------------------
// JsSandbox
// ---------------------------------------------------------------------------

/// Runs `items => items` functions in a fresh interpreter per call.
#[derive(Debug, Clone, Default)]
pub struct JsSandbox {
    config: SandboxConfig,
}

impl JsSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Evaluate `code` to a function and call it with `items`.
    ///
    /// # Errors
    /// - [`SandboxError::CodeTooLarge`] before anything runs.
    /// - [`SandboxError::Timeout`] when the deadline passes first.
    /// - [`SandboxError::Execution`] when the script throws.
    pub async fn execute(&self, code: &str, items: &Value) -> Result<SandboxOutput, SandboxError> {
        if code.len() > self.config.max_code_length {
            return Err(SandboxError::CodeTooLarge {
                max: self.config.max_code_length,
                actual: code.len(),
            });
        }

        let request = WorkerRequest {
            code: code.to_owned(),
            items: items.clone(),
            loop_iteration_limit: self.config.loop_iteration_limit,
            recursion_limit: self.config.recursion_limit,
        };

        match &self.config.isolation {
            Isolation::Process(command) => {
                worker::run_in_worker(command, &request, self.config.timeout).await
            }
            Isolation::InProcess => self.run_on_thread(request).await,
        }
    }

    async fn run_on_thread(&self, request: WorkerRequest) -> Result<SandboxOutput, SandboxError> {
        // The interpreter is not `Send`, so it is created and dropped on its
        // own thread.
        let (tx, rx) = oneshot::channel();
        std::thread::Builder::new()
            .name("js-sandbox".into())
            .spawn(move || {
                let _ = tx.send(evaluate(&request));
            })
            .map_err(|e| SandboxError::Internal(format!("failed to spawn sandbox thread: {e}")))?;

        match tokio::time::timeout(self.config.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SandboxError::Internal(
                "sandbox thread exited without a result".into(),
            )),
            Err(_) => {
                warn!(timeout_ms = self.config.timeout.as_millis() as u64, "sandbox deadline exceeded");
                Err(SandboxError::Timeout(self.config.timeout))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

const PRELUDE: &str = r#"
var __logs = [];
var console = (function () {
    function format(args) {
        var parts = [];
        for (var i = 0; i < args.length; i++) {
            var arg = args[i];
            parts.push(typeof arg === 'string' ? arg : JSON.stringify(arg));
        }
        return parts.join(' ');
    }
    var log = function () { __logs.push(format(arguments)); };
    return { log: log, info: log, warn: log, error: log, debug: log };
})();
delete globalThis.eval;
"#;

/// Splice user code and serialized items into the wrapper script.
fn build_script(code: &str, items_json: &str) -> String {
    let escaped = items_json
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029");

    format!(
        r#"{PRELUDE}
(function () {{
    var items = JSON.parse('{escaped}');
    var userFn = (
{code}
);
    if (typeof userFn !== 'function') {{
        throw new TypeError('code must evaluate to a function of items');
    }}
    var result = userFn(items);
    return JSON.stringify({{ output: result === undefined ? null : result, logs: __logs }});
}})();
"#
    )
}

/// Run a request to completion in the current thread.
pub(crate) fn evaluate(request: &WorkerRequest) -> Result<SandboxOutput, SandboxError> {
    let started = Instant::now();

    let items_json = serde_json::to_string(&request.items)
        .map_err(|e| SandboxError::Serialization(e.to_string()))?;
    let script = build_script(&request.code, &items_json);

    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(request.loop_iteration_limit);
    context
        .runtime_limits_mut()
        .set_recursion_limit(request.recursion_limit);

    let result = context
        .eval(Source::from_bytes(&script))
        .map_err(|e| SandboxError::Execution(e.to_string()))?;
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "sandbox script finished");

    let text = result
        .as_string()
        .map(|s| s.to_std_string_escaped())
        .ok_or_else(|| SandboxError::Serialization("wrapper did not return a string".into()))?;

    let mut envelope: Value = serde_json::from_str(&text)
        .map_err(|e| SandboxError::Serialization(format!("failed to parse result: {e}")))?;

    let value = envelope
        .get_mut("output")
        .map(Value::take)
        .unwrap_or(Value::Null);
    let logs = envelope
        .get("logs")
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .filter_map(|line| line.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default();

    Ok(SandboxOutput { value, logs })
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sandbox() -> JsSandbox {
        JsSandbox::new(SandboxConfig::in_process())
    }

    #[tokio::test]
    async fn maps_items_through_user_function() {
        let out = sandbox()
            .execute(
                "(items) => items.map(i => ({...i, doubled: i.n*2}))",
                &json!([{ "n": 2 }]),
            )
            .await
            .expect("script should run");

        assert_eq!(out.value, json!([{ "n": 2, "doubled": 4 }]));
        assert!(out.logs.is_empty());
    }

    #[tokio::test]
    async fn console_lines_are_buffered() {
        let out = sandbox()
            .execute(
                r#"(items) => { console.log("count", items.length, {a: 1}); console.warn("done"); return items; }"#,
                &json!([{ "x": 1 }, { "x": 2 }]),
            )
            .await
            .unwrap();

        assert_eq!(out.logs, vec![r#"count 2 {"a":1}"#.to_string(), "done".to_string()]);
    }

    #[tokio::test]
    async fn strings_with_quotes_survive_the_round_trip() {
        let items = json!([{ "text": "it's a \"quote\" \\ backslash\nnewline" }]);
        let out = sandbox().execute("(items) => items", &items).await.unwrap();
        assert_eq!(out.value, items);
    }

    #[tokio::test]
    async fn infinite_loop_hits_the_deadline() {
        let sandbox = JsSandbox::new(
            SandboxConfig::with_timeout(Duration::from_millis(50)).isolation(Isolation::InProcess),
        );
        let err = sandbox
            .execute("(items) => { while (true) {} }", &json!([]))
            .await
            .unwrap_err();

        assert!(matches!(err, SandboxError::Timeout(d) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn host_capabilities_are_absent() {
        let out = sandbox()
            .execute(
                r#"(items) => [{
                    fetch: typeof fetch,
                    require: typeof require,
                    process: typeof process,
                    eval: typeof eval
                }]"#,
                &json!([]),
            )
            .await
            .unwrap();

        assert_eq!(
            out.value,
            json!([{ "fetch": "undefined", "require": "undefined", "process": "undefined", "eval": "undefined" }])
        );
    }

    #[tokio::test]
    async fn thrown_errors_are_reported() {
        let err = sandbox()
            .execute("(items) => { throw new Error('nope'); }", &json!([]))
            .await
            .unwrap_err();

        match err {
            SandboxError::Execution(msg) => assert!(msg.contains("nope"), "got {msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_function_source_is_rejected() {
        let err = sandbox().execute("42", &json!([])).await.unwrap_err();
        assert!(matches!(err, SandboxError::Execution(_)));
    }

    #[tokio::test]
    async fn undefined_result_becomes_null() {
        let out = sandbox().execute("(items) => undefined", &json!([])).await.unwrap();
        assert_eq!(out.value, Value::Null);
    }

    #[tokio::test]
    async fn oversized_code_is_rejected_before_running() {
        let sandbox = JsSandbox::new(SandboxConfig {
            max_code_length: 8,
            ..SandboxConfig::in_process()
        });
        let err = sandbox.execute("(items) => items", &json!([])).await.unwrap_err();
        assert!(matches!(err, SandboxError::CodeTooLarge { max: 8, .. }));
    }
}
