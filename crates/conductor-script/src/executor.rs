// crates/conductor-script/src/executor.rs
// ============================================================================
// Module: Script Executor
// Description: Subprocess execution with timeout and filtered environment.
// Purpose: Run developer-authored scripts safely with bounded resources.
// Dependencies: conductor-core, tokio
// ============================================================================

//! ## Overview
//! The executor spawns one subprocess per tool run: runtime resolved from the
//! script extension when not explicit, working directory pinned to the tool
//! directory, environment reduced to an allow-list plus tool and request
//! declarations, and inputs serialized as JSON on stdin. Timeouts send a
//! graceful terminate first and force-kill after one second.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use conductor_core::PromptId;
use conductor_core::ScriptExecution;
use conductor_core::ScriptRunError;
use conductor_core::ScriptRuntime;
use conductor_core::ScriptTool;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::process::Child;
use tokio::process::Command;

/// Default subprocess timeout: 30 seconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Hard subprocess timeout cap: 5 minutes.
pub const MAX_TIMEOUT_MS: u64 = 5 * 60 * 1000;

/// Grace between terminate and force-kill.
const KILL_GRACE: Duration = Duration::from_secs(1);

/// Environment variables forwarded from the parent process.
///
/// Prefix entries (ending in `*`) forward every variable with that prefix.
/// Intentional secrets must be declared per-tool; nothing else leaks through.
const ENV_ALLOW_LIST: &[&str] = &[
    "PATH", "HOME", "USER", "SHELL", "TERM", "TMPDIR", "TMP", "TEMP", "NODE_*", "PYTHON*",
    "VIRTUAL_ENV", "LANG", "LC_*", "EDITOR", "CI",
];

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Script subprocess executor.
#[derive(Debug, Clone, Default)]
pub struct ScriptExecutor {
    /// Base environment merged below tool and request declarations.
    base_env: BTreeMap<String, String>,
}

impl ScriptExecutor {
    /// Creates an executor with an empty base environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor with a base environment.
    #[must_use]
    pub const fn with_base_env(base_env: BTreeMap<String, String>) -> Self {
        Self {
            base_env,
        }
    }

    /// Runs a tool's script with the given inputs.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptRunError`] when the script is missing, the interpreter
    /// cannot be spawned, or process plumbing fails. Timeouts and non-zero
    /// exits are reported inside the [`ScriptExecution`], not as errors.
    pub async fn execute(
        &self,
        prompt_id: &PromptId,
        tool: &ScriptTool,
        inputs: &Value,
        request_env: &BTreeMap<String, String>,
        request_timeout_ms: Option<u64>,
    ) -> Result<ScriptExecution, ScriptRunError> {
        if !tool.script_path.is_file() {
            return Err(ScriptRunError::NotFound(tool.script_path.display().to_string()));
        }
        let tool_dir = tool
            .script_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                ScriptRunError::Execution(format!(
                    "script '{}' has no parent directory",
                    tool.script_path.display()
                ))
            })?;
        let working_dir = match &tool.working_dir {
            Some(sub) => tool_dir.join(sub),
            None => tool_dir.clone(),
        };

        let timeout_ms = effective_timeout(request_timeout_ms, tool.timeout_ms);
        let payload = serde_json::to_vec(inputs)
            .map_err(|err| ScriptRunError::Execution(format!("input serialization: {err}")))?;

        let mut command = build_command(tool);
        command
            .current_dir(&working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .envs(filtered_parent_env())
            .envs(&self.base_env)
            .envs(&tool.env)
            .envs(request_env)
            .env("SCRIPT_TOOL_ID", tool.id.as_str())
            .env("SCRIPT_PROMPT_ID", prompt_id.as_str())
            .env("SCRIPT_TOOL_DIR", tool_dir.as_os_str());

        let started = Instant::now();
        let mut child = command.spawn().map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => {
                ScriptRunError::InterpreterMissing(runtime_program(tool).to_string())
            }
            _ => ScriptRunError::Execution(format!("spawn failed: {err}")),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|err| ScriptRunError::Execution(format!("stdin write: {err}")))?;
        }

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buffer).await;
            }
            buffer
        });
        let stderr_task = tokio::spawn(async move {
            let mut buffer = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buffer).await;
            }
            buffer
        });

        let wait = tokio::time::timeout(Duration::from_millis(timeout_ms), child.wait()).await;
        let (exit_code, error) = match wait {
            Ok(Ok(status)) => (status.code().unwrap_or(-1), None),
            Ok(Err(err)) => (-1, Some(format!("wait failed: {err}"))),
            Err(_) => {
                terminate_with_grace(&mut child).await;
                (
                    -1,
                    Some(format!("script '{}' timed out after {timeout_ms} ms", tool.id)),
                )
            }
        };

        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();
        let stdout = String::from_utf8_lossy(&stdout_bytes).to_string();
        let stderr = String::from_utf8_lossy(&stderr_bytes).to_string();

        let output = parse_output(&stdout);
        let duration_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(ScriptExecution {
            success: exit_code == 0 && error.is_none(),
            output,
            stdout,
            stderr,
            exit_code,
            duration_ms,
            error,
        })
    }
}

// ============================================================================
// SECTION: Runtime Resolution
// ============================================================================

/// Returns the interpreter program for a tool.
#[must_use]
pub fn runtime_program(tool: &ScriptTool) -> &'static str {
    match resolve_runtime(tool) {
        ScriptRuntime::Python => "python3",
        ScriptRuntime::Node => "node",
        ScriptRuntime::Shell | ScriptRuntime::Auto => "sh",
    }
}

/// Resolves `auto` runtimes from the script extension.
#[must_use]
pub fn resolve_runtime(tool: &ScriptTool) -> ScriptRuntime {
    if tool.runtime != ScriptRuntime::Auto {
        return tool.runtime;
    }
    match tool.script_path.extension().and_then(|ext| ext.to_str()) {
        Some("py") => ScriptRuntime::Python,
        Some("js" | "mjs" | "cjs" | "ts") => ScriptRuntime::Node,
        _ => ScriptRuntime::Shell,
    }
}

/// Builds the interpreter invocation for a tool.
fn build_command(tool: &ScriptTool) -> Command {
    let mut command = Command::new(runtime_program(tool));
    command.arg(&tool.script_path);
    command.kill_on_drop(true);
    command
}

// ============================================================================
// SECTION: Environment Filtering
// ============================================================================

/// Filters the parent environment through the allow-list.
fn filtered_parent_env() -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(name, _)| {
            ENV_ALLOW_LIST.iter().any(|rule| match rule.strip_suffix('*') {
                Some(prefix) => name.starts_with(prefix),
                None => name == rule,
            })
        })
        .collect()
}

// ============================================================================
// SECTION: Timeout and Termination
// ============================================================================

/// Combines request, tool, and default timeouts under the hard cap.
#[must_use]
pub fn effective_timeout(request_ms: Option<u64>, tool_ms: Option<u64>) -> u64 {
    let requested = [request_ms, tool_ms, Some(DEFAULT_TIMEOUT_MS)]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(DEFAULT_TIMEOUT_MS);
    requested.min(MAX_TIMEOUT_MS)
}

/// Sends a graceful terminate, then force-kills after the grace period.
async fn terminate_with_grace(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let _ = Command::new("kill")
            .arg("-TERM")
            .arg(pid.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok() {
            return;
        }
    }
    let _ = child.kill().await;
    let _ = child.wait().await;
}

// ============================================================================
// SECTION: Output Parsing
// ============================================================================

/// Parses stdout as JSON, wrapping non-JSON output.
fn parse_output(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    serde_json::from_str(trimmed).unwrap_or_else(|_| {
        serde_json::json!({
            "output": trimmed,
        })
    })
}

