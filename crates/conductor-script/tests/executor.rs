// conductor-script/tests/executor.rs
// ============================================================================
// Module: Script Executor Tests
// Description: Runtime resolution, timeouts, environment, and output parsing.
// ============================================================================
//! ## Overview
//! Runs real shell subprocesses from a temporary tool directory to validate
//! stdin plumbing, JSON output wrapping, timeout enforcement, and the
//! environment allow-list.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::path::Path;

use conductor_core::PromptId;
use conductor_core::ScriptRuntime;
use conductor_core::ScriptTool;
use conductor_core::ToolExecutionConfig;
use conductor_core::ToolId;
use conductor_script::DEFAULT_TIMEOUT_MS;
use conductor_script::MAX_TIMEOUT_MS;
use conductor_script::ScriptExecutor;
use conductor_script::effective_timeout;
use conductor_script::resolve_runtime;
use serde_json::json;

/// Writes a shell script into the directory and returns a tool for it.
fn shell_tool(dir: &Path, body: &str, timeout_ms: Option<u64>) -> ScriptTool {
    let script_path = dir.join("run.sh");
    std::fs::write(&script_path, format!("#!/bin/sh\n{body}\n")).unwrap();
    ScriptTool {
        id: ToolId::new("runner"),
        name: "runner".to_string(),
        script_path,
        runtime: ScriptRuntime::Shell,
        input_schema: json!({"type": "object"}),
        execution: ToolExecutionConfig::default(),
        timeout_ms,
        env: BTreeMap::new(),
        working_dir: None,
        enabled: true,
    }
}

// ============================================================================
// SECTION: Runtime Resolution
// ============================================================================

/// Verifies auto runtimes resolve from the script extension.
#[test]
fn runtime_resolved_by_extension() {
    let case = |path: &str, expected: ScriptRuntime| {
        let mut tool = ScriptTool {
            id: ToolId::new("t"),
            name: "t".to_string(),
            script_path: path.into(),
            runtime: ScriptRuntime::Auto,
            input_schema: json!({}),
            execution: ToolExecutionConfig::default(),
            timeout_ms: None,
            env: BTreeMap::new(),
            working_dir: None,
            enabled: true,
        };
        assert_eq!(resolve_runtime(&tool), expected, "path {path}");
        tool.runtime = ScriptRuntime::Python;
        assert_eq!(resolve_runtime(&tool), ScriptRuntime::Python);
    };
    case("/x/a.py", ScriptRuntime::Python);
    case("/x/a.js", ScriptRuntime::Node);
    case("/x/a.mjs", ScriptRuntime::Node);
    case("/x/a.ts", ScriptRuntime::Node);
    case("/x/a.sh", ScriptRuntime::Shell);
    case("/x/a.bin", ScriptRuntime::Shell);
}

/// Verifies the timeout combination rule and hard cap.
#[test]
fn timeout_combination() {
    assert_eq!(effective_timeout(None, None), DEFAULT_TIMEOUT_MS);
    assert_eq!(effective_timeout(Some(5_000), Some(10_000)), 5_000);
    assert_eq!(effective_timeout(Some(60_000), Some(10_000)), 10_000);
    assert_eq!(effective_timeout(Some(MAX_TIMEOUT_MS * 2), None), DEFAULT_TIMEOUT_MS);
    assert_eq!(
        effective_timeout(Some(MAX_TIMEOUT_MS * 2), Some(MAX_TIMEOUT_MS * 3)),
        MAX_TIMEOUT_MS
    );
}

// ============================================================================
// SECTION: Subprocess Behavior
// ============================================================================

/// Verifies stdin inputs flow through and JSON stdout is parsed.
#[tokio::test]
async fn json_output_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_tool(dir.path(), "cat", None);
    let executor = ScriptExecutor::new();

    let result = executor
        .execute(
            &PromptId::new("p"),
            &tool,
            &json!({"file": "x.csv"}),
            &BTreeMap::new(),
            None,
        )
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output, json!({"file": "x.csv"}));
}

/// Verifies non-JSON stdout is wrapped.
#[tokio::test]
async fn plain_output_wrapped() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_tool(dir.path(), "echo done", None);
    let executor = ScriptExecutor::new();

    let result = executor
        .execute(&PromptId::new("p"), &tool, &json!({}), &BTreeMap::new(), None)
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.output, json!({"output": "done"}));
}

/// Verifies non-zero exits surface in the result, not as errors.
#[tokio::test]
async fn nonzero_exit_reported() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_tool(dir.path(), "echo oops >&2\nexit 3", None);
    let executor = ScriptExecutor::new();

    let result = executor
        .execute(&PromptId::new("p"), &tool, &json!({}), &BTreeMap::new(), None)
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.exit_code, 3);
    assert!(result.stderr.contains("oops"));
}

/// Verifies timeouts terminate the child and report the standard error.
#[tokio::test]
async fn timeout_kills_subprocess() {
    let dir = tempfile::tempdir().unwrap();
    let tool = shell_tool(dir.path(), "sleep 30", Some(200));
    let executor = ScriptExecutor::new();

    let result = executor
        .execute(&PromptId::new("p"), &tool, &json!({}), &BTreeMap::new(), None)
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.exit_code, -1);
    assert!(result.error.unwrap().contains("timed out after 200 ms"));
}

/// Verifies a missing script fails before spawning.
#[tokio::test]
async fn missing_script_is_not_found() {
    let tool = ScriptTool {
        id: ToolId::new("ghost"),
        name: "ghost".to_string(),
        script_path: "/nonexistent/ghost.sh".into(),
        runtime: ScriptRuntime::Shell,
        input_schema: json!({}),
        execution: ToolExecutionConfig::default(),
        timeout_ms: None,
        env: BTreeMap::new(),
        working_dir: None,
        enabled: true,
    };
    let executor = ScriptExecutor::new();
    let result = executor
        .execute(&PromptId::new("p"), &tool, &json!({}), &BTreeMap::new(), None)
        .await;
    assert!(result.is_err());
}

/// Verifies tool context variables and declared env reach the child while
/// undeclared variables do not.
#[tokio::test]
async fn environment_filtered_and_context_added() {
    let dir = tempfile::tempdir().unwrap();
    let mut tool = shell_tool(
        dir.path(),
        "echo \"{\\\"tool\\\": \\\"$SCRIPT_TOOL_ID\\\", \\\"prompt\\\": \
         \\\"$SCRIPT_PROMPT_ID\\\", \\\"declared\\\": \\\"$TOOL_DECLARED\\\", \
         \\\"undeclared\\\": \\\"$CONDUCTOR_UNDECLARED\\\"}\"",
        None,
    );
    tool.env.insert("TOOL_DECLARED".to_string(), "yes".to_string());
    let executor = ScriptExecutor::new();

    let result = executor
        .execute(&PromptId::new("my_prompt"), &tool, &json!({}), &BTreeMap::new(), None)
        .await
        .unwrap();
    assert_eq!(result.output.get("tool").unwrap(), "runner");
    assert_eq!(result.output.get("prompt").unwrap(), "my_prompt");
    assert_eq!(result.output.get("declared").unwrap(), "yes");
    // env_clear plus the allow-list keeps everything else out.
    assert_eq!(result.output.get("undeclared").unwrap(), "");
}
