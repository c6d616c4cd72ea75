// conductor-mcp/tests/tool_router.rs
// ============================================================================
// Module: Tool Router Tests
// Description: Tool listing, execute routing, manage actions, and envelopes.
// ============================================================================
//! ## Overview
//! Drives the tool router over a temporary catalog: listing, the execute
//! tool in both start and resume shapes, manage actions, and the uniform
//! error envelope.

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

use std::path::Path;
use std::sync::Arc;

use conductor_core::EngineConfig;
use conductor_core::EngineServices;
use conductor_core::InjectionSettings;
use conductor_core::NoopEngineMetrics;
use conductor_core::PromptEngine;
use conductor_core::SystemClock;
use conductor_mcp::BuiltinFrameworkRegistry;
use conductor_mcp::CountingMetrics;
use conductor_mcp::FileGateRegistry;
use conductor_mcp::FilePromptManager;
use conductor_mcp::FilePromptRegistry;
use conductor_mcp::FileScriptToolRegistry;
use conductor_mcp::FileSessionStore;
use conductor_mcp::ToolError;
use conductor_mcp::ToolRouter;
use conductor_script::DefaultScriptRunner;
use serde_json::json;

/// Writes a minimal prompt directory.
fn write_prompt(root: &Path, id: &str, template: &str) {
    let dir = root.join("prompts").join("general").join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("prompt.yaml"),
        format!("name: {id}\narguments:\n  - name: text\n"),
    )
    .unwrap();
    std::fs::write(dir.join("user-message.md"), template).unwrap();
}

/// Builds a router over a temporary catalog root.
fn router(root: &Path) -> ToolRouter {
    let clock = Arc::new(SystemClock);
    let prompts = Arc::new(FilePromptRegistry::load(root.join("prompts")).unwrap());
    let services = EngineServices {
        prompts: prompts.clone(),
        gates: Arc::new(FileGateRegistry::load(root.join("gates")).unwrap()),
        frameworks: Arc::new(BuiltinFrameworkRegistry),
        tools: Arc::new(FileScriptToolRegistry::load(&root.join("prompts")).unwrap()),
        scripts: Arc::new(DefaultScriptRunner::new(clock.clone())),
        analyzer: None,
        metrics: Arc::new(NoopEngineMetrics),
        clock: clock.clone(),
    };
    let store = Arc::new(FileSessionStore::new(root.join("runtime-state/chain-sessions.json")));
    let engine = PromptEngine::new(
        services,
        store,
        InjectionSettings::default(),
        EngineConfig::default(),
    )
    .unwrap();
    let manager = Arc::new(FilePromptManager::new(prompts, clock));
    ToolRouter::new(Arc::new(engine), manager, Arc::new(CountingMetrics::new()))
}

// ============================================================================
// SECTION: Listing and Status
// ============================================================================

/// Verifies the tool listing order is stable.
#[test]
fn tool_listing_stable() {
    let names: Vec<&str> =
        conductor_mcp::tool_definitions().iter().map(|tool| tool.name).collect();
    assert_eq!(names, vec!["conductor_execute", "conductor_manage", "conductor_status"]);
}

/// Verifies the status tool reports counts.
#[tokio::test]
async fn status_reports_counts() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "summarize", "Summarize: {{text}}");
    let router = router(root.path());

    let value = router.handle_tool_call("conductor_status", json!({})).await.unwrap();
    assert_eq!(value.get("runs_total").unwrap(), 0);
}

// ============================================================================
// SECTION: Execute Routing
// ============================================================================

/// Verifies the execute tool starts an ephemeral run.
#[tokio::test]
async fn execute_starts_run() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "summarize", "Summarize: {{text}}");
    let router = router(root.path());

    let value = router
        .handle_tool_call(
            "conductor_execute",
            json!({"command": ">>summarize text:\"hello\""}),
        )
        .await
        .unwrap();
    assert_eq!(value.get("kind").unwrap(), "pause");
    assert_eq!(value.get("rendered_prompt").unwrap(), "Summarize: hello");
}

/// Verifies a chain start and resume through the router.
#[tokio::test]
async fn execute_resumes_chain() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "a", "Step a");
    write_prompt(root.path(), "b", "Step b");
    let router = router(root.path());

    let start = router
        .handle_tool_call("conductor_execute", json!({"command": ">>a --> >>b"}))
        .await
        .unwrap();
    let chain_id = start.get("chain_id").unwrap().as_str().unwrap().to_string();
    assert_eq!(chain_id, "chain-a#1");

    let next = router
        .handle_tool_call(
            "conductor_execute",
            json!({"chain_id": chain_id, "user_response": "done"}),
        )
        .await
        .unwrap();
    assert_eq!(next.get("step").unwrap(), 2);
}

/// Verifies supplying both command and chain id is a decode error.
#[tokio::test]
async fn command_and_chain_id_conflict() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "summarize", "s");
    let router = router(root.path());

    let error = router
        .handle_tool_call(
            "conductor_execute",
            json!({"command": ">>summarize", "chain_id": "chain-a#1"}),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, ToolError::Decode(_)));
}

/// Verifies unknown tools are rejected.
#[tokio::test]
async fn unknown_tool_rejected() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "summarize", "s");
    let router = router(root.path());

    let error = router.handle_tool_call("nope", json!({})).await.unwrap_err();
    assert!(matches!(error, ToolError::UnknownTool));
    assert_eq!(error.code(), -32601);
}

/// Verifies the uniform error envelope for unknown prompts.
#[tokio::test]
async fn unknown_prompt_envelope() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "analyze", "a");
    let router = router(root.path());

    let error = router
        .handle_tool_call("conductor_execute", json!({"command": ">>analize"}))
        .await
        .unwrap_err();
    let envelope = error.envelope();
    assert_eq!(envelope.get("isError").unwrap(), true);
    let details = envelope.get("error").unwrap();
    assert_eq!(details.get("severity").unwrap(), "warning");
    let actions = details.get("suggestedActions").unwrap().as_array().unwrap();
    assert!(actions.iter().any(|action| action.as_str().unwrap().contains("analyze")));
}

// ============================================================================
// SECTION: Manage Routing
// ============================================================================

/// Verifies manage list and inspect round-trip the catalog.
#[tokio::test]
async fn manage_list_and_inspect() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "summarize", "Summarize: {{text}}");
    let router = router(root.path());

    let listed = router
        .handle_tool_call("conductor_manage", json!({"action": "list"}))
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let inspected = router
        .handle_tool_call("conductor_manage", json!({"action": "inspect", "id": "summarize"}))
        .await
        .unwrap();
    assert_eq!(inspected.get("name").unwrap(), "summarize");
}

/// Verifies rollback without confirmation is refused.
#[tokio::test]
async fn rollback_requires_confirmation() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "summarize", "s");
    let router = router(root.path());

    let error = router
        .handle_tool_call(
            "conductor_manage",
            json!({"action": "rollback", "id": "summarize", "version": 1}),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        ToolError::Authoring(conductor_core::runtime::AuthoringError::ConfirmationRequired)
    ));
}
