// conductor-mcp/tests/registries.rs
// ============================================================================
// Module: File Registry Tests
// Description: Catalog loading from the documented on-disk layout.
// ============================================================================
//! ## Overview
//! Builds temporary prompt, gate, and tool layouts and validates fail-closed
//! loading with per-entry warnings.

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

use conductor_core::EnforcementMode;
use conductor_core::GateId;
use conductor_core::GateRegistry;
use conductor_core::PromptId;
use conductor_core::PromptRegistry;
use conductor_core::ScriptToolRegistry;
use conductor_core::ToolTrigger;
use conductor_mcp::FileGateRegistry;
use conductor_mcp::FilePromptRegistry;
use conductor_mcp::FileScriptToolRegistry;

/// Writes a minimal prompt directory.
fn write_prompt(root: &Path, category: &str, id: &str, template: &str) {
    let dir = root.join("prompts").join(category).join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("prompt.yaml"),
        format!("name: {id}\ndescription: test prompt\narguments:\n  - name: text\n"),
    )
    .unwrap();
    std::fs::write(dir.join("user-message.md"), template).unwrap();
}

/// Writes a gate directory with a guidance file.
fn write_gate(root: &Path, id: &str) {
    let dir = root.join("gates").join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("gate.yaml"),
        "name: Technical Accuracy\ntype: validation\nseverity: high\n\
         enforcement: blocking\nguidance_file: guidance.md\nretry:\n  max_attempts: 2\n",
    )
    .unwrap();
    std::fs::write(dir.join("guidance.md"), "Check references\n").unwrap();
}

/// Writes a script tool below a prompt.
fn write_tool(root: &Path, category: &str, prompt: &str, id: &str) {
    let dir = root.join("prompts").join(category).join(prompt).join("tools").join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("tool.yaml"),
        "name: Analyze CSV\nscript: analyze.py\nexecution:\n  trigger: schema_match\n  confirm: true\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("schema.json"),
        "{\"type\": \"object\", \"properties\": {\"file\": {\"type\": \"string\"}}, \
         \"required\": [\"file\"]}",
    )
    .unwrap();
    std::fs::write(dir.join("analyze.py"), "print('{}')\n").unwrap();
}

// ============================================================================
// SECTION: Prompt Catalog
// ============================================================================

/// Verifies prompts load with category and templates.
#[test]
fn prompts_load() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "analysis", "summarize", "Summarize: {{text}}");
    write_prompt(root.path(), "code", "review", "Review: {{text}}");

    let registry = FilePromptRegistry::load(root.path().join("prompts")).unwrap();
    let record = registry.get(&PromptId::new("summarize")).unwrap().unwrap();
    assert_eq!(record.category.as_str(), "analysis");
    assert_eq!(record.user_template, "Summarize: {{text}}");
    assert_eq!(registry.list().unwrap().len(), 2);
    assert!(registry.load_warnings().is_empty());
}

/// Verifies an invalid prompt is skipped with a warning.
#[test]
fn invalid_prompt_warns() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "analysis", "good", "ok");
    let broken = root.path().join("prompts").join("analysis").join("broken");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("prompt.yaml"), "name: [unterminated").unwrap();

    let registry = FilePromptRegistry::load(root.path().join("prompts")).unwrap();
    assert_eq!(registry.list().unwrap().len(), 1);
    assert_eq!(registry.load_warnings().len(), 1);
}

/// Verifies reload picks up newly written prompts.
#[test]
fn reload_rescans() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "analysis", "first", "one");
    let registry = FilePromptRegistry::load(root.path().join("prompts")).unwrap();
    assert_eq!(registry.list().unwrap().len(), 1);

    write_prompt(root.path(), "analysis", "second", "two");
    assert_eq!(registry.reload().unwrap(), 2);
}

// ============================================================================
// SECTION: Gate Catalog
// ============================================================================

/// Verifies gates load with external guidance files.
#[test]
fn gates_load_with_guidance_file() {
    let root = tempfile::tempdir().unwrap();
    write_gate(root.path(), "technical-accuracy");

    let registry = FileGateRegistry::load(root.path().join("gates")).unwrap();
    let gate = registry.get(&GateId::new("technical-accuracy")).unwrap().unwrap();
    assert_eq!(gate.effective_enforcement(), EnforcementMode::Blocking);
    assert!(gate.guidance.unwrap().contains("Check references"));
    assert_eq!(gate.retry.max_attempts, 2);
}

/// Verifies a missing gate root is a warning, not an error.
#[test]
fn missing_gate_root_warns() {
    let root = tempfile::tempdir().unwrap();
    let registry = FileGateRegistry::load(root.path().join("gates")).unwrap();
    assert!(registry.list().unwrap().is_empty());
    assert_eq!(registry.load_warnings().len(), 1);
}

// ============================================================================
// SECTION: Script Tool Catalog
// ============================================================================

/// Verifies tools are discovered per prompt with resolved script paths.
#[test]
fn tools_discovered_per_prompt() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "analysis", "data_analyzer", "Analyze {{text}}");
    write_tool(root.path(), "analysis", "data_analyzer", "analyze_csv");

    let registry = FileScriptToolRegistry::load(&root.path().join("prompts")).unwrap();
    let tools = registry.tools_for_prompt(&PromptId::new("data_analyzer")).unwrap();
    assert_eq!(tools.len(), 1);
    let tool = &tools[0];
    assert_eq!(tool.id.as_str(), "analyze_csv");
    assert!(tool.script_path.is_absolute());
    assert!(tool.script_path.ends_with("analyze.py"));
    assert_eq!(tool.execution.trigger, ToolTrigger::SchemaMatch);
    assert!(tool.execution.confirm);

    assert!(registry.tools_for_prompt(&PromptId::new("other")).unwrap().is_empty());
}

/// Verifies a tool with a missing script is skipped with a warning.
#[test]
fn tool_missing_script_warns() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "analysis", "data_analyzer", "Analyze {{text}}");
    write_tool(root.path(), "analysis", "data_analyzer", "analyze_csv");
    std::fs::remove_file(
        root.path()
            .join("prompts/analysis/data_analyzer/tools/analyze_csv/analyze.py"),
    )
    .unwrap();

    let registry = FileScriptToolRegistry::load(&root.path().join("prompts")).unwrap();
    assert!(registry.tools_for_prompt(&PromptId::new("data_analyzer")).unwrap().is_empty());
    assert_eq!(registry.load_warnings().len(), 1);
}
