// conductor-mcp/tests/manager.rs
// ============================================================================
// Module: Prompt Manager Tests
// Description: Authored-prompt routing through the resources root.
// ============================================================================
//! ## Overview
//! Validates that created and updated prompts land under the configured
//! resources root, survive reload, shadow shipped prompts on id collisions,
//! and are removed from the right tree on delete.

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
use std::path::PathBuf;
use std::sync::Arc;

use conductor_core::CategoryId;
use conductor_core::PromptId;
use conductor_core::PromptRecord;
use conductor_core::PromptRegistry;
use conductor_core::SystemClock;
use conductor_core::runtime::PromptManager;
use conductor_mcp::FilePromptManager;
use conductor_mcp::FilePromptRegistry;

/// Writes a shipped prompt directory below the catalog root.
fn write_shipped(prompts: &Path, id: &str, template: &str) {
    let dir = prompts.join("general").join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("prompt.yaml"), format!("name: {id}\n")).unwrap();
    std::fs::write(dir.join("user-message.md"), template).unwrap();
}

/// Builds a prompt record for authoring.
fn record(id: &str, template: &str) -> PromptRecord {
    PromptRecord {
        id: PromptId::new(id),
        name: id.to_string(),
        category: CategoryId::new("general"),
        description: String::new(),
        user_template: template.to_string(),
        system_template: None,
        arguments: Vec::new(),
        chain_steps: Vec::new(),
        gate_ids: Vec::new(),
    }
}

/// Builds a registry and manager over a catalog root plus a resources root.
fn fixture(root: &Path) -> (Arc<FilePromptRegistry>, FilePromptManager, PathBuf) {
    let prompts = root.join("prompts");
    let resources = root.join("resources");
    std::fs::create_dir_all(&prompts).unwrap();
    let registry = Arc::new(
        FilePromptRegistry::load_with_resources(prompts, Some(resources.clone())).unwrap(),
    );
    let manager = FilePromptManager::new(registry.clone(), Arc::new(SystemClock));
    (registry, manager, resources)
}

/// Verifies created prompts land under the resources root, not the catalog.
#[test]
fn create_writes_to_resources_root() {
    let root = tempfile::tempdir().unwrap();
    let (registry, manager, resources) = fixture(root.path());

    manager.create(record("drafted", "Draft: {{text}}")).unwrap();

    let authored = resources.join("general").join("drafted");
    assert!(authored.join("prompt.yaml").is_file());
    assert!(authored.join("user-message.md").is_file());
    assert!(!root.path().join("prompts/general/drafted").exists());
    assert!(registry.get(&PromptId::new("drafted")).unwrap().is_some());
}

/// Verifies reload rescans the resources root.
#[test]
fn reload_keeps_authored_prompts() {
    let root = tempfile::tempdir().unwrap();
    let (registry, manager, _) = fixture(root.path());

    manager.create(record("drafted", "Draft: {{text}}")).unwrap();
    assert_eq!(registry.reload().unwrap(), 1);
    assert!(registry.get(&PromptId::new("drafted")).unwrap().is_some());
}

/// Verifies a resources entry shadows a shipped prompt with the same id.
#[test]
fn resources_shadow_shipped_prompts() {
    let root = tempfile::tempdir().unwrap();
    let (registry, manager, _) = fixture(root.path());
    write_shipped(&root.path().join("prompts"), "summarize", "shipped body");
    registry.reload().unwrap();

    let mut edited = record("summarize", "edited body");
    edited.description = "user edit".to_string();
    manager.update(edited).unwrap();
    registry.reload().unwrap();

    let loaded = registry.get(&PromptId::new("summarize")).unwrap().unwrap();
    assert_eq!(loaded.user_template, "edited body");
}

/// Verifies delete removes the authored copy from the resources root.
#[test]
fn delete_removes_authored_copy() {
    let root = tempfile::tempdir().unwrap();
    let (registry, manager, resources) = fixture(root.path());

    manager.create(record("drafted", "Draft: {{text}}")).unwrap();
    manager.delete(&PromptId::new("drafted")).unwrap();

    assert!(!resources.join("general").join("drafted").exists());
    assert!(registry.get(&PromptId::new("drafted")).unwrap().is_none());
}
