// conductor-core/tests/authoring.rs
// ============================================================================
// Module: Authoring Validation Tests
// Description: Reference validation over registry snapshots.
// ============================================================================
//! ## Overview
//! Validates self-reference, dangling-reference, and circular-chain detection
//! for prompt templates.

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

use conductor_core::CategoryId;
use conductor_core::PromptId;
use conductor_core::PromptRecord;
use conductor_core::runtime::AuthoringError;
use conductor_core::runtime::validate_references;

/// Builds a record whose user template carries the given text.
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

/// Verifies plain templates validate.
#[test]
fn plain_templates_validate() {
    let candidate = record("a", "no references here {{text}}");
    assert!(validate_references(&candidate, &[], true).is_ok());
}

/// Verifies self-references are rejected.
#[test]
fn self_reference_rejected() {
    let candidate = record("a", "see {{ref:a}}");
    let error = validate_references(&candidate, &[], true).unwrap_err();
    assert!(matches!(error, AuthoringError::SelfReference(id) if id == "a"));
}

/// Verifies dangling references are rejected in strict mode only.
#[test]
fn dangling_reference_strict_mode() {
    let candidate = record("a", "see {{ref:ghost}}");
    let error = validate_references(&candidate, &[], true).unwrap_err();
    assert!(matches!(error, AuthoringError::DanglingReference { to, .. } if to == "ghost"));

    assert!(validate_references(&candidate, &[], false).is_ok());
}

/// Verifies the A -> B -> C -> A cycle is caught.
#[test]
fn circular_chain_detected() {
    let snapshot = vec![record("b", "see {{ref:c}}"), record("c", "see {{ref:a}}")];
    let candidate = record("a", "see {{ref:b}}");
    let error = validate_references(&candidate, &snapshot, true).unwrap_err();
    let AuthoringError::CircularReference(path) = error else {
        panic!("expected circular reference");
    };
    assert!(path.contains("a -> b -> c -> a"));
}

/// Verifies system templates are walked too.
#[test]
fn system_template_references_checked() {
    let mut candidate = record("a", "plain");
    candidate.system_template = Some("see {{ref:a}}".to_string());
    let error = validate_references(&candidate, &[], true).unwrap_err();
    assert!(matches!(error, AuthoringError::SelfReference(_)));
}
