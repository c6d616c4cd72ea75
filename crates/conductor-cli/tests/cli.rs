// conductor-cli/tests/cli.rs
// ============================================================================
// Module: CLI Integration Tests
// Description: Configuration validation and offline parsing via the binary.
// ============================================================================
//! ## Overview
//! Spawns the built binary to validate configurations and parse commands,
//! including the `MCP_SERVER_ROOT` environment override.

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
use std::process::Command;

/// Returns the binary path provided by cargo.
fn binary() -> &'static str {
    env!("CARGO_BIN_EXE_prompt-conductor")
}

/// Writes a minimal prompt catalog below the root.
fn write_prompt(root: &Path, id: &str) {
    let dir = root.join("prompts").join("general").join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("prompt.yaml"), format!("name: {id}\n")).unwrap();
    std::fs::write(dir.join("user-message.md"), "Body: {{text}}").unwrap();
}

/// Verifies validate-config accepts a well-formed file.
#[test]
fn validate_config_accepts_valid() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("conductor.toml");
    std::fs::write(&config, "[server]\ntransport = \"stdio\"\n").unwrap();

    let output = Command::new(binary())
        .args(["validate-config", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("config ok"));
}

/// Verifies validate-config rejects an invalid file.
#[test]
fn validate_config_rejects_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("conductor.toml");
    std::fs::write(&config, "[server]\ntransport = \"http\"\n").unwrap();

    let output = Command::new(binary())
        .args(["validate-config", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("bind"));
}

/// Verifies parse resolves prompts below MCP_SERVER_ROOT.
#[test]
fn parse_honors_server_root_override() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "summarize");
    let config = root.path().join("conductor.toml");
    std::fs::write(&config, "").unwrap();

    let output = Command::new(binary())
        .args(["parse", "--config"])
        .arg(&config)
        .arg(">>summarize text:\"hi\"")
        .env("MCP_SERVER_ROOT", root.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"prompt_id\": \"summarize\""));
}

/// Verifies parse errors surface suggestions on stderr.
#[test]
fn parse_unknown_prompt_fails() {
    let root = tempfile::tempdir().unwrap();
    write_prompt(root.path(), "summarize");
    let config = root.path().join("conductor.toml");
    std::fs::write(&config, "").unwrap();

    let output = Command::new(binary())
        .args(["parse", "--config"])
        .arg(&config)
        .arg(">>sumarize")
        .env("MCP_SERVER_ROOT", root.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown prompt"));
}
