// crates/conductor-core/src/core/script.rs
// ============================================================================
// Module: Conductor Script Tool Model
// Description: Script tool declarations attached to prompts.
// Purpose: Model developer-authored tools resolved relative to a prompt directory.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! Prompts may declare script tools: small developer-authored programs run as
//! subprocesses before a step is emitted. The records here are consumed by the
//! matcher, confirmation tracker, and executor in `conductor-script`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ToolId;

// ============================================================================
// SECTION: Runtime and Trigger
// ============================================================================

/// Script runtime selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptRuntime {
    /// Python interpreter.
    Python,
    /// Node interpreter.
    Node,
    /// POSIX shell.
    Shell,
    /// Resolve from the script file extension.
    #[default]
    Auto,
}

/// Trigger policy deciding when a tool matches a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolTrigger {
    /// Match when the extracted inputs validate against the schema.
    #[default]
    SchemaMatch,
    /// Match only on an explicit `tool:<id>` request.
    Explicit,
    /// Always match.
    Always,
    /// Never match; the tool is discovered but skipped.
    Never,
}

// ============================================================================
// SECTION: Execution Configuration
// ============================================================================

/// Per-tool execution configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolExecutionConfig {
    /// Trigger policy.
    #[serde(default)]
    pub trigger: ToolTrigger,
    /// Whether execution requires caller confirmation.
    #[serde(default)]
    pub confirm: bool,
    /// Whether schema matching requires every required property.
    #[serde(default)]
    pub strict: bool,
    /// Optional confirmation message shown to the caller.
    #[serde(default)]
    pub confirm_message: Option<String>,
    /// Whether a clean validator pre-run skips confirmation.
    #[serde(default)]
    pub auto_approve_on_valid: bool,
}

// ============================================================================
// SECTION: Script Tool
// ============================================================================

/// Script tool declaration.
///
/// # Invariants
/// - `script_path` is resolved relative to the declaring prompt's directory
///   before the record reaches the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptTool {
    /// Tool identifier.
    pub id: ToolId,
    /// Human-readable tool name.
    pub name: String,
    /// Absolute script path.
    pub script_path: PathBuf,
    /// Script runtime selection.
    #[serde(default)]
    pub runtime: ScriptRuntime,
    /// JSON Schema describing the tool's input object.
    pub input_schema: serde_json::Value,
    /// Execution configuration.
    #[serde(default)]
    pub execution: ToolExecutionConfig,
    /// Timeout in milliseconds; clamped by executor defaults.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Extra environment variables passed to the subprocess.
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
    /// Optional working subdirectory below the tool directory.
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Whether the tool is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Tools default to enabled when the field is omitted.
const fn default_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Execution Result
// ============================================================================

/// Result of one script subprocess execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptExecution {
    /// Whether the process exited zero.
    pub success: bool,
    /// Parsed stdout JSON, or `{"output": raw}` when stdout is not JSON.
    pub output: serde_json::Value,
    /// Raw stdout.
    pub stdout: String,
    /// Raw stderr.
    pub stderr: String,
    /// Process exit code; `-1` on timeout or signal death.
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Error description for timeouts and spawn failures.
    #[serde(default)]
    pub error: Option<String>,
}
