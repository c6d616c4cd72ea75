// crates/conductor-core/src/core/envelope.rs
// ============================================================================
// Module: Conductor Engine Envelopes
// Description: Pause, confirmation, gate-action, and completion envelopes.
// Purpose: Model the request/response boundary where the LLM is the scheduler.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! The engine never blocks waiting for the LLM; it returns an envelope and the
//! caller re-invokes with the completed work. Envelopes are the whole protocol:
//! there are no continuations and no implicit coroutines.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::GateId;
use crate::core::identifiers::PromptId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::ToolId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Gate Actions
// ============================================================================

/// Caller choice after gate retry exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    /// Reset the attempt counter and retry the step.
    Retry,
    /// Bypass the gate and advance.
    Skip,
    /// Terminate the run.
    Abort,
}

// ============================================================================
// SECTION: Envelopes
// ============================================================================

/// Pause envelope carrying a rendered step for the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseEnvelope {
    /// Run identifier when the run is session-backed.
    #[serde(default)]
    pub chain_id: Option<RunId>,
    /// Current step, 1-based.
    pub step: usize,
    /// Total planned steps.
    pub total_steps: usize,
    /// Rendered user-message content with injections applied.
    pub rendered_prompt: String,
    /// Injected system prompt, when system-prompt injection fired.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Gate identifiers the LLM must return verdicts for.
    #[serde(default)]
    pub awaiting_gates: Vec<GateId>,
    /// Improvement hints carried into a retried step.
    #[serde(default)]
    pub improvement_hints: Vec<String>,
}

/// Confirmation envelope for a script tool awaiting approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationEnvelope {
    /// Prompt declaring the tool.
    pub prompt_id: PromptId,
    /// Tool awaiting confirmation.
    pub tool_id: ToolId,
    /// Confirmation message shown to the caller.
    pub message: String,
    /// When the pending confirmation expires.
    pub expires_at: Timestamp,
}

/// Gate-action envelope returned after retry exhaustion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateActionEnvelope {
    /// Run identifier.
    pub chain_id: RunId,
    /// Gates whose budget is exhausted.
    pub gate_ids: Vec<GateId>,
    /// Attempts consumed.
    pub attempts: u32,
    /// Attempt budget.
    pub max_attempts: u32,
    /// Feedback from the last failing verdict.
    #[serde(default)]
    pub last_feedback: Option<String>,
    /// Choices the caller must pick from.
    pub choices: Vec<GateAction>,
}

/// Completion envelope returned when a plan is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEnvelope {
    /// Run identifier when the run was session-backed.
    #[serde(default)]
    pub chain_id: Option<RunId>,
    /// Final recorded step output, when available.
    #[serde(default)]
    pub final_output: Option<String>,
    /// Completed step count.
    pub steps_completed: usize,
}

/// Abort envelope returned when a run terminates early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortEnvelope {
    /// Run identifier.
    pub chain_id: RunId,
    /// Why the run terminated.
    pub reason: String,
}

/// Informational envelope for built-in commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoEnvelope {
    /// Rendered informational text.
    pub text: String,
}

// ============================================================================
// SECTION: Engine Reply
// ============================================================================

/// Engine reply union returned from execute and resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineReply {
    /// Step emitted; awaiting LLM work.
    Pause(PauseEnvelope),
    /// Script tool awaiting confirmation.
    Confirmation(ConfirmationEnvelope),
    /// Gate retry budget exhausted; a gate action is required.
    GateActionRequired(GateActionEnvelope),
    /// Plan exhausted; the run is complete.
    Completed(CompletionEnvelope),
    /// Run terminated early via abort.
    Aborted(AbortEnvelope),
    /// Built-in command output.
    Info(InfoEnvelope),
}
