// crates/conductor-core/src/core/session.rs
// ============================================================================
// Module: Conductor Chain Sessions
// Description: Session state, step records, pending reviews, and the registry document.
// Purpose: Capture pause/resume state for multi-step runs with replayable history.
// Dependencies: crate::core::{command, identifiers, plan, time}, serde
// ============================================================================

//! ## Overview
//! A chain session is one concrete run of a multi-step plan. The LLM is the
//! scheduler: the engine pauses by returning an envelope and the session holds
//! everything needed to resume. Step state transitions are funneled through
//! the methods here so the awaiting-gate invariant cannot be broken by
//! callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::command::ParsedCommand;
use crate::core::identifiers::BaseChainId;
use crate::core::identifiers::GateId;
use crate::core::identifiers::PromptId;
use crate::core::identifiers::RunId;
use crate::core::plan::ExecutionPlan;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Step State
// ============================================================================

/// Per-step state machine.
///
/// # Invariants
/// - `Completed`, `Failed`, and `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Step has not started.
    Pending,
    /// Step has been emitted and awaits LLM output.
    InProgress,
    /// Step output recorded; a gate review is pending.
    AwaitingGate,
    /// Step finished successfully.
    Completed,
    /// Step failed terminally.
    Failed,
    /// Step bypassed via a skip gate action.
    Skipped,
}

impl StepState {
    /// Returns true for terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// Per-step metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Prompt executed by the step.
    pub prompt_id: PromptId,
    /// Current step state.
    pub state: StepState,
    /// Whether the step is a placeholder awaiting later expansion.
    #[serde(default)]
    pub placeholder: bool,
    /// When the step was first emitted.
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    /// When the step reached a terminal state.
    #[serde(default)]
    pub finished_at: Option<Timestamp>,
    /// Last recorded step output.
    #[serde(default)]
    pub last_result: Option<String>,
}

impl StepRecord {
    /// Creates a pending record for a prompt.
    #[must_use]
    pub const fn pending(prompt_id: PromptId) -> Self {
        Self {
            prompt_id,
            state: StepState::Pending,
            placeholder: false,
            started_at: None,
            finished_at: None,
            last_result: None,
        }
    }
}

// ============================================================================
// SECTION: Pending Gate Review
// ============================================================================

/// Pending gate review blocking step advancement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGateReview {
    /// Gate identifiers awaiting a verdict.
    pub gate_ids: Vec<GateId>,
    /// Attempts consumed so far.
    pub attempt: u32,
    /// Most restrictive attempt budget across the active gates.
    pub max_attempts: u32,
    /// Feedback from the last failing verdict.
    #[serde(default)]
    pub last_feedback: Option<String>,
}

impl PendingGateReview {
    /// Returns true when the attempt budget is exhausted.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

// ============================================================================
// SECTION: Session Lifecycle
// ============================================================================

/// Run completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is live and resumable.
    Active,
    /// Run finished its plan.
    Completed,
    /// Run was aborted by a gate action or administrative clear.
    Aborted,
}

impl RunStatus {
    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

/// Run lifecycle relative to its base chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLifecycle {
    /// The single active run for its base chain id.
    Canonical,
    /// Superseded by a newer run of the same base chain.
    Dormant,
}

/// Stored blueprint replayed on resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBlueprint {
    /// Parsed command that started the run.
    pub command: ParsedCommand,
    /// Execution plan derived from the command.
    pub plan: ExecutionPlan,
}

// ============================================================================
// SECTION: Chain Session
// ============================================================================

/// One concrete run of a chain.
///
/// # Invariants
/// - `current_step` is in `[1, total_steps + 1]`; `total_steps + 1` denotes
///   completion.
/// - `pending_review` is `Some` iff the current step state is
///   [`StepState::AwaitingGate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSession {
    /// Unique run identifier.
    pub run_id: RunId,
    /// Base chain identifier shared by all runs of the same prompt.
    pub base_chain_id: BaseChainId,
    /// Current step, 1-based.
    pub current_step: usize,
    /// Total number of planned steps.
    pub total_steps: usize,
    /// Per-step records, index 0 is step 1.
    pub steps: Vec<StepRecord>,
    /// Pending gate review, when the current step awaits one.
    #[serde(default)]
    pub pending_review: Option<PendingGateReview>,
    /// Original argument tail from the starting command.
    pub original_args: String,
    /// Stored blueprint for resume.
    pub blueprint: SessionBlueprint,
    /// Run completion status.
    pub status: RunStatus,
    /// Run lifecycle relative to its base chain.
    pub lifecycle: RunLifecycle,
    /// When the run started.
    pub started_at: Timestamp,
    /// Last observed activity.
    pub last_activity_at: Timestamp,
}

impl ChainSession {
    /// Creates a fresh session for a blueprint.
    #[must_use]
    pub fn new(
        run_id: RunId,
        base_chain_id: BaseChainId,
        blueprint: SessionBlueprint,
        original_args: String,
        now: Timestamp,
    ) -> Self {
        let steps = blueprint
            .plan
            .steps
            .iter()
            .map(|step| StepRecord::pending(step.prompt_id.clone()))
            .collect::<Vec<_>>();
        let total_steps = steps.len();
        Self {
            run_id,
            base_chain_id,
            current_step: 1,
            total_steps,
            steps,
            pending_review: None,
            original_args,
            blueprint,
            status: RunStatus::Active,
            lifecycle: RunLifecycle::Canonical,
            started_at: now,
            last_activity_at: now,
        }
    }

    /// Returns true when every step has been consumed.
    #[must_use]
    pub const fn is_plan_exhausted(&self) -> bool {
        self.current_step > self.total_steps
    }

    /// Returns the current step record, or `None` past the end of the plan.
    #[must_use]
    pub fn current_record(&self) -> Option<&StepRecord> {
        self.current_step.checked_sub(1).and_then(|idx| self.steps.get(idx))
    }

    /// Returns the current step state, or `None` past the end of the plan.
    #[must_use]
    pub fn current_state(&self) -> Option<StepState> {
        self.current_record().map(|record| record.state)
    }

    /// Marks the current step as emitted.
    ///
    /// Pending steps move to in-progress; other states are left untouched so
    /// re-emission (gate retries) does not regress terminal records.
    pub fn mark_step_emitted(&mut self, now: Timestamp) {
        if let Some(record) = self.current_record_mut() {
            if record.state == StepState::Pending {
                record.state = StepState::InProgress;
                record.started_at = Some(now);
            }
        }
        self.last_activity_at = now;
    }

    /// Records output for the current step without completing it.
    pub fn record_step_output(&mut self, output: &str, now: Timestamp) {
        if let Some(record) = self.current_record_mut() {
            record.last_result = Some(output.to_string());
        }
        self.last_activity_at = now;
    }

    /// Completes the current step.
    pub fn complete_current_step(&mut self, now: Timestamp) {
        self.pending_review = None;
        if let Some(record) = self.current_record_mut() {
            record.state = StepState::Completed;
            record.finished_at = Some(now);
        }
        self.last_activity_at = now;
    }

    /// Skips the current step via a gate action.
    pub fn skip_current_step(&mut self, now: Timestamp) {
        self.pending_review = None;
        if let Some(record) = self.current_record_mut() {
            record.state = StepState::Skipped;
            record.finished_at = Some(now);
        }
        self.last_activity_at = now;
    }

    /// Fails the current step terminally.
    pub fn fail_current_step(&mut self, now: Timestamp) {
        self.pending_review = None;
        if let Some(record) = self.current_record_mut() {
            record.state = StepState::Failed;
            record.finished_at = Some(now);
        }
        self.last_activity_at = now;
    }

    /// Stores a pending gate review and moves the step to awaiting-gate.
    pub fn store_pending_review(&mut self, review: PendingGateReview, now: Timestamp) {
        if let Some(record) = self.current_record_mut() {
            record.state = StepState::AwaitingGate;
        }
        self.pending_review = Some(review);
        self.last_activity_at = now;
    }

    /// Advances past the current step.
    ///
    /// Legal only when the current step is completed or skipped; any other
    /// state is a no-op returning `false`.
    pub fn advance_step(&mut self, now: Timestamp) -> bool {
        let advanceable = matches!(
            self.current_state(),
            Some(StepState::Completed | StepState::Skipped)
        );
        if !advanceable {
            return false;
        }
        self.current_step = self.current_step.saturating_add(1);
        self.last_activity_at = now;
        if self.is_plan_exhausted() {
            self.status = RunStatus::Completed;
        }
        true
    }

    /// Aborts the run.
    pub fn abort(&mut self, now: Timestamp) {
        self.pending_review = None;
        self.status = RunStatus::Aborted;
        self.last_activity_at = now;
    }

    /// Returns true when the run is live: not completed, not aborted, not
    /// superseded, and inside the inactivity window.
    #[must_use]
    pub fn is_active(&self, now: Timestamp, max_idle_ms: i64) -> bool {
        self.status == RunStatus::Active
            && self.lifecycle == RunLifecycle::Canonical
            && now.millis_since(self.last_activity_at) <= max_idle_ms
    }

    /// Returns the mutable current step record.
    fn current_record_mut(&mut self) -> Option<&mut StepRecord> {
        self.current_step.checked_sub(1).and_then(|idx| self.steps.get_mut(idx))
    }
}

// ============================================================================
// SECTION: Registry Document
// ============================================================================

/// Current registry document schema version.
pub const REGISTRY_VERSION: u32 = 2;

/// Persisted session registry document.
///
/// Legacy key spellings (`sessions`, `chainMapping`, `chainRuns`) are read for
/// backward compatibility and written under the canonical names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRegistryDocument {
    /// Document schema version.
    #[serde(default = "default_registry_version")]
    pub version: u32,
    /// All runs keyed by run id.
    #[serde(default, alias = "sessions")]
    pub runs: BTreeMap<String, ChainSession>,
    /// Run id to base chain id mapping.
    #[serde(default, alias = "chainMapping")]
    pub run_mapping: BTreeMap<String, String>,
    /// Base chain id to run ids, in creation order.
    #[serde(default, alias = "chainRuns")]
    pub base_runs: BTreeMap<String, Vec<String>>,
    /// Base chain id to retired run ids, in retirement order.
    #[serde(default)]
    pub run_history: BTreeMap<String, Vec<String>>,
}

/// Default version stamped on documents missing the field.
const fn default_registry_version() -> u32 {
    REGISTRY_VERSION
}
