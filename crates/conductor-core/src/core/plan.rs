// crates/conductor-core/src/core/plan.rs
// ============================================================================
// Module: Conductor Execution Plan
// Description: Execution plan structure produced by the planner.
// Purpose: Capture strategy, steps, gates, and framework requirements for a run.
// Dependencies: crate::core::{command, identifiers}, serde
// ============================================================================

//! ## Overview
//! An execution plan combines the parsed command, prompt metadata, and
//! semantic-analysis hints into the concrete shape the engine executes. Plans
//! are stored inside session blueprints so resumed runs replay the same
//! decisions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::command::Modifier;
use crate::core::gates::GateDefinition;
use crate::core::identifiers::FrameworkId;
use crate::core::identifiers::GateId;
use crate::core::identifiers::PromptId;

// ============================================================================
// SECTION: Strategy
// ============================================================================

/// Execution strategy for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// One prompt, no framework shaping.
    Single,
    /// One prompt with framework-shaped system prompt.
    Template,
    /// Multi-step chain.
    Chain,
}

// ============================================================================
// SECTION: Plan Steps
// ============================================================================

/// One planned step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Prompt identifier executed by the step.
    pub prompt_id: PromptId,
    /// Resolved argument map for template rendering.
    pub args: BTreeMap<String, String>,
    /// Output variable name the step result binds to.
    #[serde(default)]
    pub output_var: Option<String>,
    /// Output variables of earlier steps this step depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

// ============================================================================
// SECTION: Execution Plan
// ============================================================================

/// Execution plan for one run.
///
/// # Invariants
/// - `requires_session` is true iff `steps.len() > 1` or an explicit pause
///   point exists.
/// - `framework_override` is stored in canonical uppercase form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Execution strategy.
    pub strategy: ExecutionStrategy,
    /// Ordered steps.
    pub steps: Vec<PlanStep>,
    /// Framework override from the `@ID` operator, when present.
    #[serde(default)]
    pub framework_override: Option<FrameworkId>,
    /// Modifier carried from the parsed command or defaulted by the planner.
    #[serde(default)]
    pub modifier: Option<Modifier>,
    /// Chain-wide gate identifiers to apply.
    #[serde(default)]
    pub gate_ids: Vec<GateId>,
    /// Per-step gate overrides keyed by 1-based step number.
    #[serde(default)]
    pub step_gates: BTreeMap<usize, Vec<GateId>>,
    /// Definitions for gates that exist only in this plan (quick gates and
    /// operator criteria), so resume can re-render them without the registry.
    #[serde(default)]
    pub quick_gates: Vec<GateDefinition>,
    /// Whether the run needs a persistent session.
    pub requires_session: bool,
    /// Whether framework injection is required for the run.
    pub requires_framework: bool,
}

impl ExecutionPlan {
    /// Returns the total number of steps.
    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// Returns the gate ids active for a 1-based step, overrides included.
    #[must_use]
    pub fn gates_for_step(&self, step: usize) -> Vec<GateId> {
        let mut gates = self.gate_ids.clone();
        if let Some(extra) = self.step_gates.get(&step) {
            for gate in extra {
                if !gates.contains(gate) {
                    gates.push(gate.clone());
                }
            }
        }
        gates
    }
}
