// crates/conductor-core/src/runtime/planner.rs
// ============================================================================
// Module: Execution Planner
// Description: Parsed command plus prompt metadata into an execution plan.
// Purpose: Decide strategy, gates, framework, and session requirements.
// Dependencies: crate::core, crate::interfaces, crate::runtime::{args, gates}
// ============================================================================

//! ## Overview
//! The planner is a pure combination step: the parsed command, the prompt
//! record, registry-activated gates, caller-supplied quick gates, and the
//! optional semantic analysis go in; an [`ExecutionPlan`] comes out. Operator
//! handling is exhaustive over the closed [`crate::core::Operator`] union.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::CommandType;
use crate::core::EnforcementMode;
use crate::core::ExecutionPlan;
use crate::core::ExecutionStrategy;
use crate::core::GateDefinition;
use crate::core::Modifier;
use crate::core::ParsedCommand;
use crate::core::PlanStep;
use crate::core::QuickGateSpec;
use crate::core::identifiers::GateId;
use crate::interfaces::PromptRecord;
use crate::interfaces::SemanticAnalysis;
use crate::runtime::args::bind_arguments;
use crate::runtime::gates::resolve_enforcement;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Neither the command nor the prompt yielded any steps.
    #[error("plan for '{0}' has no steps")]
    EmptyPlan(String),
}

// ============================================================================
// SECTION: Planner Inputs
// ============================================================================

/// Inputs to one planning pass.
pub struct PlanInputs<'a> {
    /// Parsed command.
    pub command: &'a ParsedCommand,
    /// Prompt record for the base prompt.
    pub prompt: &'a PromptRecord,
    /// Registry-activated gates for the execution context.
    pub active_gates: &'a [GateDefinition],
    /// Caller-supplied quick gates from the request.
    pub request_gates: &'a [QuickGateSpec],
    /// Explicit gate definitions resolved from `::` operators.
    pub operator_gates: &'a [GateDefinition],
    /// Semantic analysis, when the analyzer is enabled.
    pub analysis: Option<&'a SemanticAnalysis>,
    /// Whether the prompt declares script tools.
    pub has_script_tools: bool,
    /// Minimum analyzer confidence for a framework recommendation to bind.
    pub min_framework_confidence: f64,
}

// ============================================================================
// SECTION: Planning
// ============================================================================

/// Builds an execution plan.
///
/// # Errors
///
/// Returns [`PlanError::EmptyPlan`] when no steps can be derived.
pub fn build_plan(inputs: &PlanInputs<'_>) -> Result<ExecutionPlan, PlanError> {
    let command = inputs.command;
    let prompt = inputs.prompt;

    let steps = derive_steps(command, prompt);
    if steps.is_empty() {
        return Err(PlanError::EmptyPlan(command.prompt_id.as_str().to_string()));
    }

    let operator_override = command.framework_override().cloned();
    let recommendation_binds = inputs.analysis.is_some_and(|analysis| {
        analysis.framework.is_some() && analysis.confidence >= inputs.min_framework_confidence
    });
    // The stored override is the resolved framework: the explicit operator
    // wins, else a recommendation above the confidence floor binds.
    let framework_override = operator_override.clone().or_else(|| {
        if recommendation_binds {
            inputs.analysis.and_then(|analysis| analysis.framework.clone())
        } else {
            None
        }
    });

    let chain = command.command_type == CommandType::Chain || prompt.is_chain();
    let strategy = if chain {
        ExecutionStrategy::Chain
    } else if framework_override.is_some() || recommendation_binds {
        ExecutionStrategy::Template
    } else {
        ExecutionStrategy::Single
    };

    // Modifier: script-tool prompts default to clean so tool output stays
    // pristine, unless the caller chose a modifier or supplied gates.
    let explicit_gates_given =
        !inputs.request_gates.is_empty() || !inputs.operator_gates.is_empty();
    let modifier = match command.modifier {
        Some(modifier) => Some(modifier),
        None if inputs.has_script_tools && !explicit_gates_given => Some(Modifier::Clean),
        None => None,
    };

    // Framework requirement survives %clean/%lean only for the explicit
    // operator; injection suppression is the decision service's concern.
    let requires_framework = match modifier {
        Some(Modifier::Clean | Modifier::Lean) => operator_override.is_some(),
        _ => framework_override.is_some(),
    };

    let (gate_ids, step_gates, all_gates) = combine_gates(inputs);
    let quick_gates: Vec<GateDefinition> = all_gates
        .iter()
        .filter(|definition| {
            !inputs.active_gates.iter().any(|active| active.id == definition.id)
        })
        .cloned()
        .collect();

    let blocking_gates = !all_gates.is_empty()
        && resolve_enforcement(&all_gates) == EnforcementMode::Blocking;
    let requires_session = strategy == ExecutionStrategy::Chain || blocking_gates;

    Ok(ExecutionPlan {
        strategy,
        steps,
        framework_override,
        modifier,
        gate_ids,
        step_gates,
        quick_gates,
        requires_session,
        requires_framework,
    })
}

/// Derives plan steps from the command, falling back to prompt-declared
/// chain steps.
fn derive_steps(command: &ParsedCommand, prompt: &PromptRecord) -> Vec<PlanStep> {
    if command.steps.len() > 1 {
        return command
            .steps
            .iter()
            .enumerate()
            .map(|(idx, step)| PlanStep {
                prompt_id: step.prompt_id.clone(),
                args: bind_arguments(&step.raw_args, &prompt.arguments),
                output_var: Some(format!("step_{}_output", idx + 1)),
                depends_on: Vec::new(),
            })
            .collect();
    }
    if prompt.is_chain() {
        return prompt
            .chain_steps
            .iter()
            .map(|spec| PlanStep {
                prompt_id: spec.prompt_id.clone(),
                args: bind_arguments(&command.raw_args, &prompt.arguments),
                output_var: spec.output_var.clone(),
                depends_on: spec.depends_on.clone(),
            })
            .collect();
    }
    vec![PlanStep {
        prompt_id: command.prompt_id.clone(),
        args: bind_arguments(&command.raw_args, &prompt.arguments),
        output_var: None,
        depends_on: Vec::new(),
    }]
}

/// Unions registry-activated, operator, and request gates.
///
/// Returns chain-wide gate ids, per-step overrides, and the full definition
/// set used for enforcement resolution.
fn combine_gates(
    inputs: &PlanInputs<'_>,
) -> (Vec<GateId>, BTreeMap<usize, Vec<GateId>>, Vec<GateDefinition>) {
    let mut gate_ids: Vec<GateId> = Vec::new();
    let mut all_gates: Vec<GateDefinition> = Vec::new();
    let mut step_gates: BTreeMap<usize, Vec<GateId>> = BTreeMap::new();

    let mut push_chain_wide = |definition: &GateDefinition| {
        if !gate_ids.contains(&definition.id) {
            gate_ids.push(definition.id.clone());
        }
    };

    for definition in inputs.active_gates {
        push_chain_wide(definition);
        all_gates.push(definition.clone());
    }
    for definition in inputs.operator_gates {
        push_chain_wide(definition);
        all_gates.push(definition.clone());
    }
    for spec in inputs.request_gates {
        let definition = GateDefinition::from_quick_spec(spec);
        if spec.apply_to_steps.is_empty() {
            push_chain_wide(&definition);
        } else {
            for step in &spec.apply_to_steps {
                let entry = step_gates.entry(*step).or_default();
                if !entry.contains(&definition.id) {
                    entry.push(definition.id.clone());
                }
            }
        }
        all_gates.push(definition);
    }

    (gate_ids, step_gates, all_gates)
}
