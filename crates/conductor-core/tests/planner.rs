// conductor-core/tests/planner.rs
// ============================================================================
// Module: Execution Planner Tests
// Description: Strategy selection, gate union, and session requirements.
// ============================================================================
//! ## Overview
//! Validates the planner's strategy ladder, the framework-requirement rules
//! under modifiers, the script-tool clean default, and the gate union.

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

use conductor_core::CommandParser;
use conductor_core::EnforcementMode;
use conductor_core::ExecutionStrategy;
use conductor_core::GateDefinition;
use conductor_core::GateId;
use conductor_core::Modifier;
use conductor_core::PromptArgument;
use conductor_core::PromptId;
use conductor_core::PromptRecord;
use conductor_core::QuickGateSpec;
use conductor_core::CategoryId;
use conductor_core::SemanticAnalysis;
use conductor_core::FrameworkId;
use conductor_core::runtime::PlanInputs;
use conductor_core::runtime::build_plan;

/// Builds a plain prompt record.
fn record(id: &str) -> PromptRecord {
    PromptRecord {
        id: PromptId::new(id),
        name: id.to_string(),
        category: CategoryId::new("general"),
        description: String::new(),
        user_template: "{{text}}".to_string(),
        system_template: None,
        arguments: vec![PromptArgument {
            name: "text".to_string(),
            required: false,
            description: None,
        }],
        chain_steps: Vec::new(),
        gate_ids: Vec::new(),
    }
}

/// Parses a command against a fixed catalog.
fn parse(command: &str) -> conductor_core::ParsedCommand {
    CommandParser::new()
        .parse(command, &[PromptId::new("analyze"), PromptId::new("report")])
        .unwrap()
}

/// Default planner inputs for a command.
fn inputs<'a>(
    command: &'a conductor_core::ParsedCommand,
    prompt: &'a PromptRecord,
) -> PlanInputs<'a> {
    PlanInputs {
        command,
        prompt,
        active_gates: &[],
        request_gates: &[],
        operator_gates: &[],
        analysis: None,
        has_script_tools: false,
        min_framework_confidence: 0.7,
    }
}

// ============================================================================
// SECTION: Strategy Selection
// ============================================================================

/// Verifies the chain operator selects the chain strategy and a session.
#[test]
fn chain_operator_selects_chain() {
    let command = parse(">>analyze --> >>report");
    let prompt = record("analyze");
    let plan = build_plan(&inputs(&command, &prompt)).unwrap();
    assert_eq!(plan.strategy, ExecutionStrategy::Chain);
    assert!(plan.requires_session);
    assert_eq!(plan.total_steps(), 2);
}

/// Verifies a framework operator selects the template strategy.
#[test]
fn framework_operator_selects_template() {
    let command = parse("@CAGEERF >>analyze");
    let prompt = record("analyze");
    let plan = build_plan(&inputs(&command, &prompt)).unwrap();
    assert_eq!(plan.strategy, ExecutionStrategy::Template);
    assert!(plan.requires_framework);
    assert!(!plan.requires_session);
}

/// Verifies a plain command is a single-strategy ephemeral plan.
#[test]
fn plain_command_is_single() {
    let command = parse(">>analyze something");
    let prompt = record("analyze");
    let plan = build_plan(&inputs(&command, &prompt)).unwrap();
    assert_eq!(plan.strategy, ExecutionStrategy::Single);
    assert!(!plan.requires_session);
    assert!(!plan.requires_framework);
}

// ============================================================================
// SECTION: Framework Rules
// ============================================================================

/// Verifies %clean keeps the explicit framework requirement.
#[test]
fn clean_keeps_explicit_framework() {
    let command = parse("%clean @CAGEERF >>analyze");
    let prompt = record("analyze");
    let plan = build_plan(&inputs(&command, &prompt)).unwrap();
    assert!(plan.requires_framework);
    assert_eq!(plan.modifier, Some(Modifier::Clean));
}

/// Verifies %clean drops an analyzer recommendation.
#[test]
fn clean_drops_recommendation() {
    let command = parse("%clean >>analyze");
    let prompt = record("analyze");
    let analysis = SemanticAnalysis {
        framework: Some(FrameworkId::new("CAGEERF")),
        confidence: 0.95,
    };
    let mut in_puts = inputs(&command, &prompt);
    in_puts.analysis = Some(&analysis);
    let plan = build_plan(&in_puts).unwrap();
    assert!(!plan.requires_framework);
}

/// Verifies a confident recommendation binds without an operator.
#[test]
fn recommendation_binds_above_floor() {
    let command = parse(">>analyze");
    let prompt = record("analyze");
    let analysis = SemanticAnalysis {
        framework: Some(FrameworkId::new("CAGEERF")),
        confidence: 0.9,
    };
    let mut in_puts = inputs(&command, &prompt);
    in_puts.analysis = Some(&analysis);
    let plan = build_plan(&in_puts).unwrap();
    assert!(plan.requires_framework);
    assert_eq!(plan.framework_override.unwrap().as_str(), "CAGEERF");

    let weak = SemanticAnalysis {
        framework: Some(FrameworkId::new("CAGEERF")),
        confidence: 0.2,
    };
    let mut in_puts = inputs(&command, &prompt);
    in_puts.analysis = Some(&weak);
    let plan = build_plan(&in_puts).unwrap();
    assert!(!plan.requires_framework);
}

// ============================================================================
// SECTION: Script Tool Default
// ============================================================================

/// Verifies script-tool prompts default to the clean modifier.
#[test]
fn script_tools_default_clean() {
    let command = parse(">>analyze file:\"x.csv\"");
    let prompt = record("analyze");
    let mut in_puts = inputs(&command, &prompt);
    in_puts.has_script_tools = true;
    let plan = build_plan(&in_puts).unwrap();
    assert_eq!(plan.modifier, Some(Modifier::Clean));

    // Explicit gates disable the default.
    let quick = [QuickGateSpec {
        name: "accuracy".to_string(),
        description: "be accurate".to_string(),
        apply_to_steps: Vec::new(),
    }];
    let mut in_puts = inputs(&command, &prompt);
    in_puts.has_script_tools = true;
    in_puts.request_gates = &quick;
    let plan = build_plan(&in_puts).unwrap();
    assert_eq!(plan.modifier, None);
}

// ============================================================================
// SECTION: Gate Union
// ============================================================================

/// Verifies the gate union across sources and step targeting.
#[test]
fn gate_union_and_step_targeting() {
    let command = parse(">>analyze --> >>report");
    let prompt = record("analyze");

    let active = [GateDefinition::quick("registry-gate", "from registry")];
    let quick = [
        QuickGateSpec {
            name: "chainwide".to_string(),
            description: "applies everywhere".to_string(),
            apply_to_steps: Vec::new(),
        },
        QuickGateSpec {
            name: "step-two-only".to_string(),
            description: "applies to step two".to_string(),
            apply_to_steps: vec![2],
        },
    ];
    let mut in_puts = inputs(&command, &prompt);
    in_puts.active_gates = &active;
    in_puts.request_gates = &quick;
    let plan = build_plan(&in_puts).unwrap();

    assert!(plan.gate_ids.contains(&GateId::new("registry-gate")));
    assert!(plan.gate_ids.contains(&GateId::new("chainwide")));
    assert!(!plan.gate_ids.contains(&GateId::new("step-two-only")));

    let step_two = plan.gates_for_step(2);
    assert!(step_two.contains(&GateId::new("step-two-only")));
    let step_one = plan.gates_for_step(1);
    assert!(!step_one.contains(&GateId::new("step-two-only")));
}

/// Verifies blocking quick gates force a session for single steps.
#[test]
fn blocking_gates_force_session() {
    let command = parse(">>analyze");
    let prompt = record("analyze");
    let mut blocking = GateDefinition::quick("must-pass", "hard requirement");
    blocking.enforcement = Some(EnforcementMode::Blocking);
    let active = [blocking];
    let mut in_puts = inputs(&command, &prompt);
    in_puts.active_gates = &active;
    let plan = build_plan(&in_puts).unwrap();
    assert!(plan.requires_session);
}
