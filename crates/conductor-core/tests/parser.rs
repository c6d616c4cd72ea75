// conductor-core/tests/parser.rs
// ============================================================================
// Module: Command Parser Tests
// Description: Strategy selection, operators, modifiers, and error paths.
// ============================================================================
//! ## Overview
//! Validates the multi-strategy parser against the command grammar, including
//! quote handling, prefix normalization, and unknown-prompt suggestions.

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

use conductor_core::CommandFormat;
use conductor_core::CommandParser;
use conductor_core::CommandType;
use conductor_core::Modifier;
use conductor_core::Operator;
use conductor_core::ParseError;
use conductor_core::PromptId;

/// Builds an available-prompt list from string ids.
fn ids(names: &[&str]) -> Vec<PromptId> {
    names.iter().map(|name| PromptId::new(*name)).collect()
}

// ============================================================================
// SECTION: Simple Strategy
// ============================================================================

/// Verifies the simple strategy on the `>>id args` form.
#[test]
fn simple_command_parses() {
    let parser = CommandParser::new();
    let parsed = parser.parse(">>summarize hello world", &ids(&["summarize"])).unwrap();
    assert_eq!(parsed.prompt_id.as_str(), "summarize");
    assert_eq!(parsed.raw_args, "hello world");
    assert_eq!(parsed.format, CommandFormat::Simple);
    assert_eq!(parsed.command_type, CommandType::Single);
    assert_eq!(parsed.steps.len(), 1);
    assert!((parsed.confidence - 0.95).abs() < f64::EPSILON);
}

/// Verifies the `/id` prefix is accepted.
#[test]
fn slash_prefix_parses() {
    let parser = CommandParser::new();
    let parsed = parser.parse("/summarize text", &ids(&["summarize"])).unwrap();
    assert_eq!(parsed.prompt_id.as_str(), "summarize");
}

/// Verifies id normalization surfaces a warning.
#[test]
fn id_normalization_warns() {
    let parser = CommandParser::new();
    let parsed = parser.parse(">>My-Prompt text", &ids(&["my_prompt"])).unwrap();
    assert_eq!(parsed.prompt_id.as_str(), "my_prompt");
    assert!(parsed.warnings.iter().any(|warning| warning.contains("normalized")));
}

/// Verifies the trimmed original command is preserved in metadata.
#[test]
fn original_command_preserved() {
    let parser = CommandParser::new();
    let parsed = parser.parse("  >>summarize hi  ", &ids(&["summarize"])).unwrap();
    assert_eq!(parsed.metadata.original_command, ">>summarize hi");
}

// ============================================================================
// SECTION: Symbolic Strategy
// ============================================================================

/// Verifies the full symbolic grammar in one command.
#[test]
fn symbolic_full_grammar() {
    let parser = CommandParser::new();
    let parsed = parser
        .parse(
            "%judge @CAGEERF >>analyze topic:\"x\" --> >>report :: \"cite sources\"",
            &ids(&["analyze", "report"]),
        )
        .unwrap();
    assert_eq!(parsed.modifier, Some(Modifier::Judge));
    assert_eq!(parsed.format, CommandFormat::Symbolic);
    assert_eq!(parsed.command_type, CommandType::Chain);
    assert_eq!(parsed.steps.len(), 2);
    assert_eq!(parsed.steps[0].prompt_id.as_str(), "analyze");
    assert_eq!(parsed.steps[0].raw_args, "topic:\"x\"");
    assert_eq!(parsed.steps[1].prompt_id.as_str(), "report");
    assert_eq!(parsed.framework_override().unwrap().as_str(), "CAGEERF");
    assert_eq!(parsed.gate_values(), vec!["cite sources"]);
    assert!(parsed.operators.contains(&Operator::Chain));
}

/// Verifies operators inside quoted strings are left alone.
#[test]
fn quoted_operators_are_inert() {
    let parser = CommandParser::new();
    let parsed = parser
        .parse(">>analyze topic:\"a --> b :: c\"", &ids(&["analyze"]))
        .unwrap();
    assert_eq!(parsed.command_type, CommandType::Single);
    assert_eq!(parsed.steps.len(), 1);
    assert!(parsed.raw_args.contains("a --> b :: c"));
}

/// Verifies framework ids are normalized uppercase wherever they appear.
#[test]
fn framework_normalized_uppercase() {
    let parser = CommandParser::new();
    let parsed = parser.parse(">>analyze @cageerf", &ids(&["analyze"])).unwrap();
    assert_eq!(parsed.framework_override().unwrap().as_str(), "CAGEERF");
}

/// Verifies a stray `>>` before `@` is repaired and flagged.
#[test]
fn stray_prefix_before_framework_repaired() {
    let parser = CommandParser::new();
    let parsed = parser.parse(">>@CAGEERF >>analyze", &ids(&["analyze"])).unwrap();
    assert!(parsed.metadata.prefix_normalized);
    assert_eq!(parsed.framework_override().unwrap().as_str(), "CAGEERF");
    assert_eq!(parsed.steps.len(), 1);
}

/// Verifies the standalone `=` gate form.
#[test]
fn equals_gate_form() {
    let parser = CommandParser::new();
    let parsed = parser.parse(">>analyze = \"good refs\"", &ids(&["analyze"])).unwrap();
    assert_eq!(parsed.gate_values(), vec!["good refs"]);
}

/// Verifies every `::` gate is captured, not just the first.
#[test]
fn all_gates_captured() {
    let parser = CommandParser::new();
    let parsed = parser
        .parse(">>analyze :: \"first\" :: second", &ids(&["analyze"]))
        .unwrap();
    assert_eq!(parsed.gate_values(), vec!["first", "second"]);
}

/// Verifies the conditional operator with a validated branch.
#[test]
fn conditional_operator_parses() {
    let parser = CommandParser::new();
    let parsed = parser
        .parse(">>analyze ? \"needs depth\" : report", &ids(&["analyze", "report"]))
        .unwrap();
    let found = parsed.operators.iter().any(|op| {
        matches!(op, Operator::Conditional { condition, branch }
            if condition == "needs depth" && branch == "report")
    });
    assert!(found);
}

/// Verifies the three style selector spellings.
#[test]
fn style_selector_forms() {
    let parser = CommandParser::new();
    for command in [
        ">>analyze #style(concise)",
        ">>analyze #style:concise",
        ">>analyze #concise",
    ] {
        let parsed = parser.parse(command, &ids(&["analyze"])).unwrap();
        assert_eq!(parsed.style().unwrap().as_str(), "concise", "command {command}");
    }
}

/// Verifies parallel steps split without marking the command a chain.
#[test]
fn parallel_steps_split() {
    let parser = CommandParser::new();
    let parsed = parser.parse(">>analyze + >>report", &ids(&["analyze", "report"])).unwrap();
    assert_eq!(parsed.steps.len(), 2);
    assert!(parsed.operators.contains(&Operator::Parallel));
    assert_eq!(parsed.command_type, CommandType::Single);
}

// ============================================================================
// SECTION: JSON Strategy
// ============================================================================

/// Verifies the JSON wrapper re-serializes args into the raw tail.
#[test]
fn json_wrapper_parses() {
    let parser = CommandParser::new();
    let parsed = parser
        .parse(
            "{\"command\": \">>summarize\", \"args\": {\"text\": \"hello\"}}",
            &ids(&["summarize"]),
        )
        .unwrap();
    assert_eq!(parsed.format, CommandFormat::Json);
    assert!(parsed.raw_args.contains("text:\"hello\""));
}

/// Verifies malformed JSON is a decode error, not a silent fallback.
#[test]
fn json_malformed_rejected() {
    let parser = CommandParser::new();
    let error = parser.parse("{\"command\": 42}", &ids(&["summarize"])).unwrap_err();
    assert!(matches!(error, ParseError::InvalidJson(_)));
}

// ============================================================================
// SECTION: Error Paths
// ============================================================================

/// Verifies empty input fails.
#[test]
fn empty_command_rejected() {
    let parser = CommandParser::new();
    assert!(matches!(parser.parse("   ", &ids(&["x"])), Err(ParseError::Empty)));
}

/// Verifies a second modifier is rejected.
#[test]
fn duplicate_modifier_rejected() {
    let parser = CommandParser::new();
    let error = parser.parse("%clean %judge >>analyze", &ids(&["analyze"])).unwrap_err();
    assert!(matches!(error, ParseError::DuplicateModifier { .. }));
}

/// Verifies an unknown modifier name is rejected.
#[test]
fn unknown_modifier_rejected() {
    let parser = CommandParser::new();
    let error = parser.parse("%foo >>analyze", &ids(&["analyze"])).unwrap_err();
    assert!(matches!(error, ParseError::InvalidModifier(name) if name == "foo"));
}

/// Verifies a bare `>>` fails with an empty-id error.
#[test]
fn empty_step_id_rejected() {
    let parser = CommandParser::new();
    let error = parser.parse(">>", &ids(&["analyze"])).unwrap_err();
    assert!(matches!(error, ParseError::EmptyStepId));
}

/// Verifies a chain step without a prefix is rejected.
#[test]
fn chain_step_without_prefix_rejected() {
    let parser = CommandParser::new();
    let error = parser.parse(">>analyze --> report", &ids(&["analyze", "report"])).unwrap_err();
    assert!(matches!(error, ParseError::MalformedStep(_)));
}

/// Verifies unknown prompts rank suggestions by edit distance.
#[test]
fn unknown_prompt_suggestions_ranked() {
    let parser = CommandParser::new();
    let error = parser
        .parse(">>analiyse", &ids(&["analyze", "analyst", "summarize"]))
        .unwrap_err();
    let ParseError::UnknownPrompt {
        id,
        suggestions,
        ..
    } = error
    else {
        panic!("expected UnknownPrompt");
    };
    assert_eq!(id, "analiyse");
    assert!(suggestions.len() <= 3);
    // Both candidates sit at distance two; ties break alphabetically.
    assert_eq!(suggestions, vec!["analyst".to_string(), "analyze".to_string()]);
}

/// Verifies near-builtin typos get a built-in hint.
#[test]
fn builtin_hint_for_typo() {
    let parser = CommandParser::new();
    let error = parser.parse(">>hepl", &ids(&["analyze"])).unwrap_err();
    let ParseError::UnknownPrompt {
        hint, ..
    } = error
    else {
        panic!("expected UnknownPrompt");
    };
    assert!(hint.unwrap().contains("help"));
}
