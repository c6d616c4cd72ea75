// crates/conductor-core/src/parser/json.rs
// ============================================================================
// Module: JSON Parse Strategy
// Description: `{"command": "...", "args": {...}}` wrapper commands.
// Purpose: Unwrap JSON-shaped commands into the simple strategy.
// Dependencies: crate::parser, serde_json
// ============================================================================

//! ## Overview
//! Hosts sometimes deliver commands as a JSON object wrapping the command
//! string and a structured argument map. The inner command is parsed with the
//! simple strategy and the argument map is re-serialized into the raw tail so
//! downstream argument extraction sees one format.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::command::CommandStep;
use crate::parser::ParseError;
use crate::parser::simple;

// ============================================================================
// SECTION: Applicability
// ============================================================================

/// Returns true when the input looks like a JSON object.
#[must_use]
pub(crate) fn applies(input: &str) -> bool {
    input.trim_start().starts_with('{')
}

// ============================================================================
// SECTION: JSON Parse
// ============================================================================

/// Parses a JSON-wrapped command.
///
/// # Errors
///
/// Returns [`ParseError::InvalidJson`] on malformed JSON or a missing
/// `command` field, and propagates inner simple-strategy errors.
pub(crate) fn parse(input: &str, warnings: &mut Vec<String>) -> Result<CommandStep, ParseError> {
    let value: Value = serde_json::from_str(input)
        .map_err(|err| ParseError::InvalidJson(err.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| ParseError::InvalidJson("expected a JSON object".to_string()))?;
    let command = object
        .get("command")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseError::InvalidJson("missing string field 'command'".to_string()))?;

    let mut step = simple::parse(command, warnings)?;

    if let Some(args) = object.get("args") {
        let map = args
            .as_object()
            .ok_or_else(|| ParseError::InvalidJson("'args' must be an object".to_string()))?;
        let mut tail = step.raw_args;
        for (key, arg_value) in map {
            if !tail.is_empty() {
                tail.push(' ');
            }
            tail.push_str(&format!("{key}:\"{}\"", render_arg(arg_value)));
        }
        step.raw_args = tail;
    }

    Ok(step)
}

/// Renders one argument value into its raw-tail form.
fn render_arg(value: &Value) -> String {
    match value {
        Value::String(text) => text.replace('"', "\\\""),
        other => other.to_string().replace('"', "\\\""),
    }
}
