// crates/conductor-script/src/matcher.rs
// ============================================================================
// Module: Script Tool Matching
// Description: Trigger evaluation and schema-based input matching.
// Purpose: Decide deterministically which declared tool, if any, should run.
// Dependencies: conductor-core, jsonschema, serde_json
// ============================================================================

//! ## Overview
//! Matching walks the declared tools in order and returns the first match.
//! `always` matches unconditionally, `explicit` requires a `tool:<id>` token
//! in the raw arguments, and `schema_match` validates the extracted inputs
//! against the tool's JSON Schema. Inputs are coerced before validation:
//! empty strings bound to optional object/array fields are dropped, and
//! JSON-looking strings are parsed when the schema declares a structured
//! type.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use conductor_core::ScriptTool;
use conductor_core::ScriptRunError;
use conductor_core::ToolTrigger;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Matching
// ============================================================================

/// Result of a successful match.
#[derive(Debug, Clone)]
pub struct ToolMatch {
    /// Matched tool.
    pub tool: ScriptTool,
    /// Coerced input object for the subprocess.
    pub inputs: Value,
    /// Whether the caller named the tool explicitly.
    pub explicit: bool,
}

/// Returns the first matching enabled tool.
///
/// # Errors
///
/// Returns [`ScriptRunError::InvalidInput`] when an explicitly requested
/// tool's inputs violate its schema.
pub fn match_tool(
    tools: &[ScriptTool],
    raw_args: &str,
    bindings: &BTreeMap<String, String>,
) -> Result<Option<ToolMatch>, ScriptRunError> {
    for tool in tools {
        if !tool.enabled || tool.execution.trigger == ToolTrigger::Never {
            continue;
        }
        let explicit = has_explicit_token(raw_args, tool);
        let inputs = coerce_inputs(bindings, &tool.input_schema);
        match tool.execution.trigger {
            ToolTrigger::Always => {
                return Ok(Some(ToolMatch {
                    tool: tool.clone(),
                    inputs,
                    explicit,
                }));
            }
            ToolTrigger::Explicit => {
                if explicit {
                    validate_strict(&tool.input_schema, &inputs).map_err(|violation| {
                        ScriptRunError::InvalidInput(format!(
                            "tool '{}': {violation}",
                            tool.id
                        ))
                    })?;
                    return Ok(Some(ToolMatch {
                        tool: tool.clone(),
                        inputs,
                        explicit,
                    }));
                }
            }
            ToolTrigger::SchemaMatch => {
                let matched = if tool.execution.strict {
                    validate_strict(&tool.input_schema, &inputs).is_ok()
                } else {
                    lax_match(&tool.input_schema, &inputs)
                };
                if matched {
                    return Ok(Some(ToolMatch {
                        tool: tool.clone(),
                        inputs,
                        explicit,
                    }));
                }
            }
            ToolTrigger::Never => {}
        }
    }
    Ok(None)
}

/// Returns true when `tool:<id>` appears in the raw arguments.
#[must_use]
pub fn has_explicit_token(raw_args: &str, tool: &ScriptTool) -> bool {
    raw_args
        .split_whitespace()
        .any(|token| token == format!("tool:{}", tool.id))
}

// ============================================================================
// SECTION: Input Coercion
// ============================================================================

/// Builds the input object from string bindings with schema-aware coercion.
#[must_use]
pub fn coerce_inputs(bindings: &BTreeMap<String, String>, schema: &Value) -> Value {
    let properties = schema.get("properties").and_then(Value::as_object);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut object = Map::new();
    for (key, raw) in bindings {
        let declared_type = properties
            .and_then(|props| props.get(key))
            .and_then(|prop| prop.get("type"))
            .and_then(Value::as_str);
        let structured = matches!(declared_type, Some("object" | "array"));

        // Empty strings bound to optional structured fields are dropped.
        if raw.is_empty() && structured && !required.contains(&key.as_str()) {
            continue;
        }

        let looks_like_json = raw.starts_with('[') || raw.starts_with('{');
        let value = if structured && looks_like_json {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        } else {
            coerce_scalar(raw, declared_type)
        };
        object.insert(key.clone(), value);
    }
    Value::Object(object)
}

/// Coerces a scalar string toward the declared schema type.
fn coerce_scalar(raw: &str, declared_type: Option<&str>) -> Value {
    match declared_type {
        Some("integer") => raw
            .parse::<i64>()
            .map_or_else(|_| Value::String(raw.to_string()), Value::from),
        Some("number") => raw
            .parse::<f64>()
            .map_or_else(|_| Value::String(raw.to_string()), Value::from),
        Some("boolean") => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates the whole input object against the schema.
fn validate_strict(schema: &Value, inputs: &Value) -> Result<(), String> {
    let compiled = jsonschema::validator_for(schema).map_err(|err| err.to_string())?;
    let mut errors = compiled.iter_errors(inputs);
    match errors.next() {
        None => Ok(()),
        Some(first) => Err(first.to_string()),
    }
}

/// Lax matching: at least one required property present, and every present
/// property valid against its own subschema.
fn lax_match(schema: &Value, inputs: &Value) -> bool {
    let Some(object) = inputs.as_object() else {
        return false;
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if !required.is_empty() && !required.iter().any(|name| object.contains_key(*name)) {
        return false;
    }
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return !object.is_empty();
    };
    if object.is_empty() {
        return required.is_empty();
    }
    for (key, value) in object {
        if let Some(subschema) = properties.get(key) {
            match jsonschema::validator_for(subschema) {
                Ok(compiled) => {
                    if !compiled.is_valid(value) {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }
    }
    true
}
