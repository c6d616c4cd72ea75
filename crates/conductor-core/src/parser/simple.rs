// crates/conductor-core/src/parser/simple.rs
// ============================================================================
// Module: Simple Parse Strategy
// Description: Single `>>id args` / `/id args` commands.
// Purpose: Parse operator-free commands with id normalization warnings.
// Dependencies: crate::core::command, crate::parser
// ============================================================================

//! ## Overview
//! The simple strategy handles the common case: one prompt reference with an
//! argument tail and no operators. Identifier normalization (lowercase,
//! separator folding) surfaces as a warning so callers see renames.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::command::CommandStep;
use crate::core::identifiers::PromptId;
use crate::parser::ParseError;

// ============================================================================
// SECTION: Applicability
// ============================================================================

/// Returns true when the input starts with a step prefix.
#[must_use]
pub(crate) fn applies(input: &str) -> bool {
    let trimmed = input.trim_start();
    trimmed.starts_with(">>") || trimmed.starts_with('/')
}

// ============================================================================
// SECTION: Simple Parse
// ============================================================================

/// Parses a `>>id args` or `/id args` command.
///
/// # Errors
///
/// Returns [`ParseError::EmptyStepId`] when the prefix carries no id.
pub(crate) fn parse(input: &str, warnings: &mut Vec<String>) -> Result<CommandStep, ParseError> {
    let trimmed = input.trim();
    let after_prefix = trimmed
        .strip_prefix(">>")
        .or_else(|| trimmed.strip_prefix('/'))
        .ok_or_else(|| ParseError::MalformedStep(trimmed.to_string()))?;
    let after_prefix = after_prefix.trim_start();
    let raw_id: String =
        after_prefix.chars().take_while(|ch| !ch.is_whitespace()).collect();
    if raw_id.is_empty() {
        return Err(ParseError::EmptyStepId);
    }
    let prompt_id = PromptId::normalize(&raw_id);
    if prompt_id.as_str().is_empty() {
        return Err(ParseError::EmptyStepId);
    }
    if prompt_id.as_str() != raw_id {
        warnings.push(format!("prompt id '{raw_id}' normalized to '{prompt_id}'"));
    }
    let raw_args = after_prefix[raw_id.len()..].trim().to_string();
    Ok(CommandStep {
        prompt_id,
        raw_args,
    })
}
