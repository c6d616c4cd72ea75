// crates/conductor-core/src/parser/suggest.rs
// ============================================================================
// Module: Prompt Suggestions
// Description: Levenshtein-ranked suggestions for unknown prompt ids.
// Purpose: Turn typos into actionable error messages.
// Dependencies: strsim
// ============================================================================

//! ## Overview
//! Unknown prompt ids are ranked against the available catalog by edit
//! distance. At most three suggestions within distance three are returned,
//! closest first, with ties broken alphabetically for stable output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::PromptId;

/// Maximum edit distance considered a plausible typo.
const MAX_DISTANCE: usize = 3;

/// Maximum number of suggestions returned.
const MAX_SUGGESTIONS: usize = 3;

/// Built-in commands routed before the parser.
pub const BUILTIN_COMMANDS: &[&str] = &["help", "status", "listprompts"];

// ============================================================================
// SECTION: Suggestion Ranking
// ============================================================================

/// Returns up to three known ids within edit distance three of `unknown`.
#[must_use]
pub(crate) fn rank(unknown: &str, available: &[PromptId]) -> Vec<String> {
    let mut scored: Vec<(usize, &str)> = available
        .iter()
        .map(|id| (strsim::levenshtein(unknown, id.as_str()), id.as_str()))
        .filter(|(distance, _)| *distance <= MAX_DISTANCE)
        .collect();
    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().take(MAX_SUGGESTIONS).map(|(_, id)| id.to_string()).collect()
}

/// Returns a built-in command hint when the unknown id is close to one.
#[must_use]
pub(crate) fn builtin_hint(unknown: &str) -> Option<String> {
    BUILTIN_COMMANDS
        .iter()
        .find(|builtin| strsim::levenshtein(unknown, builtin) <= 1)
        .map(|builtin| format!("did you mean the built-in command '{builtin}'?"))
}
