// crates/conductor-core/src/parser/normalize.rs
// ============================================================================
// Module: Command Pre-Processing
// Description: Prefix repair and modifier extraction before strategy dispatch.
// Purpose: Give every strategy the same canonicalized input.
// Dependencies: crate::core::command
// ============================================================================

//! ## Overview
//! The normalizer runs once, before any parse strategy. It repairs stray `>>`
//! markers that commonly leak in from copy-pasted chains, and extracts the
//! single leading `%modifier`. A second modifier anywhere in the command is a
//! hard error rather than a silent drop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::command::Modifier;
use crate::parser::ParseError;

// ============================================================================
// SECTION: Prefix Normalization
// ============================================================================

/// Repairs stray `>>` markers.
///
/// Duplicated step prefixes after `-->`, `+`, or a conditional `:` collapse
/// to a single `>>`, and a `>>` directly before `@` is dropped because the
/// framework operator is not a step. Returns the repaired string and whether
/// anything changed.
#[must_use]
pub fn normalize_prefixes(command: &str) -> (String, bool) {
    let mut out = String::with_capacity(command.len());
    let mut chars = command.chars().peekable();
    let mut in_quotes = false;
    let mut changed = false;

    while let Some(ch) = chars.next() {
        if ch == '"' && !out.ends_with('\\') {
            in_quotes = !in_quotes;
            out.push(ch);
            continue;
        }
        if in_quotes {
            out.push(ch);
            continue;
        }
        if ch == '>' && chars.peek() == Some(&'>') {
            chars.next();
            // Collapse immediately repeated step markers.
            loop {
                let mut lookahead = chars.clone();
                while lookahead.peek().is_some_and(|c| c.is_whitespace()) {
                    lookahead.next();
                }
                if lookahead.peek() == Some(&'>') {
                    lookahead.next();
                    if lookahead.peek() == Some(&'>') {
                        lookahead.next();
                        chars = lookahead;
                        changed = true;
                        continue;
                    }
                }
                break;
            }
            // A step marker directly before a framework operator is stray.
            let mut lookahead = chars.clone();
            while lookahead.peek().is_some_and(|c| c.is_whitespace()) {
                lookahead.next();
            }
            if lookahead.peek() == Some(&'@') {
                chars = lookahead;
                changed = true;
                continue;
            }
            out.push('>');
            out.push('>');
            continue;
        }
        out.push(ch);
    }

    (out, changed)
}

// ============================================================================
// SECTION: Modifier Extraction
// ============================================================================

/// Extracts the single leading `%modifier`.
///
/// Returns the modifier (when present) and the command remainder. A second
/// modifier token anywhere outside quotes fails with
/// [`ParseError::DuplicateModifier`]; an unknown `%name` at the head fails
/// with [`ParseError::InvalidModifier`].
///
/// # Errors
///
/// Returns [`ParseError`] on duplicate or unknown modifiers.
pub fn extract_modifier(command: &str) -> Result<(Option<Modifier>, String), ParseError> {
    let trimmed = command.trim();
    let (modifier, rest) = match trimmed.strip_prefix('%') {
        Some(after) => {
            let name: String =
                after.chars().take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_').collect();
            let modifier = Modifier::parse(&name)
                .ok_or_else(|| ParseError::InvalidModifier(name.clone()))?;
            let rest = after[name.len()..].trim_start().to_string();
            (Some(modifier), rest)
        }
        None => (None, trimmed.to_string()),
    };

    if let Some(second) = find_modifier_token(&rest) {
        let first = modifier.map_or_else(|| second.clone(), |m| m.as_str().to_string());
        return Err(ParseError::DuplicateModifier {
            first,
            second,
        });
    }

    Ok((modifier, rest))
}

/// Finds a `%modifier` token outside quoted strings.
fn find_modifier_token(input: &str) -> Option<String> {
    let mut in_quotes = false;
    let mut previous = ' ';
    let chars: Vec<char> = input.chars().collect();
    for (idx, &ch) in chars.iter().enumerate() {
        if ch == '"' && previous != '\\' {
            in_quotes = !in_quotes;
        } else if ch == '%' && !in_quotes && previous.is_whitespace() {
            let name: String = chars[idx + 1..]
                .iter()
                .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                .collect();
            if Modifier::parse(&name).is_some() {
                return Some(name);
            }
        }
        previous = ch;
    }
    None
}
