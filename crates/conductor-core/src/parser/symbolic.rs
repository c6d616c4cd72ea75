// crates/conductor-core/src/parser/symbolic.rs
// ============================================================================
// Module: Symbolic Parse Strategy
// Description: Full operator grammar with quote-aware scanning.
// Purpose: Parse chains, gates, frameworks, styles, and conditionals.
// Dependencies: crate::core::command, crate::parser
// ============================================================================

//! ## Overview
//! The symbolic strategy recognizes the whole command grammar:
//! `[@FRAMEWORK] [#style] >>id args (--> >>id args)* (:: value)* [? "c" : b]`.
//! Every scan tracks double-quote state with `\"` escapes so operators inside
//! quoted arguments are left alone. Operators are extracted globally and apply
//! to the whole command; the residue is split into steps which must each begin
//! with `>>id` or `/id`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::command::CommandStep;
use crate::core::command::Operator;
use crate::core::identifiers::FrameworkId;
use crate::core::identifiers::PromptId;
use crate::core::identifiers::StyleId;
use crate::parser::ParseError;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Result of a symbolic parse before prompt-id validation.
#[derive(Debug)]
pub(crate) struct SymbolicOutcome {
    /// Ordered command steps.
    pub steps: Vec<CommandStep>,
    /// Operators observed across the whole command.
    pub operators: Vec<Operator>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
    /// Whether a chain operator was observed.
    pub chain: bool,
}

// ============================================================================
// SECTION: Applicability
// ============================================================================

/// Returns true when the input carries symbolic operator markers outside
/// quoted strings.
#[must_use]
pub(crate) fn applies(input: &str) -> bool {
    let chars: Vec<char> = input.chars().collect();
    let mut in_quotes = false;
    let mut previous = ' ';
    for (idx, &ch) in chars.iter().enumerate() {
        if ch == '"' && previous != '\\' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            match ch {
                '@' | '#' => return true,
                // A conditional needs a quoted condition right after the '?'.
                '?' if chars[idx + 1..]
                    .iter()
                    .find(|c| !c.is_whitespace())
                    .is_some_and(|c| *c == '"') =>
                {
                    return true;
                }
                ':' if chars.get(idx + 1) == Some(&':') => return true,
                '-' if chars.get(idx + 1) == Some(&'-') && chars.get(idx + 2) == Some(&'>') => {
                    return true;
                }
                '+' if previous.is_whitespace() && followed_by_step(&chars, idx + 1) => {
                    return true;
                }
                '=' if previous.is_whitespace() => return true,
                _ => {}
            }
        }
        previous = ch;
    }
    false
}

// ============================================================================
// SECTION: Symbolic Parse
// ============================================================================

/// Parses a normalized command with the symbolic grammar.
///
/// # Errors
///
/// Returns [`ParseError`] on malformed conditionals, steps without a
/// `>>`/`/` prefix, or empty step ids.
pub(crate) fn parse(input: &str) -> Result<SymbolicOutcome, ParseError> {
    let mut operators = Vec::new();
    let mut warnings = Vec::new();

    let text = extract_conditional(input, &mut operators)?;
    let text = extract_gates(&text, &mut operators);
    let text = extract_frameworks(&text, &mut operators, &mut warnings);
    let text = extract_styles(&text, &mut operators, &mut warnings);

    let (chain_parts, chain) = split_outside_quotes(&text, "-->");
    if chain {
        operators.push(Operator::Chain);
    }

    let mut step_texts = Vec::new();
    let mut parallel = false;
    for part in chain_parts {
        let (parallel_parts, split) = split_parallel(&part);
        parallel = parallel || split;
        step_texts.extend(parallel_parts);
    }
    if parallel {
        operators.push(Operator::Parallel);
    }

    let mut steps = Vec::new();
    for step_text in step_texts {
        steps.push(parse_step(&step_text, &mut warnings)?);
    }
    if steps.is_empty() {
        return Err(ParseError::MalformedStep(input.trim().to_string()));
    }

    Ok(SymbolicOutcome {
        steps,
        operators,
        warnings,
        chain,
    })
}

// ============================================================================
// SECTION: Conditional Extraction
// ============================================================================

/// Extracts a trailing `? "condition" : branch` construct.
fn extract_conditional(input: &str, operators: &mut Vec<Operator>) -> Result<String, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut in_quotes = false;
    let mut previous = ' ';
    for (idx, &ch) in chars.iter().enumerate() {
        if ch == '"' && previous != '\\' {
            in_quotes = !in_quotes;
            previous = ch;
            continue;
        }
        if ch == '?' && !in_quotes {
            let mut cursor = idx + 1;
            skip_whitespace(&chars, &mut cursor);
            // A bare '?' with no quoted condition is ordinary argument text.
            let Some(condition) = read_quoted(&chars, &mut cursor) else {
                previous = ch;
                continue;
            };
            skip_whitespace(&chars, &mut cursor);
            if chars.get(cursor) != Some(&':') {
                return Err(ParseError::MalformedConditional(input.trim().to_string()));
            }
            cursor += 1;
            skip_whitespace(&chars, &mut cursor);
            let branch = read_bare_token(&chars, &mut cursor);
            if branch.is_empty() {
                return Err(ParseError::MalformedConditional(input.trim().to_string()));
            }
            operators.push(Operator::Conditional {
                condition,
                branch,
            });
            let mut remainder: String = chars[..idx].iter().collect();
            remainder.push_str(&chars[cursor..].iter().collect::<String>());
            return Ok(remainder);
        }
        previous = ch;
    }
    Ok(input.to_string())
}

// ============================================================================
// SECTION: Gate Extraction
// ============================================================================

/// Extracts every `:: value` and standalone `= value` gate operator.
fn extract_gates(input: &str, operators: &mut Vec<Operator>) -> String {
    let mut text = input.to_string();
    loop {
        let chars: Vec<char> = text.chars().collect();
        let mut in_quotes = false;
        let mut previous = ' ';
        let mut found = None;
        for (idx, &ch) in chars.iter().enumerate() {
            if ch == '"' && previous != '\\' {
                in_quotes = !in_quotes;
                previous = ch;
                continue;
            }
            if !in_quotes {
                let double_colon = ch == ':' && chars.get(idx + 1) == Some(&':');
                let standalone_eq = ch == '='
                    && previous.is_whitespace()
                    && chars.get(idx + 1).is_none_or(|c| *c != '=');
                if double_colon || standalone_eq {
                    let mut cursor = idx + if double_colon { 2 } else { 1 };
                    skip_whitespace(&chars, &mut cursor);
                    let value = read_quoted(&chars, &mut cursor)
                        .unwrap_or_else(|| read_bare_token(&chars, &mut cursor));
                    found = Some((idx, cursor, value));
                    break;
                }
            }
            previous = ch;
        }
        match found {
            Some((start, end, value)) => {
                if !value.is_empty() {
                    operators.push(Operator::Gate {
                        value,
                    });
                }
                let mut next: String = chars[..start].iter().collect();
                next.push(' ');
                next.push_str(&chars[end..].iter().collect::<String>());
                text = next;
            }
            None => return text,
        }
    }
}

// ============================================================================
// SECTION: Framework Extraction
// ============================================================================

/// Extracts every `@ID` framework operator.
fn extract_frameworks(
    input: &str,
    operators: &mut Vec<Operator>,
    warnings: &mut Vec<String>,
) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_quotes = false;
    let mut previous = ' ';
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        if ch == '"' && previous != '\\' {
            in_quotes = !in_quotes;
            out.push(ch);
            previous = ch;
            idx += 1;
            continue;
        }
        if ch == '@' && !in_quotes {
            let mut cursor = idx + 1;
            let id = read_id_token(&chars, &mut cursor);
            if id.is_empty() {
                warnings.push("dangling @ with no framework id".to_string());
            } else {
                operators.push(Operator::Framework {
                    id: FrameworkId::normalize(&id),
                });
            }
            previous = ' ';
            idx = cursor;
            continue;
        }
        out.push(ch);
        previous = ch;
        idx += 1;
    }
    out
}

// ============================================================================
// SECTION: Style Extraction
// ============================================================================

/// Extracts `#name`, `#style(name)`, and `#style:name` selectors.
fn extract_styles(
    input: &str,
    operators: &mut Vec<Operator>,
    warnings: &mut Vec<String>,
) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_quotes = false;
    let mut previous = ' ';
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        if ch == '"' && previous != '\\' {
            in_quotes = !in_quotes;
            out.push(ch);
            previous = ch;
            idx += 1;
            continue;
        }
        if ch == '#' && !in_quotes {
            let mut cursor = idx + 1;
            let head = read_id_token(&chars, &mut cursor);
            let id = if head == "style" {
                match chars.get(cursor) {
                    Some('(') => {
                        cursor += 1;
                        let inner = read_until(&chars, &mut cursor, ')');
                        if chars.get(cursor) == Some(&')') {
                            cursor += 1;
                        }
                        inner
                    }
                    Some(':') => {
                        cursor += 1;
                        read_id_token(&chars, &mut cursor)
                    }
                    _ => head,
                }
            } else {
                head
            };
            if id.is_empty() {
                warnings.push("dangling # with no style name".to_string());
            } else {
                operators.push(Operator::Style {
                    id: StyleId::new(id),
                });
            }
            previous = ' ';
            idx = cursor;
            continue;
        }
        out.push(ch);
        previous = ch;
        idx += 1;
    }
    out
}

// ============================================================================
// SECTION: Step Splitting
// ============================================================================

/// Splits the input on a separator, respecting quoted strings.
///
/// Returns the parts and whether the separator occurred.
fn split_outside_quotes(input: &str, separator: &str) -> (Vec<String>, bool) {
    let chars: Vec<char> = input.chars().collect();
    let sep: Vec<char> = separator.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut previous = ' ';
    let mut idx = 0;
    let mut split = false;
    while idx < chars.len() {
        let ch = chars[idx];
        if ch == '"' && previous != '\\' {
            in_quotes = !in_quotes;
            current.push(ch);
            previous = ch;
            idx += 1;
            continue;
        }
        if !in_quotes && chars[idx..].starts_with(&sep[..]) {
            parts.push(current.trim().to_string());
            current = String::new();
            previous = ' ';
            idx += sep.len();
            split = true;
            continue;
        }
        current.push(ch);
        previous = ch;
        idx += 1;
    }
    parts.push(current.trim().to_string());
    (parts.into_iter().filter(|part| !part.is_empty()).collect(), split)
}

/// Splits one chain part on standalone `+` tokens.
fn split_parallel(input: &str) -> (Vec<String>, bool) {
    let chars: Vec<char> = input.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut previous = ' ';
    let mut split = false;
    for (idx, &ch) in chars.iter().enumerate() {
        if ch == '"' && previous != '\\' {
            in_quotes = !in_quotes;
            current.push(ch);
            previous = ch;
            continue;
        }
        let standalone = ch == '+'
            && !in_quotes
            && previous.is_whitespace()
            && followed_by_step(&chars, idx + 1);
        if standalone {
            parts.push(current.trim().to_string());
            current = String::new();
            previous = ' ';
            split = true;
            continue;
        }
        current.push(ch);
        previous = ch;
    }
    parts.push(current.trim().to_string());
    (parts.into_iter().filter(|part| !part.is_empty()).collect(), split)
}

/// Parses one `>>id args` or `/id args` step.
fn parse_step(step_text: &str, warnings: &mut Vec<String>) -> Result<CommandStep, ParseError> {
    let trimmed = step_text.trim();
    let after_prefix = trimmed
        .strip_prefix(">>")
        .or_else(|| trimmed.strip_prefix('/'))
        .ok_or_else(|| ParseError::MalformedStep(trimmed.to_string()))?;
    let after_prefix = after_prefix.trim_start();
    let raw_id: String = after_prefix
        .chars()
        .take_while(|ch| !ch.is_whitespace())
        .collect();
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

// ============================================================================
// SECTION: Scan Helpers
// ============================================================================

/// Returns true when the next non-whitespace text begins a step.
///
/// Keeps a bare `+` inside argument text from being read as the parallel
/// operator.
fn followed_by_step(chars: &[char], from: usize) -> bool {
    let mut cursor = from;
    while chars.get(cursor).is_some_and(|ch| ch.is_whitespace()) {
        cursor += 1;
    }
    match chars.get(cursor) {
        Some('>') => chars.get(cursor + 1) == Some(&'>'),
        Some('/') => true,
        _ => false,
    }
}

/// Advances the cursor past whitespace.
fn skip_whitespace(chars: &[char], cursor: &mut usize) {
    while chars.get(*cursor).is_some_and(|ch| ch.is_whitespace()) {
        *cursor += 1;
    }
}

/// Reads a quoted string at the cursor, honoring `\"` escapes.
fn read_quoted(chars: &[char], cursor: &mut usize) -> Option<String> {
    if chars.get(*cursor) != Some(&'"') {
        return None;
    }
    *cursor += 1;
    let mut out = String::new();
    while let Some(&ch) = chars.get(*cursor) {
        *cursor += 1;
        if ch == '\\' && chars.get(*cursor) == Some(&'"') {
            out.push('"');
            *cursor += 1;
            continue;
        }
        if ch == '"' {
            return Some(out);
        }
        out.push(ch);
    }
    Some(out)
}

/// Reads a bare token up to whitespace.
fn read_bare_token(chars: &[char], cursor: &mut usize) -> String {
    let mut out = String::new();
    while let Some(&ch) = chars.get(*cursor) {
        if ch.is_whitespace() {
            break;
        }
        out.push(ch);
        *cursor += 1;
    }
    out
}

/// Reads an identifier token of `[A-Za-z0-9_-]` characters.
fn read_id_token(chars: &[char], cursor: &mut usize) -> String {
    let mut out = String::new();
    while let Some(&ch) = chars.get(*cursor) {
        if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '-') {
            break;
        }
        out.push(ch);
        *cursor += 1;
    }
    out
}

/// Reads characters until the terminator.
fn read_until(chars: &[char], cursor: &mut usize, terminator: char) -> String {
    let mut out = String::new();
    while let Some(&ch) = chars.get(*cursor) {
        if ch == terminator {
            break;
        }
        out.push(ch);
        *cursor += 1;
    }
    out
}
