// crates/conductor-core/src/runtime/args.rs
// ============================================================================
// Module: Argument Extraction and Rendering
// Description: Raw argument tails, key:value extraction, template rendering.
// Purpose: Turn command argument text into template bindings.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! Argument tails carry `key:"quoted"` and `key:value` pairs plus optional
//! free text. Extraction is quote-aware; leftover free text binds to the
//! first declared argument that is still unbound, which keeps the common
//! one-argument prompt ergonomic. Template rendering substitutes `{{name}}`
//! placeholders for bound values and leaves unknown placeholders visible.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::interfaces::PromptArgument;

// ============================================================================
// SECTION: Argument Extraction
// ============================================================================

/// Extracts `key:"value"` and `key:value` pairs from a raw argument tail.
///
/// Returns the bound pairs and the leftover free text.
#[must_use]
pub fn extract_pairs(raw: &str) -> (BTreeMap<String, String>, String) {
    let chars: Vec<char> = raw.chars().collect();
    let mut pairs = BTreeMap::new();
    let mut leftover = String::new();
    let mut idx = 0;

    while idx < chars.len() {
        if chars[idx].is_whitespace() {
            idx += 1;
            continue;
        }
        let key_start = idx;
        while idx < chars.len() && (chars[idx].is_ascii_alphanumeric() || chars[idx] == '_') {
            idx += 1;
        }
        let key: String = chars[key_start..idx].iter().collect();
        if !key.is_empty() && chars.get(idx) == Some(&':') {
            idx += 1;
            let value = if chars.get(idx) == Some(&'"') {
                idx += 1;
                let mut out = String::new();
                while let Some(&ch) = chars.get(idx) {
                    idx += 1;
                    if ch == '\\' && chars.get(idx) == Some(&'"') {
                        out.push('"');
                        idx += 1;
                        continue;
                    }
                    if ch == '"' {
                        break;
                    }
                    out.push(ch);
                }
                out
            } else {
                let mut out = String::new();
                while let Some(&ch) = chars.get(idx) {
                    if ch.is_whitespace() {
                        break;
                    }
                    out.push(ch);
                    idx += 1;
                }
                out
            };
            pairs.insert(key, value);
            continue;
        }
        // Not a key:value pair; consume as free text up to the next space.
        idx = key_start;
        while idx < chars.len() && !chars[idx].is_whitespace() {
            leftover.push(chars[idx]);
            idx += 1;
        }
        leftover.push(' ');
    }

    (pairs, leftover.trim().to_string())
}

/// Builds the argument map for a step.
///
/// Pairs bind directly; leftover free text binds to the first declared
/// argument without a binding.
#[must_use]
pub fn bind_arguments(raw: &str, declared: &[PromptArgument]) -> BTreeMap<String, String> {
    let (mut pairs, leftover) = extract_pairs(raw);
    if !leftover.is_empty() {
        if let Some(open) = declared.iter().find(|arg| !pairs.contains_key(&arg.name)) {
            pairs.insert(open.name.clone(), leftover);
        }
    }
    pairs
}

// ============================================================================
// SECTION: Template Rendering
// ============================================================================

/// Substitutes `{{name}}` placeholders with bound values.
///
/// Unknown placeholders are left in place so the driver can see what is
/// missing; `{{ref:...}}` expansion is refused upstream by policy.
#[must_use]
pub fn render_template(template: &str, bindings: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match bindings.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(&after[..end]);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Returns the `{{ref:...}}` targets in a template.
#[must_use]
pub fn reference_targets(template: &str) -> Vec<String> {
    let mut targets = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let token = after[..end].trim();
                if let Some(target) = token.strip_prefix("ref:") {
                    targets.push(target.trim().to_string());
                }
                rest = &after[end + 2..];
            }
            None => break,
        }
    }
    targets
}
