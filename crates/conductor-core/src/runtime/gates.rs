// crates/conductor-core/src/runtime/gates.rs
// ============================================================================
// Module: Gate Evaluation
// Description: Activation, combined enforcement/retry, guidance, and verdicts.
// Purpose: Select active gates and interpret LLM verdicts deterministically.
// Dependencies: crate::core, crate::interfaces, regex
// ============================================================================

//! ## Overview
//! Gate evaluation has four concerns: selecting the active gate set for a
//! context, resolving the combined retry and enforcement policy across that
//! set, rendering guidance, and parsing verdict strings returned by the LLM.
//! Framework gates use AND-semantics across their category and framework
//! rules; all other gates block independently on each defined rule. All
//! string comparisons are case-insensitive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::EnforcementMode;
use crate::core::GateDefinition;
use crate::core::PassCriterion;
use crate::core::identifiers::CategoryId;
use crate::core::identifiers::FrameworkId;
use crate::core::identifiers::GateId;
use crate::interfaces::GateRegistry;
use crate::interfaces::RegistryError;

/// Maximum improvement hints taken from one failing gate.
const MAX_HINTS_PER_GATE: usize = 3;

/// Default attempt budget when the active set is empty.
const DEFAULT_MAX_ATTEMPTS: u32 = 2;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gate evaluation errors.
#[derive(Debug, Error)]
pub enum GateError {
    /// Verdict text matched no accepted form or lacked a rationale.
    #[error("invalid gate verdict: {0}")]
    InvalidVerdict(String),
    /// A pass criterion is misconfigured (for example a bad regex).
    #[error("invalid gate criterion: {0}")]
    InvalidCriteria(String),
    /// Gate catalog access failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ============================================================================
// SECTION: Activation
// ============================================================================

/// Context a gate is activated against.
#[derive(Debug, Clone, Default)]
pub struct GateContext {
    /// Prompt category.
    pub category: Option<CategoryId>,
    /// Active framework.
    pub framework: Option<FrameworkId>,
    /// Whether the caller explicitly requested gated review.
    pub explicit_request: bool,
}

/// Returns true when a gate applies to the context.
///
/// Framework gates AND their category and framework rules; absence of a rule
/// means unconstrained on that axis. Other gates block independently on each
/// defined rule. Gates flagged `explicit_request` require the context flag.
#[must_use]
pub fn gate_is_active(gate: &GateDefinition, ctx: &GateContext) -> bool {
    if gate.activation.explicit_request && !ctx.explicit_request {
        return false;
    }

    // Framework gates AND their two axes; other kinds block independently on
    // each defined rule. Both reduce to the same conjunction because an empty
    // rule list is unconstrained on its axis.
    let category_ok = gate.activation.categories.is_empty()
        || ctx
            .category
            .as_ref()
            .is_some_and(|category| {
                gate.activation.categories.iter().any(|rule| rule.matches(category))
            });
    let framework_ok = gate.activation.frameworks.is_empty()
        || ctx
            .framework
            .as_ref()
            .is_some_and(|framework| {
                gate.activation.frameworks.iter().any(|rule| rule.matches(framework))
            });

    category_ok && framework_ok
}

// ============================================================================
// SECTION: Combined Retry and Enforcement
// ============================================================================

/// Combined retry policy across an active gate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryResolution {
    /// Most restrictive attempt budget.
    pub max_attempts: u32,
    /// Whether any gate wants improvement hints.
    pub improvement_hints: bool,
    /// Whether any gate preserves earlier step context.
    pub preserve_context: bool,
}

/// Resolves the combined retry policy.
///
/// The budget is the minimum across gates (default 2 for an empty set); the
/// boolean knobs are ORed.
#[must_use]
pub fn resolve_retry(gates: &[GateDefinition]) -> RetryResolution {
    let max_attempts = gates
        .iter()
        .map(|gate| gate.retry.max_attempts)
        .min()
        .unwrap_or(DEFAULT_MAX_ATTEMPTS);
    RetryResolution {
        max_attempts,
        improvement_hints: gates.iter().any(|gate| gate.retry.improvement_hints),
        preserve_context: gates.iter().any(|gate| gate.retry.preserve_context),
    }
}

/// Resolves the combined enforcement mode.
///
/// The most restrictive member wins; an empty set defaults to blocking.
/// Resolution short-circuits once blocking is reached.
#[must_use]
pub fn resolve_enforcement(gates: &[GateDefinition]) -> EnforcementMode {
    let mut combined = EnforcementMode::Informational;
    let mut any = false;
    for gate in gates {
        any = true;
        combined = combined.most_restrictive(gate.effective_enforcement());
        if combined == EnforcementMode::Blocking {
            return EnforcementMode::Blocking;
        }
    }
    if any { combined } else { EnforcementMode::Blocking }
}

// ============================================================================
// SECTION: Guidance
// ============================================================================

/// Formats a criteria list as an ordered list.
///
/// An empty list yields an empty string.
#[must_use]
pub fn format_criteria(criteria: &[String]) -> String {
    criteria
        .iter()
        .enumerate()
        .map(|(idx, item)| format!("{}. {item}", idx + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds improvement hints from failing gates' guidance.
///
/// Guidance is split on newlines and bullet markers, capped at three hints
/// per gate.
#[must_use]
pub fn improvement_hints(gates: &[GateDefinition]) -> Vec<String> {
    let mut hints = Vec::new();
    for gate in gates {
        let Some(guidance) = &gate.guidance else {
            continue;
        };
        let mut taken = 0;
        for line in guidance.lines() {
            let cleaned = line.trim().trim_start_matches(['-', '*', '•']).trim();
            if cleaned.is_empty() {
                continue;
            }
            hints.push(format!("{}: {cleaned}", gate.name));
            taken += 1;
            if taken >= MAX_HINTS_PER_GATE {
                break;
            }
        }
    }
    hints
}

// ============================================================================
// SECTION: Verdict Parsing
// ============================================================================

/// Parsed gate verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Whether the verdict passed.
    pub passed: bool,
    /// Required rationale text.
    pub rationale: String,
    /// Original verdict string.
    pub raw_verdict: String,
}

/// Parses a verdict from the dedicated `gate_verdict` field.
///
/// Accepts `GATE_REVIEW: PASS|FAIL - rationale`, `GATE PASS|FAIL - rationale`,
/// `GATE_REVIEW: FAIL: rationale`, and the minimal `PASS|FAIL - rationale`
/// form. Matching is case-insensitive and the rationale is required.
///
/// # Errors
///
/// Returns [`GateError::InvalidVerdict`] on unknown forms or a missing
/// rationale.
pub fn parse_verdict_field(text: &str) -> Result<GateVerdict, GateError> {
    parse_verdict_inner(text, true)
}

/// Scans free-form step output for an explicit verdict.
///
/// Only the prefixed `GATE_REVIEW:` and `GATE ` forms are honored here; the
/// minimal form is never parsed out of free text.
#[must_use]
pub fn scan_verdict(text: &str) -> Option<GateVerdict> {
    let upper = text.to_uppercase();
    let start = upper.find("GATE_REVIEW:").or_else(|| {
        upper.find("GATE PASS").or_else(|| upper.find("GATE FAIL"))
    })?;
    let candidate = text[start..].lines().next()?;
    parse_verdict_inner(candidate, false).ok()
}

/// Shared verdict grammar.
fn parse_verdict_inner(text: &str, allow_minimal: bool) -> Result<GateVerdict, GateError> {
    let raw = text.trim().to_string();
    let upper = raw.to_uppercase();

    let body = if let Some(rest) = upper.strip_prefix("GATE_REVIEW:") {
        rest.trim_start().to_string()
    } else if let Some(rest) = upper.strip_prefix("GATE ") {
        rest.trim_start().to_string()
    } else if allow_minimal {
        upper.clone()
    } else {
        return Err(GateError::InvalidVerdict(raw));
    };

    let (passed, after) = if let Some(rest) = body.strip_prefix("PASS") {
        (true, rest)
    } else if let Some(rest) = body.strip_prefix("FAIL") {
        (false, rest)
    } else {
        return Err(GateError::InvalidVerdict(raw));
    };

    let rationale_upper = after.trim_start().trim_start_matches(['-', ':']).trim();
    if rationale_upper.is_empty() {
        return Err(GateError::InvalidVerdict(raw));
    }
    // Recover the original casing by slicing from the tail. Uppercasing can
    // change byte lengths outside ASCII, so fall back to the folded text when
    // the offset is not a char boundary.
    let offset = raw.len().saturating_sub(rationale_upper.len());
    let rationale = raw
        .get(offset..)
        .map_or_else(|| rationale_upper.to_string(), |tail| tail.trim().to_string());

    Ok(GateVerdict {
        passed,
        rationale,
        raw_verdict: raw,
    })
}

// ============================================================================
// SECTION: Criteria Evaluation
// ============================================================================

/// Evaluates server-side pass criteria against step output.
///
/// Content and pattern checks are evaluated here; self-check and methodology
/// criteria are asserted by the LLM verdict and treated as satisfied.
///
/// # Errors
///
/// Returns [`GateError::InvalidCriteria`] when a pattern fails to compile.
pub fn criteria_pass(gate: &GateDefinition, output: &str) -> Result<bool, GateError> {
    for criterion in &gate.pass_criteria {
        match criterion {
            PassCriterion::ContentCheck {
                min_length,
                max_length,
                patterns,
            } => {
                let length = output.chars().count();
                if min_length.is_some_and(|min| length < min) {
                    return Ok(false);
                }
                if max_length.is_some_and(|max| length > max) {
                    return Ok(false);
                }
                for pattern in patterns {
                    if !compile(pattern)?.is_match(output) {
                        return Ok(false);
                    }
                }
            }
            PassCriterion::PatternCheck {
                pattern,
                should_match,
            } => {
                if compile(pattern)?.is_match(output) != *should_match {
                    return Ok(false);
                }
            }
            PassCriterion::LlmSelfCheck {
                ..
            }
            | PassCriterion::MethodologyCompliance {
                ..
            } => {}
        }
    }
    Ok(true)
}

/// Compiles a criterion pattern.
fn compile(pattern: &str) -> Result<regex::Regex, GateError> {
    regex::Regex::new(pattern)
        .map_err(|err| GateError::InvalidCriteria(format!("pattern '{pattern}': {err}")))
}

// ============================================================================
// SECTION: Gate Evaluator
// ============================================================================

/// Registry-backed gate selection.
#[derive(Clone)]
pub struct GateEvaluator {
    /// Gate catalog.
    registry: Arc<dyn GateRegistry + Send + Sync>,
}

impl GateEvaluator {
    /// Creates an evaluator over a gate catalog.
    #[must_use]
    pub fn new(registry: Arc<dyn GateRegistry + Send + Sync>) -> Self {
        Self {
            registry,
        }
    }

    /// Returns the active gates for a context.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Registry`] when the catalog cannot be read.
    pub fn active_gates(&self, ctx: &GateContext) -> Result<Vec<GateDefinition>, GateError> {
        Ok(self
            .registry
            .list()?
            .into_iter()
            .filter(|gate| gate_is_active(gate, ctx))
            .collect())
    }

    /// Resolves one gate token: a registered id, or a quick gate built from
    /// the token as criteria text.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Registry`] when the catalog cannot be read.
    pub fn resolve_token(&self, token: &str) -> Result<GateDefinition, GateError> {
        let candidate = GateId::new(token.trim().to_lowercase().replace(' ', "-"));
        if let Some(definition) = self.registry.get(&candidate)? {
            return Ok(definition);
        }
        Ok(GateDefinition::quick(token, token))
    }

    /// Returns definitions for the given ids, skipping unknown entries.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Registry`] when the catalog cannot be read.
    pub fn definitions(&self, ids: &[GateId]) -> Result<Vec<GateDefinition>, GateError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(definition) = self.registry.get(id)? {
                out.push(definition);
            }
        }
        Ok(out)
    }
}
