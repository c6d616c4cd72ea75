// crates/conductor-core/src/core/gates.rs
// ============================================================================
// Module: Conductor Gate Definitions
// Description: Gate definition records, severities, enforcement, and criteria.
// Purpose: Model validation and guidance policies evaluated at step boundaries.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! Gate definitions are authored on disk and consumed through the
//! [`crate::interfaces::GateRegistry`] trait. The records here carry the full
//! schema: severity with its default enforcement mapping, pass criteria,
//! activation rules, and retry configuration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CategoryId;
use crate::core::identifiers::FrameworkId;
use crate::core::identifiers::GateId;

// ============================================================================
// SECTION: Severity and Enforcement
// ============================================================================

/// Gate severity used to derive the default enforcement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateSeverity {
    /// Must hold; blocks by default.
    Critical,
    /// Should hold; advisory by default.
    High,
    /// Should hold; advisory by default.
    Medium,
    /// Informational by default.
    Low,
}

impl GateSeverity {
    /// Returns the default enforcement mode for this severity.
    #[must_use]
    pub const fn default_enforcement(self) -> EnforcementMode {
        match self {
            Self::Critical => EnforcementMode::Blocking,
            Self::High | Self::Medium => EnforcementMode::Advisory,
            Self::Low => EnforcementMode::Informational,
        }
    }
}

/// Gate enforcement mode.
///
/// # Invariants
/// - Restrictiveness order is `Blocking > Advisory > Informational`; combined
///   enforcement takes the most restrictive member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Failing verdicts pause the run for review.
    Blocking,
    /// Failing verdicts surface feedback but do not pause.
    Advisory,
    /// Verdicts are recorded only.
    Informational,
}

impl EnforcementMode {
    /// Returns a rank where a larger value is more restrictive.
    #[must_use]
    pub const fn restrictiveness(self) -> u8 {
        match self {
            Self::Blocking => 2,
            Self::Advisory => 1,
            Self::Informational => 0,
        }
    }

    /// Returns the more restrictive of two modes.
    #[must_use]
    pub const fn most_restrictive(self, other: Self) -> Self {
        if self.restrictiveness() >= other.restrictiveness() { self } else { other }
    }
}

// ============================================================================
// SECTION: Gate Classification
// ============================================================================

/// Gate policy type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateType {
    /// Pass/fail validation evaluated from a verdict.
    Validation,
    /// Guidance injected into step rendering.
    Guidance,
}

/// Gate origin classification controlling activation semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// Framework-scoped gate; category and framework rules are ANDed.
    Framework,
    /// Category-scoped gate; each defined rule blocks independently.
    Category,
    /// Custom gate; each defined rule blocks independently.
    Custom,
}

// ============================================================================
// SECTION: Pass Criteria
// ============================================================================

/// One pass criterion evaluated for a gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PassCriterion {
    /// Length and pattern constraints over the step output.
    ContentCheck {
        /// Minimum output length in characters.
        #[serde(default)]
        min_length: Option<usize>,
        /// Maximum output length in characters.
        #[serde(default)]
        max_length: Option<usize>,
        /// Regex patterns the output must contain.
        #[serde(default)]
        patterns: Vec<String>,
    },
    /// Single pattern constraint with polarity.
    PatternCheck {
        /// Regex pattern to test.
        pattern: String,
        /// Whether a match is required (`true`) or forbidden (`false`).
        #[serde(default = "default_should_match")]
        should_match: bool,
    },
    /// LLM self-review against a prompt template.
    LlmSelfCheck {
        /// Review prompt template.
        prompt: String,
        /// Minimum self-reported score in `[0, 1]`.
        threshold: f64,
    },
    /// Framework methodology compliance scoring.
    MethodologyCompliance {
        /// Framework whose methodology applies.
        framework: FrameworkId,
        /// Minimum compliance score in `[0, 1]`.
        threshold: f64,
    },
}

/// Default polarity for pattern checks.
const fn default_should_match() -> bool {
    true
}

// ============================================================================
// SECTION: Activation and Retry
// ============================================================================

/// Activation rules deciding whether a gate applies to a context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRules {
    /// Prompt categories the gate applies to; empty means unconstrained.
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    /// Framework contexts the gate applies to; empty means unconstrained.
    #[serde(default)]
    pub frameworks: Vec<FrameworkId>,
    /// Whether the gate requires an explicit request in the context.
    #[serde(default)]
    pub explicit_request: bool,
}

/// Retry configuration for a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum verdict attempts before the run requires a gate action.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Whether retries carry improvement hints built from guidance.
    #[serde(default = "default_true")]
    pub improvement_hints: bool,
    /// Whether earlier step context is preserved across retries.
    #[serde(default)]
    pub preserve_context: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            improvement_hints: default_true(),
            preserve_context: false,
        }
    }
}

/// Default maximum verdict attempts.
const fn default_max_attempts() -> u32 {
    2
}

/// Default for boolean fields that start enabled.
const fn default_true() -> bool {
    true
}

// ============================================================================
// SECTION: Quick Gates
// ============================================================================

/// Caller-supplied quick gate in an execute request.
///
/// Quick gates expand to full definitions with medium severity, validation
/// type, and execution scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickGateSpec {
    /// Gate name; doubles as the gate id.
    pub name: String,
    /// Criteria description rendered as guidance.
    pub description: String,
    /// 1-based steps the gate targets; empty applies chain-wide.
    #[serde(default)]
    pub apply_to_steps: Vec<usize>,
}

// ============================================================================
// SECTION: Gate Definition
// ============================================================================

/// Full gate definition record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDefinition {
    /// Gate identifier.
    pub id: GateId,
    /// Human-readable gate name.
    pub name: String,
    /// Gate policy type.
    #[serde(rename = "type")]
    pub gate_type: GateType,
    /// Gate severity.
    pub severity: GateSeverity,
    /// Optional enforcement override; wins over the severity mapping.
    #[serde(default)]
    pub enforcement: Option<EnforcementMode>,
    /// Guidance text rendered into step content.
    #[serde(default)]
    pub guidance: Option<String>,
    /// Pass criteria evaluated for verdicts.
    #[serde(default)]
    pub pass_criteria: Vec<PassCriterion>,
    /// Activation rules.
    #[serde(default)]
    pub activation: ActivationRules,
    /// Retry configuration.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Gate origin classification.
    #[serde(default = "default_gate_kind")]
    pub kind: GateKind,
}

/// Default gate origin for records that omit the field.
const fn default_gate_kind() -> GateKind {
    GateKind::Custom
}

impl GateDefinition {
    /// Returns the effective enforcement mode (override wins).
    #[must_use]
    pub fn effective_enforcement(&self) -> EnforcementMode {
        self.enforcement.unwrap_or_else(|| self.severity.default_enforcement())
    }

    /// Builds a gate from a caller-supplied quick spec.
    #[must_use]
    pub fn from_quick_spec(spec: &QuickGateSpec) -> Self {
        Self::quick(&spec.name, &spec.description)
    }

    /// Builds a user-supplied quick gate from a name/description pair.
    ///
    /// Quick gates default to medium severity and validation type, and carry
    /// their description as guidance.
    #[must_use]
    pub fn quick(name: &str, description: &str) -> Self {
        Self {
            id: GateId::new(name),
            name: name.to_string(),
            gate_type: GateType::Validation,
            severity: GateSeverity::Medium,
            enforcement: None,
            guidance: Some(description.to_string()),
            pass_criteria: Vec::new(),
            activation: ActivationRules::default(),
            retry: RetryConfig::default(),
            kind: GateKind::Custom,
        }
    }
}
