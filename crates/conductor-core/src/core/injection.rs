// crates/conductor-core/src/core/injection.rs
// ============================================================================
// Module: Conductor Injection Model
// Description: Injection types, decisions, configs, and runtime overrides.
// Purpose: Model the single-source-of-truth injection decision data.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Injection decisions control whether system-prompt, gate-guidance, or
//! style-guidance content is added to a rendered step. The decision records
//! here always mean what they say: `inject: true` injects, and no caller
//! inverts the boolean.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::CategoryId;
use crate::core::identifiers::FrameworkId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Injection Types
// ============================================================================

/// Content class subject to injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionType {
    /// Framework/system prompt content.
    SystemPrompt,
    /// Gate guidance content.
    GateGuidance,
    /// Style guidance content.
    StyleGuidance,
}

impl InjectionType {
    /// All injection types in decision order.
    pub const ALL: [Self; 3] = [Self::SystemPrompt, Self::GateGuidance, Self::StyleGuidance];

    /// Returns the stable label for the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SystemPrompt => "system_prompt",
            Self::GateGuidance => "gate_guidance",
            Self::StyleGuidance => "style_guidance",
        }
    }
}

/// Origin of an injection decision, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionSource {
    /// Command modifier (highest priority).
    Modifier,
    /// Runtime override.
    RuntimeOverride,
    /// Step-level configuration.
    Step,
    /// Chain-level configuration.
    Chain,
    /// Category-level configuration.
    Category,
    /// Global configuration.
    Global,
    /// Built-in default (lowest priority).
    Default,
}

/// Where an injection applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionTarget {
    /// Step rendering only.
    Steps,
    /// Gate review rendering only.
    Gates,
    /// Both phases.
    #[default]
    Both,
}

/// Execution phase an injection decision is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    /// Regular step emission.
    Step,
    /// Gate review emission.
    GateReview,
}

impl InjectionTarget {
    /// Returns true when the target covers the given phase.
    #[must_use]
    pub const fn covers(self, phase: ExecutionPhase) -> bool {
        match self {
            Self::Both => true,
            Self::Steps => matches!(phase, ExecutionPhase::Step),
            Self::Gates => matches!(phase, ExecutionPhase::GateReview),
        }
    }

    /// Returns the stable label for the target.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Steps => "steps",
            Self::Gates => "gates",
            Self::Both => "both",
        }
    }
}

impl ExecutionPhase {
    /// Returns the stable label for the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::GateReview => "gate_review",
        }
    }
}

// ============================================================================
// SECTION: Injection Decision
// ============================================================================

/// Resolved injection decision.
///
/// # Invariants
/// - `inject` is never semantically inverted by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionDecision {
    /// Whether to inject.
    pub inject: bool,
    /// Human-readable resolution reason.
    pub reason: String,
    /// Decision origin.
    pub source: InjectionSource,
    /// Phase coverage of the resolved configuration.
    pub target: InjectionTarget,
    /// When the decision was computed.
    pub decided_at: Timestamp,
}

// ============================================================================
// SECTION: Frequency Rules
// ============================================================================

/// Injection frequency for multi-step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "k", rename_all = "snake_case")]
pub enum FrequencyRule {
    /// Never inject on any step.
    Never,
    /// Inject on step 1 only.
    FirstOnly,
    /// Inject on step 1, then when `(step - 1) % k == 0`.
    Every(u32),
}

impl FrequencyRule {
    /// Returns true when the rule allows injection at the 1-based step.
    #[must_use]
    pub const fn allows(self, step: usize) -> bool {
        match self {
            Self::Never => false,
            Self::FirstOnly => step == 1,
            Self::Every(k) => {
                if step == 1 {
                    true
                } else if k == 0 {
                    false
                } else {
                    // Widening casts only; const fns cannot use From.
                    (step as u64 - 1) % (k as u64) == 0
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Injection Configuration
// ============================================================================

/// Outcome of a matching `when` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhenOutcome {
    /// Inject regardless of the config's base flag.
    Inject,
    /// Skip regardless of the config's base flag.
    Skip,
    /// Fall through to the next resolution level.
    Inherit,
}

/// Conditional rule evaluated against the execution context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhenRule {
    /// Framework the context must carry for the rule to match.
    #[serde(default)]
    pub framework: Option<FrameworkId>,
    /// Category the context must carry for the rule to match.
    #[serde(default)]
    pub category: Option<CategoryId>,
    /// Outcome applied when the rule matches.
    pub outcome: WhenOutcome,
}

/// Injection configuration at one hierarchy level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionConfig {
    /// Base inject flag.
    pub inject: bool,
    /// Phase coverage.
    #[serde(default)]
    pub target: InjectionTarget,
    /// Frequency rule for multi-step runs.
    #[serde(default = "default_frequency")]
    pub frequency: FrequencyRule,
    /// Conditional rules, first match wins.
    #[serde(default)]
    pub when: Vec<WhenRule>,
}

/// Default frequency for configs that omit the field.
const fn default_frequency() -> FrequencyRule {
    FrequencyRule::FirstOnly
}

impl InjectionConfig {
    /// Creates a config that injects at step 1 for both phases.
    #[must_use]
    pub const fn enabled() -> Self {
        Self {
            inject: true,
            target: InjectionTarget::Both,
            frequency: FrequencyRule::FirstOnly,
            when: Vec::new(),
        }
    }

    /// Creates a config that never injects.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            inject: false,
            target: InjectionTarget::Both,
            frequency: FrequencyRule::Never,
            when: Vec::new(),
        }
    }
}

/// Hierarchy of configurations for one injection type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSettings {
    /// Step-level configuration.
    #[serde(default)]
    pub step: Option<InjectionConfig>,
    /// Chain-level configuration.
    #[serde(default)]
    pub chain: Option<InjectionConfig>,
    /// Category-level configurations keyed by category id.
    #[serde(default)]
    pub categories: BTreeMap<CategoryId, InjectionConfig>,
    /// Global configuration.
    #[serde(default)]
    pub global: Option<InjectionConfig>,
}

/// Injection settings for all content classes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionSettings {
    /// System prompt settings.
    #[serde(default)]
    pub system_prompt: TypeSettings,
    /// Gate guidance settings.
    #[serde(default)]
    pub gate_guidance: TypeSettings,
    /// Style guidance settings.
    #[serde(default)]
    pub style_guidance: TypeSettings,
}

impl InjectionSettings {
    /// Returns the hierarchy for a content class.
    #[must_use]
    pub const fn for_type(&self, injection_type: InjectionType) -> &TypeSettings {
        match injection_type {
            InjectionType::SystemPrompt => &self.system_prompt,
            InjectionType::GateGuidance => &self.gate_guidance,
            InjectionType::StyleGuidance => &self.style_guidance,
        }
    }
}

// ============================================================================
// SECTION: Runtime Overrides
// ============================================================================

/// Scope of a runtime override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideScope {
    /// Applies for the whole host session.
    Session,
    /// Applies to the current chain run.
    Chain,
    /// Applies to the current step only.
    Step,
}

impl OverrideScope {
    /// Returns the stable label for the scope.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Chain => "chain",
            Self::Step => "step",
        }
    }
}

/// Runtime override for one injection type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOverride {
    /// Whether to inject.
    pub inject: bool,
    /// Override scope.
    pub scope: OverrideScope,
    /// Expiry; `None` keeps the override until cleared.
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

impl RuntimeOverride {
    /// Returns true when the override has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expiry| now > expiry)
    }
}
