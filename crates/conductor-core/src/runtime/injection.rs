// crates/conductor-core/src/runtime/injection.rs
// ============================================================================
// Module: Injection Decision Service
// Description: Single source of truth for per-step injection decisions.
// Purpose: Resolve modifier, override, hierarchy, frequency, and target rules.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Every injection question is answered here, once per request per type, and
//! cached. The resolution order is fixed: modifier, runtime override, then
//! the step-chain-category-global hierarchy, then the built-in default.
//! `when` clauses on a resolved config may inject, skip, or fall through to
//! the next level. Frequency and target filters apply to whatever level
//! decided.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::ExecutionPhase;
use crate::core::FrequencyRule;
use crate::core::InjectionConfig;
use crate::core::InjectionDecision;
use crate::core::InjectionSettings;
use crate::core::InjectionSource;
use crate::core::InjectionTarget;
use crate::core::InjectionType;
use crate::core::Modifier;
use crate::core::RuntimeOverride;
use crate::core::TypeSettings;
use crate::core::WhenOutcome;
use crate::core::WhenRule;
use crate::core::identifiers::CategoryId;
use crate::core::identifiers::FrameworkId;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: Decision Context
// ============================================================================

/// Context for one request's injection decisions.
#[derive(Debug, Clone, Default)]
pub struct DecisionContext {
    /// Command modifier, when present.
    pub modifier: Option<Modifier>,
    /// Current step, 1-based.
    pub step: usize,
    /// Total planned steps.
    pub total_steps: usize,
    /// Prompt category.
    pub category: Option<CategoryId>,
    /// Active framework.
    pub framework: Option<FrameworkId>,
    /// Phase the decision is computed for.
    pub phase: Option<ExecutionPhase>,
}

impl DecisionContext {
    /// Returns the phase, defaulting to step emission.
    #[must_use]
    pub fn phase(&self) -> ExecutionPhase {
        self.phase.unwrap_or(ExecutionPhase::Step)
    }
}

// ============================================================================
// SECTION: Decision Service
// ============================================================================

/// Single source of truth for injection decisions.
///
/// The cache is request-scoped: callers invoke [`Self::reset`] at request
/// start, after which `decide` computes each type at most once. Runtime
/// overrides outlive requests and are evicted on read when expired.
pub struct InjectionDecisionService {
    /// Hierarchy settings for all content classes.
    settings: InjectionSettings,
    /// Runtime overrides keyed by injection type.
    overrides: Mutex<BTreeMap<InjectionType, RuntimeOverride>>,
    /// Request-scoped decision cache.
    cache: Mutex<BTreeMap<InjectionType, InjectionDecision>>,
    /// Clock for decision stamps and override expiry.
    clock: Arc<dyn Clock + Send + Sync>,
}

impl InjectionDecisionService {
    /// Creates a service over the given settings.
    #[must_use]
    pub fn new(settings: InjectionSettings, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            settings,
            overrides: Mutex::new(BTreeMap::new()),
            cache: Mutex::new(BTreeMap::new()),
            clock,
        }
    }

    /// Clears the request-scoped decision cache.
    pub fn reset(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Installs a runtime override for one injection type.
    pub fn set_override(&self, injection_type: InjectionType, value: RuntimeOverride) {
        if let Ok(mut overrides) = self.overrides.lock() {
            overrides.insert(injection_type, value);
        }
    }

    /// Removes the runtime override for one injection type.
    pub fn clear_override(&self, injection_type: InjectionType) {
        if let Ok(mut overrides) = self.overrides.lock() {
            overrides.remove(&injection_type);
        }
    }

    /// Decides whether to inject the given content class.
    ///
    /// Decisions are cached per type until [`Self::reset`].
    #[must_use]
    pub fn decide(&self, injection_type: InjectionType, ctx: &DecisionContext) -> InjectionDecision {
        if let Ok(cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&injection_type) {
                return cached.clone();
            }
        }
        let decision = self.resolve(injection_type, ctx);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(injection_type, decision.clone());
        }
        decision
    }

    /// Decides every content class and returns a frozen snapshot.
    #[must_use]
    pub fn decide_all(&self, ctx: &DecisionContext) -> BTreeMap<InjectionType, InjectionDecision> {
        InjectionType::ALL
            .iter()
            .map(|injection_type| (*injection_type, self.decide(*injection_type, ctx)))
            .collect()
    }

    /// Full resolution pipeline for one type.
    fn resolve(&self, injection_type: InjectionType, ctx: &DecisionContext) -> InjectionDecision {
        let now = self.clock.now();

        // 1. Modifier table, highest priority.
        if let Some(modifier) = ctx.modifier {
            if let Some((inject, reason)) = modifier_rule(modifier, injection_type) {
                return InjectionDecision {
                    inject,
                    reason,
                    source: InjectionSource::Modifier,
                    target: InjectionTarget::Both,
                    decided_at: now,
                };
            }
        }

        // 2. Runtime overrides, evicting expired entries on read.
        if let Ok(mut overrides) = self.overrides.lock() {
            if let Some(entry) = overrides.get(&injection_type) {
                if entry.is_expired(now) {
                    overrides.remove(&injection_type);
                } else {
                    return InjectionDecision {
                        inject: entry.inject,
                        reason: format!("runtime override ({} scope)", entry.scope.as_str()),
                        source: InjectionSource::RuntimeOverride,
                        target: InjectionTarget::Both,
                        decided_at: now,
                    };
                }
            }
        }

        // 3-4. Hierarchy walk with `when` evaluation at each level.
        let type_settings = self.settings.for_type(injection_type);
        let (config, source, base) = walk_hierarchy(type_settings, injection_type, ctx);

        let mut inject = base;
        let mut reason = format!("{} config", source_label(source));

        // 5. Frequency rule for multi-step runs.
        if inject && ctx.total_steps > 1 && !config.frequency.allows(ctx.step) {
            inject = false;
            reason = format!("frequency rule suppressed injection at step {}", ctx.step);
        }

        // 6. Target filter for the current phase.
        if inject && !config.target.covers(ctx.phase()) {
            inject = false;
            reason = format!(
                "target {} does not cover the {} phase",
                config.target.as_str(),
                ctx.phase().as_str()
            );
        }

        InjectionDecision {
            inject,
            reason,
            source,
            target: config.target,
            decided_at: now,
        }
    }
}

// ============================================================================
// SECTION: Modifier Table
// ============================================================================

/// Fixed modifier-to-types table.
///
/// Returns `Some((inject, reason))` when the modifier decides this type, or
/// `None` to fall through. `%judge` forces system-prompt only; `%clean`
/// disables everything it names; `%lean` keeps style guidance.
fn modifier_rule(modifier: Modifier, injection_type: InjectionType) -> Option<(bool, String)> {
    match (modifier, injection_type) {
        (Modifier::Clean, _) => {
            Some((false, format!("%clean disables {}", injection_type.as_str())))
        }
        (Modifier::Lean, InjectionType::SystemPrompt | InjectionType::GateGuidance) => {
            Some((false, format!("%lean disables {}", injection_type.as_str())))
        }
        (Modifier::Guided, InjectionType::SystemPrompt | InjectionType::GateGuidance) => {
            Some((true, format!("%guided forces {}", injection_type.as_str())))
        }
        (Modifier::Judge | Modifier::Framework, InjectionType::SystemPrompt) => {
            Some((true, format!("%{} forces system prompt", modifier.as_str())))
        }
        _ => None,
    }
}

// ============================================================================
// SECTION: Hierarchy Walk
// ============================================================================

/// Walks step, chain, category, global, then the built-in default.
///
/// At each defined level the `when` rules are evaluated: a matching `inject`
/// or `skip` decides; `inherit` falls through to the next level; no match
/// uses the level's base flag.
fn walk_hierarchy(
    settings: &TypeSettings,
    injection_type: InjectionType,
    ctx: &DecisionContext,
) -> (InjectionConfig, InjectionSource, bool) {
    let category_config =
        ctx.category.as_ref().and_then(|category| settings.categories.get(category));
    let levels: [(Option<&InjectionConfig>, InjectionSource); 4] = [
        (settings.step.as_ref(), InjectionSource::Step),
        (settings.chain.as_ref(), InjectionSource::Chain),
        (category_config, InjectionSource::Category),
        (settings.global.as_ref(), InjectionSource::Global),
    ];

    for (config, source) in levels {
        let Some(config) = config else {
            continue;
        };
        match evaluate_when(&config.when, ctx) {
            Some(WhenOutcome::Inject) => return (config.clone(), source, true),
            Some(WhenOutcome::Skip) => return (config.clone(), source, false),
            Some(WhenOutcome::Inherit) => {}
            None => return (config.clone(), source, config.inject),
        }
    }

    let default = builtin_default(injection_type);
    let inject = default.inject;
    (default, InjectionSource::Default, inject)
}

/// Evaluates `when` rules against the context, first match wins.
fn evaluate_when(rules: &[WhenRule], ctx: &DecisionContext) -> Option<WhenOutcome> {
    for rule in rules {
        let framework_matches = match (&rule.framework, &ctx.framework) {
            (None, _) => true,
            (Some(wanted), Some(actual)) => wanted.matches(actual),
            (Some(_), None) => false,
        };
        let category_matches = match (&rule.category, &ctx.category) {
            (None, _) => true,
            (Some(wanted), Some(actual)) => wanted.matches(actual),
            (Some(_), None) => false,
        };
        if framework_matches && category_matches {
            return Some(rule.outcome);
        }
    }
    None
}

/// Built-in defaults applied when no level defines a config.
fn builtin_default(injection_type: InjectionType) -> InjectionConfig {
    match injection_type {
        InjectionType::SystemPrompt => InjectionConfig::enabled(),
        InjectionType::GateGuidance | InjectionType::StyleGuidance => InjectionConfig {
            inject: true,
            target: InjectionTarget::Both,
            frequency: FrequencyRule::Every(1),
            when: Vec::new(),
        },
    }
}

/// Stable label for a decision source.
const fn source_label(source: InjectionSource) -> &'static str {
    match source {
        InjectionSource::Modifier => "modifier",
        InjectionSource::RuntimeOverride => "runtime override",
        InjectionSource::Step => "step",
        InjectionSource::Chain => "chain",
        InjectionSource::Category => "category",
        InjectionSource::Global => "global",
        InjectionSource::Default => "default",
    }
}
