// conductor-core/tests/injection.rs
// ============================================================================
// Module: Injection Decision Tests
// Description: Modifier table, overrides, hierarchy, frequency, and caching.
// ============================================================================
//! ## Overview
//! Validates the fixed resolution order of the injection decision service and
//! the determinism guarantees of its request-scoped cache.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;

use conductor_core::CategoryId;
use conductor_core::DecisionContext;
use conductor_core::ExecutionPhase;
use conductor_core::FrequencyRule;
use conductor_core::InjectionConfig;
use conductor_core::InjectionDecisionService;
use conductor_core::InjectionSettings;
use conductor_core::InjectionSource;
use conductor_core::InjectionTarget;
use conductor_core::InjectionType;
use conductor_core::ManualClock;
use conductor_core::Modifier;
use conductor_core::OverrideScope;
use conductor_core::RuntimeOverride;
use conductor_core::Timestamp;
use conductor_core::WhenOutcome;
use conductor_core::WhenRule;

/// Builds a service over settings with a manual clock.
fn service(settings: InjectionSettings) -> (InjectionDecisionService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_at(Timestamp::from_unix_millis(1_000)));
    (InjectionDecisionService::new(settings, clock.clone()), clock)
}

/// Context for a single-step run.
fn single_step_ctx(modifier: Option<Modifier>) -> DecisionContext {
    DecisionContext {
        modifier,
        step: 1,
        total_steps: 1,
        category: None,
        framework: None,
        phase: Some(ExecutionPhase::Step),
    }
}

// ============================================================================
// SECTION: Modifier Table
// ============================================================================

/// Verifies %clean disables every content class.
#[test]
fn clean_disables_all_types() {
    let (svc, _) = service(InjectionSettings::default());
    let ctx = single_step_ctx(Some(Modifier::Clean));
    for injection_type in InjectionType::ALL {
        let decision = svc.decide(injection_type, &ctx);
        assert!(!decision.inject, "{injection_type:?}");
        assert_eq!(decision.source, InjectionSource::Modifier);
    }
}

/// Verifies %lean keeps style guidance while disabling the rest.
#[test]
fn lean_keeps_style() {
    let (svc, _) = service(InjectionSettings::default());
    let ctx = single_step_ctx(Some(Modifier::Lean));
    assert!(!svc.decide(InjectionType::SystemPrompt, &ctx).inject);
    assert!(!svc.decide(InjectionType::GateGuidance, &ctx).inject);
    assert!(svc.decide(InjectionType::StyleGuidance, &ctx).inject);
}

/// Verifies %judge forces the system prompt only.
#[test]
fn judge_forces_system_prompt_only() {
    let (svc, _) = service(InjectionSettings::default());
    let ctx = single_step_ctx(Some(Modifier::Judge));
    let system = svc.decide(InjectionType::SystemPrompt, &ctx);
    assert!(system.inject);
    assert_eq!(system.source, InjectionSource::Modifier);
    // Gate guidance falls through to the default hierarchy.
    let gates = svc.decide(InjectionType::GateGuidance, &ctx);
    assert_eq!(gates.source, InjectionSource::Default);
}

// ============================================================================
// SECTION: Runtime Overrides
// ============================================================================

/// Verifies overrides beat the hierarchy and expire on read.
#[test]
fn override_expires_on_read() {
    let (svc, clock) = service(InjectionSettings::default());
    svc.set_override(
        InjectionType::SystemPrompt,
        RuntimeOverride {
            inject: false,
            scope: OverrideScope::Session,
            expires_at: Some(Timestamp::from_unix_millis(2_000)),
        },
    );

    let ctx = single_step_ctx(None);
    let before = svc.decide(InjectionType::SystemPrompt, &ctx);
    assert!(!before.inject);
    assert_eq!(before.source, InjectionSource::RuntimeOverride);

    clock.advance_millis(5_000);
    svc.reset();
    let after = svc.decide(InjectionType::SystemPrompt, &ctx);
    assert_eq!(after.source, InjectionSource::Default);
    assert!(after.inject);
}

// ============================================================================
// SECTION: Hierarchy and When Rules
// ============================================================================

/// Verifies the chain level beats category and global levels.
#[test]
fn hierarchy_priority_order() {
    let mut settings = InjectionSettings::default();
    settings.system_prompt.chain = Some(InjectionConfig::disabled());
    settings.system_prompt.global = Some(InjectionConfig::enabled());

    let (svc, _) = service(settings);
    let decision = svc.decide(InjectionType::SystemPrompt, &single_step_ctx(None));
    assert!(!decision.inject);
    assert_eq!(decision.source, InjectionSource::Chain);
}

/// Verifies a matching `inherit` rule falls through to the next level.
#[test]
fn when_inherit_falls_through() {
    let mut settings = InjectionSettings::default();
    settings.system_prompt.chain = Some(InjectionConfig {
        inject: false,
        target: InjectionTarget::Both,
        frequency: FrequencyRule::FirstOnly,
        when: vec![WhenRule {
            framework: None,
            category: Some(CategoryId::new("analysis")),
            outcome: WhenOutcome::Inherit,
        }],
    });
    settings.system_prompt.global = Some(InjectionConfig::enabled());

    let (svc, _) = service(settings);
    let ctx = DecisionContext {
        category: Some(CategoryId::new("analysis")),
        ..single_step_ctx(None)
    };
    let decision = svc.decide(InjectionType::SystemPrompt, &ctx);
    assert!(decision.inject);
    assert_eq!(decision.source, InjectionSource::Global);
}

/// Verifies a matching `skip` rule overrides the level's base flag.
#[test]
fn when_skip_overrides_base_flag() {
    let mut settings = InjectionSettings::default();
    settings.system_prompt.global = Some(InjectionConfig {
        inject: true,
        target: InjectionTarget::Both,
        frequency: FrequencyRule::FirstOnly,
        when: vec![WhenRule {
            framework: None,
            category: Some(CategoryId::new("code")),
            outcome: WhenOutcome::Skip,
        }],
    });

    let (svc, _) = service(settings);
    let ctx = DecisionContext {
        category: Some(CategoryId::new("code")),
        ..single_step_ctx(None)
    };
    assert!(!svc.decide(InjectionType::SystemPrompt, &ctx).inject);
}

// ============================================================================
// SECTION: Frequency and Target
// ============================================================================

/// Verifies the frequency table for multi-step runs.
#[test]
fn frequency_rules() {
    assert!(!FrequencyRule::Never.allows(1));
    assert!(FrequencyRule::FirstOnly.allows(1));
    assert!(!FrequencyRule::FirstOnly.allows(2));
    // Step 1 always injects; thereafter (step - 1) % k == 0.
    assert!(FrequencyRule::Every(2).allows(1));
    assert!(!FrequencyRule::Every(2).allows(2));
    assert!(FrequencyRule::Every(2).allows(3));
    assert!(FrequencyRule::Every(2).allows(5));
}

/// Verifies first-only suppresses later steps of a multi-step run.
#[test]
fn frequency_applies_to_multi_step() {
    let mut settings = InjectionSettings::default();
    settings.system_prompt.global = Some(InjectionConfig::enabled());
    let (svc, _) = service(settings);

    let later_step = DecisionContext {
        step: 2,
        total_steps: 3,
        ..single_step_ctx(None)
    };
    let decision = svc.decide(InjectionType::SystemPrompt, &later_step);
    assert!(!decision.inject);
    assert!(decision.reason.contains("frequency"));
}

/// Verifies the target filter converts mismatches to skip.
#[test]
fn target_filter_skips_wrong_phase() {
    let mut settings = InjectionSettings::default();
    settings.gate_guidance.global = Some(InjectionConfig {
        inject: true,
        target: InjectionTarget::Gates,
        frequency: FrequencyRule::Every(1),
        when: Vec::new(),
    });
    let (svc, _) = service(settings);

    let step_phase = DecisionContext {
        phase: Some(ExecutionPhase::Step),
        ..single_step_ctx(None)
    };
    let decision = svc.decide(InjectionType::GateGuidance, &step_phase);
    assert!(!decision.inject);
    assert!(decision.reason.contains("phase"));
}

// ============================================================================
// SECTION: Caching
// ============================================================================

/// Verifies decisions are cached per type until reset.
#[test]
fn decisions_cached_until_reset() {
    let (svc, _) = service(InjectionSettings::default());
    let ctx = single_step_ctx(None);

    let first = svc.decide(InjectionType::SystemPrompt, &ctx);
    assert!(first.inject);

    // An override installed mid-request does not change the cached decision.
    svc.set_override(
        InjectionType::SystemPrompt,
        RuntimeOverride {
            inject: false,
            scope: OverrideScope::Session,
            expires_at: None,
        },
    );
    let cached = svc.decide(InjectionType::SystemPrompt, &ctx);
    assert!(cached.inject);

    svc.reset();
    let fresh = svc.decide(InjectionType::SystemPrompt, &ctx);
    assert!(!fresh.inject);
}

/// Verifies decide_all returns a frozen snapshot of all three types.
#[test]
fn decide_all_snapshot() {
    let (svc, _) = service(InjectionSettings::default());
    let snapshot = svc.decide_all(&single_step_ctx(None));
    assert_eq!(snapshot.len(), 3);
    assert!(snapshot.contains_key(&InjectionType::SystemPrompt));
}
