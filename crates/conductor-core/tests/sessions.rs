// conductor-core/tests/sessions.rs
// ============================================================================
// Module: Chain Session Tests
// Description: State machine, run allocation, and registry invariants.
// ============================================================================
//! ## Overview
//! Validates the per-step state machine, the at-most-one-active-per-base
//! rule, run-id allocation, stale sweeps, and persistence round-trips.

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

use std::collections::BTreeMap;
use std::sync::Arc;

use conductor_core::ChainSessionManager;
use conductor_core::Clock;
use conductor_core::CommandFormat;
use conductor_core::CommandMetadata;
use conductor_core::CommandStep;
use conductor_core::CommandType;
use conductor_core::ExecutionPlan;
use conductor_core::ExecutionStrategy;
use conductor_core::InMemorySessionStore;
use conductor_core::ManualClock;
use conductor_core::ParsedCommand;
use conductor_core::PendingGateReview;
use conductor_core::PlanStep;
use conductor_core::PromptId;
use conductor_core::RunId;
use conductor_core::RunLifecycle;
use conductor_core::RunStatus;
use conductor_core::SessionBlueprint;
use conductor_core::SessionStore;
use conductor_core::StepState;
use conductor_core::Timestamp;
use conductor_core::runtime::STALE_AFTER_MS;

/// Builds a two-step blueprint for the prompt `a`.
fn blueprint() -> SessionBlueprint {
    let step = |id: &str| PlanStep {
        prompt_id: PromptId::new(id),
        args: BTreeMap::new(),
        output_var: None,
        depends_on: Vec::new(),
    };
    SessionBlueprint {
        command: ParsedCommand {
            prompt_id: PromptId::new("a"),
            raw_args: String::new(),
            modifier: None,
            operators: Vec::new(),
            steps: vec![CommandStep {
                prompt_id: PromptId::new("a"),
                raw_args: String::new(),
            }],
            format: CommandFormat::Symbolic,
            confidence: 0.97,
            warnings: Vec::new(),
            command_type: CommandType::Chain,
            metadata: CommandMetadata {
                original_command: ">>a --> >>b".to_string(),
                prefix_normalized: false,
            },
        },
        plan: ExecutionPlan {
            strategy: ExecutionStrategy::Chain,
            steps: vec![step("a"), step("b")],
            framework_override: None,
            modifier: None,
            gate_ids: Vec::new(),
            step_gates: BTreeMap::new(),
            quick_gates: Vec::new(),
            requires_session: true,
            requires_framework: false,
        },
    }
}

/// Builds a manager over an in-memory store and a manual clock.
fn manager() -> (ChainSessionManager, Arc<InMemorySessionStore>, Arc<ManualClock>) {
    let store = Arc::new(InMemorySessionStore::new());
    let clock = Arc::new(ManualClock::starting_at(Timestamp::from_unix_millis(0)));
    let mgr = ChainSessionManager::new(store.clone(), clock.clone()).unwrap();
    (mgr, store, clock)
}

// ============================================================================
// SECTION: Run Allocation
// ============================================================================

/// Verifies run ids are numbered per base in creation order.
#[test]
fn run_ids_numbered() {
    let (mgr, _, _) = manager();
    let first = mgr.create_run(blueprint(), String::new()).unwrap();
    assert_eq!(first.run_id.as_str(), "chain-a#1");
    let second = mgr.create_run(blueprint(), String::new()).unwrap();
    assert_eq!(second.run_id.as_str(), "chain-a#2");
}

/// Verifies creating a new run marks the prior active run dormant.
#[test]
fn new_run_retires_prior_active() {
    let (mgr, _, _) = manager();
    let first = mgr.create_run(blueprint(), String::new()).unwrap();
    let second = mgr.create_run(blueprint(), String::new()).unwrap();

    let retired = mgr.get(&first.run_id).unwrap().unwrap();
    assert_eq!(retired.lifecycle, RunLifecycle::Dormant);

    let active = mgr.active_run_for_base(&second.base_chain_id).unwrap();
    assert_eq!(active, Some(second.run_id));
}

/// Verifies lookups for missing run ids return None.
#[test]
fn missing_run_is_none() {
    let (mgr, _, _) = manager();
    assert!(mgr.get(&RunId::new("chain-nope#1")).unwrap().is_none());
    assert!(mgr.update(&RunId::new("chain-nope#1"), |_| ()).unwrap().is_none());
}

// ============================================================================
// SECTION: Step State Machine
// ============================================================================

/// Verifies advance is legal only from a completed step.
#[test]
fn advance_requires_completed_step() {
    let (mgr, _, clock) = manager();
    let session = mgr.create_run(blueprint(), String::new()).unwrap();
    let now = clock.now();

    let advanced = mgr
        .update(&session.run_id, |live| {
            live.mark_step_emitted(now);
            live.advance_step(now)
        })
        .unwrap()
        .unwrap();
    assert!(!advanced, "in-progress step must not advance");

    let advanced = mgr
        .update(&session.run_id, |live| {
            live.complete_current_step(now);
            live.advance_step(now)
        })
        .unwrap()
        .unwrap();
    assert!(advanced);

    let live = mgr.get(&session.run_id).unwrap().unwrap();
    assert_eq!(live.current_step, 2);
}

/// Verifies the pending-review invariant against the step state.
#[test]
fn pending_review_matches_awaiting_gate() {
    let (mgr, _, clock) = manager();
    let session = mgr.create_run(blueprint(), String::new()).unwrap();
    let now = clock.now();

    mgr.update(&session.run_id, |live| {
        live.mark_step_emitted(now);
        live.store_pending_review(
            PendingGateReview {
                gate_ids: Vec::new(),
                attempt: 0,
                max_attempts: 2,
                last_feedback: None,
            },
            now,
        );
    })
    .unwrap();

    let live = mgr.get(&session.run_id).unwrap().unwrap();
    assert_eq!(live.current_state(), Some(StepState::AwaitingGate));
    assert!(live.pending_review.is_some());

    mgr.update(&session.run_id, |live| live.complete_current_step(now)).unwrap();
    let live = mgr.get(&session.run_id).unwrap().unwrap();
    assert!(live.pending_review.is_none());
    assert_eq!(live.current_state(), Some(StepState::Completed));
}

/// Verifies completing the final step completes the run.
#[test]
fn run_completes_when_plan_exhausted() {
    let (mgr, _, clock) = manager();
    let session = mgr.create_run(blueprint(), String::new()).unwrap();
    let now = clock.now();

    for _ in 0..2 {
        mgr.update(&session.run_id, |live| {
            live.mark_step_emitted(now);
            live.complete_current_step(now);
            live.advance_step(now);
        })
        .unwrap();
    }

    let live = mgr.get(&session.run_id).unwrap().unwrap();
    assert!(live.is_plan_exhausted());
    assert_eq!(live.status, RunStatus::Completed);
    assert_eq!(live.current_step, live.total_steps + 1);
}

// ============================================================================
// SECTION: Sweeps and Persistence
// ============================================================================

/// Verifies the stale sweep removes runs idle past the threshold.
#[test]
fn stale_sweep_removes_idle_runs() {
    let (mgr, _, clock) = manager();
    let session = mgr.create_run(blueprint(), String::new()).unwrap();

    clock.advance_millis(STALE_AFTER_MS + 1);
    let swept = mgr.cleanup_stale().unwrap();
    assert_eq!(swept, 1);
    assert!(mgr.get(&session.run_id).unwrap().is_none());

    // Sweeping again is idempotent.
    assert_eq!(mgr.cleanup_stale().unwrap(), 0);
}

/// Verifies swept ordinals never regress for later runs.
#[test]
fn ordinals_survive_sweeps() {
    let (mgr, _, clock) = manager();
    let first = mgr.create_run(blueprint(), String::new()).unwrap();
    assert_eq!(first.run_id.as_str(), "chain-a#1");

    clock.advance_millis(STALE_AFTER_MS + 1);
    mgr.cleanup_stale().unwrap();

    let second = mgr.create_run(blueprint(), String::new()).unwrap();
    assert_eq!(second.run_id.as_str(), "chain-a#2");
}

/// Verifies the persisted document round-trips through a fresh manager.
#[test]
fn persistence_round_trip() {
    let (mgr, store, clock) = manager();
    let session = mgr.create_run(blueprint(), String::new()).unwrap();

    let reloaded = ChainSessionManager::new(store.clone(), clock).unwrap();
    let live = reloaded.get(&session.run_id).unwrap().unwrap();
    assert_eq!(live.base_chain_id.as_str(), "chain-a");

    // Saving the loaded document again leaves the serialized form unchanged.
    let before = serde_json::to_value(store.snapshot()).unwrap();
    let document = store.load().unwrap();
    store.save(&document).unwrap();
    let after = serde_json::to_value(store.snapshot()).unwrap();
    assert_eq!(before, after);
}

/// Verifies legacy registry keys load under canonical names.
#[test]
fn legacy_keys_accepted() {
    let legacy = serde_json::json!({
        "version": 1,
        "sessions": {},
        "chainMapping": {},
    });
    let document: conductor_core::SessionRegistryDocument =
        serde_json::from_value(legacy).unwrap();
    assert!(document.runs.is_empty());
    assert!(document.run_mapping.is_empty());
}
