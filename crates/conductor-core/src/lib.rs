// crates/conductor-core/src/lib.rs
// ============================================================================
// Module: Conductor Core Library
// Description: Public API surface for the Prompt Conductor execution plane.
// Purpose: Expose core types, interfaces, parser, and runtime services.
// Dependencies: crate::{core, interfaces, parser, runtime}
// ============================================================================

//! ## Overview
//! Conductor core is the execution plane of a prompt orchestration server:
//! command parsing, execution planning, injection decisions, gate evaluation,
//! and the chain session state machine. It is backend-agnostic and integrates
//! through explicit interfaces; prompt, gate, and tool catalogs live behind
//! registry traits and the LLM host drives execution by re-invoking the
//! engine with completed step text.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod parser;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AnalyzerError;
pub use interfaces::ChainStepSpec;
pub use interfaces::Clock;
pub use interfaces::EngineMetrics;
pub use interfaces::FrameworkDefinition;
pub use interfaces::FrameworkRegistry;
pub use interfaces::GateRegistry;
pub use interfaces::NoopEngineMetrics;
pub use interfaces::PromptArgument;
pub use interfaces::PromptRecord;
pub use interfaces::PromptRegistry;
pub use interfaces::RegistryError;
pub use interfaces::ScriptDisposition;
pub use interfaces::ScriptRunError;
pub use interfaces::ScriptRunner;
pub use interfaces::ScriptToolRegistry;
pub use interfaces::SemanticAnalysis;
pub use interfaces::SemanticAnalyzer;
pub use interfaces::SessionStore;
pub use interfaces::StoreError;
pub use interfaces::VerdictOutcome;
pub use parser::CommandParser;
pub use parser::NoopParserMetrics;
pub use parser::ParseError;
pub use parser::ParserMetrics;
pub use runtime::ChainSessionManager;
pub use runtime::DecisionContext;
pub use runtime::EngineConfig;
pub use runtime::EngineError;
pub use runtime::EngineServices;
pub use runtime::ExecuteOptions;
pub use runtime::ExecuteRequest;
pub use runtime::GateContext;
pub use runtime::GateError;
pub use runtime::GateEvaluator;
pub use runtime::GateVerdict;
pub use runtime::InMemorySessionStore;
pub use runtime::InjectionDecisionService;
pub use runtime::ManualClock;
pub use runtime::PromptEngine;
pub use runtime::PromptManager;
pub use runtime::ResumeRequest;
pub use runtime::SessionError;
pub use runtime::SystemClock;
