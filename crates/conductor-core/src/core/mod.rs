// crates/conductor-core/src/core/mod.rs
// ============================================================================
// Module: Conductor Core Types
// Description: Data model shared across the execution plane.
// Purpose: Re-export the canonical records for commands, plans, sessions, and gates.
// Dependencies: crate::core submodules
// ============================================================================

//! ## Overview
//! Core types are plain serializable records. Behavior lives in
//! [`crate::parser`] and [`crate::runtime`]; the records here carry the
//! invariants in their constructors and transition methods.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod command;
pub mod envelope;
pub mod gates;
pub mod identifiers;
pub mod injection;
pub mod plan;
pub mod script;
pub mod session;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use command::CommandFormat;
pub use command::CommandMetadata;
pub use command::CommandStep;
pub use command::CommandType;
pub use command::Modifier;
pub use command::Operator;
pub use command::ParsedCommand;
pub use envelope::AbortEnvelope;
pub use envelope::CompletionEnvelope;
pub use envelope::ConfirmationEnvelope;
pub use envelope::EngineReply;
pub use envelope::GateAction;
pub use envelope::GateActionEnvelope;
pub use envelope::InfoEnvelope;
pub use envelope::PauseEnvelope;
pub use gates::ActivationRules;
pub use gates::EnforcementMode;
pub use gates::GateDefinition;
pub use gates::GateKind;
pub use gates::GateSeverity;
pub use gates::GateType;
pub use gates::PassCriterion;
pub use gates::QuickGateSpec;
pub use gates::RetryConfig;
pub use identifiers::BaseChainId;
pub use identifiers::CategoryId;
pub use identifiers::FrameworkId;
pub use identifiers::GateId;
pub use identifiers::PromptId;
pub use identifiers::RunId;
pub use identifiers::StyleId;
pub use identifiers::ToolId;
pub use injection::ExecutionPhase;
pub use injection::FrequencyRule;
pub use injection::InjectionConfig;
pub use injection::InjectionDecision;
pub use injection::InjectionSettings;
pub use injection::InjectionSource;
pub use injection::InjectionTarget;
pub use injection::InjectionType;
pub use injection::OverrideScope;
pub use injection::RuntimeOverride;
pub use injection::TypeSettings;
pub use injection::WhenOutcome;
pub use injection::WhenRule;
pub use plan::ExecutionPlan;
pub use plan::ExecutionStrategy;
pub use plan::PlanStep;
pub use script::ScriptExecution;
pub use script::ScriptRuntime;
pub use script::ScriptTool;
pub use script::ToolExecutionConfig;
pub use script::ToolTrigger;
pub use session::ChainSession;
pub use session::PendingGateReview;
pub use session::REGISTRY_VERSION;
pub use session::RunLifecycle;
pub use session::RunStatus;
pub use session::SessionBlueprint;
pub use session::SessionRegistryDocument;
pub use session::StepRecord;
pub use session::StepState;
pub use time::Timestamp;
