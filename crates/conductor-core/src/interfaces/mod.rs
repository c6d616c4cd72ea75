// crates/conductor-core/src/interfaces/mod.rs
// ============================================================================
// Module: Conductor Interfaces
// Description: Backend-agnostic interfaces for registries, analysis, and storage.
// Purpose: Define the contract surfaces used by the Conductor execution plane.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the execution plane integrates with prompt, gate,
//! framework, and script-tool catalogs without embedding loader details. The
//! core never touches the filesystem except through these traits and the
//! session persistence boundary. Implementations must fail closed on missing
//! or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::CategoryId;
use crate::core::FrameworkId;
use crate::core::GateDefinition;
use crate::core::GateId;
use crate::core::ParsedCommand;
use crate::core::PromptId;
use crate::core::ScriptExecution;
use crate::core::ScriptTool;
use crate::core::ToolId;
use crate::core::SessionRegistryDocument;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Prompt Records
// ============================================================================

/// Declared argument of a prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name referenced as `{{name}}` in templates.
    pub name: String,
    /// Whether the argument must be provided.
    #[serde(default)]
    pub required: bool,
    /// Optional argument description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Chain step declared by a prompt definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStepSpec {
    /// Prompt executed by the step.
    pub prompt_id: PromptId,
    /// Output variable the step result binds to.
    #[serde(default)]
    pub output_var: Option<String>,
    /// Output variables of earlier steps this step consumes.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Prompt record consumed by the planner and engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    /// Prompt identifier in canonical form.
    pub id: PromptId,
    /// Human-readable prompt name.
    pub name: String,
    /// Category the prompt belongs to.
    pub category: CategoryId,
    /// Prompt description.
    #[serde(default)]
    pub description: String,
    /// User-message template with `{{arg}}` placeholders.
    pub user_template: String,
    /// Optional system-message template.
    #[serde(default)]
    pub system_template: Option<String>,
    /// Declared template arguments.
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
    /// Chain steps declared by the prompt, empty for single prompts.
    #[serde(default)]
    pub chain_steps: Vec<ChainStepSpec>,
    /// Gate identifiers the prompt explicitly requests.
    #[serde(default)]
    pub gate_ids: Vec<GateId>,
}

impl PromptRecord {
    /// Returns true when the prompt declares chain steps.
    #[must_use]
    pub fn is_chain(&self) -> bool {
        !self.chain_steps.is_empty()
    }
}

// ============================================================================
// SECTION: Registry Errors
// ============================================================================

/// Registry access errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure.
    #[error("registry io error: {0}")]
    Io(String),
    /// Stored definition failed validation.
    #[error("registry invalid definition: {0}")]
    Invalid(String),
    /// Backend reported an error.
    #[error("registry error: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Registries
// ============================================================================

/// Prompt catalog consumed by the execution plane.
pub trait PromptRegistry {
    /// Returns a prompt by id, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the catalog cannot be read.
    fn get(&self, id: &PromptId) -> Result<Option<PromptRecord>, RegistryError>;

    /// Lists every prompt in the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the catalog cannot be read.
    fn list(&self) -> Result<Vec<PromptRecord>, RegistryError>;
}

/// Gate catalog consumed by the gate evaluator.
pub trait GateRegistry {
    /// Returns a gate definition by id, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the catalog cannot be read.
    fn get(&self, id: &GateId) -> Result<Option<GateDefinition>, RegistryError>;

    /// Lists every gate definition in the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the catalog cannot be read.
    fn list(&self) -> Result<Vec<GateDefinition>, RegistryError>;
}

/// Script tool catalog keyed by declaring prompt.
pub trait ScriptToolRegistry {
    /// Returns the tools declared by a prompt, resolved to absolute paths.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the catalog cannot be read.
    fn tools_for_prompt(&self, id: &PromptId) -> Result<Vec<ScriptTool>, RegistryError>;
}

// ============================================================================
// SECTION: Framework Registry
// ============================================================================

/// Methodology framework definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkDefinition {
    /// Framework identifier in canonical uppercase form.
    pub id: FrameworkId,
    /// Human-readable framework name.
    pub name: String,
    /// System prompt injected when the framework is active.
    pub system_prompt: String,
}

/// Framework catalog consumed for system-prompt injection.
pub trait FrameworkRegistry {
    /// Returns a framework by id, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the catalog cannot be read.
    fn get(&self, id: &FrameworkId) -> Result<Option<FrameworkDefinition>, RegistryError>;
}

// ============================================================================
// SECTION: Semantic Analyzer
// ============================================================================

/// Semantic analysis hints for planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticAnalysis {
    /// Recommended framework, when the analyzer has one.
    #[serde(default)]
    pub framework: Option<FrameworkId>,
    /// Analyzer confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Semantic analyzer errors.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Analyzer backend reported an error.
    #[error("semantic analyzer error: {0}")]
    Backend(String),
}

/// Pluggable LLM-backed classifier consulted as a planning oracle.
pub trait SemanticAnalyzer {
    /// Analyzes a parsed command against its prompt record.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError`] when the oracle cannot be consulted.
    fn analyze(
        &self,
        command: &ParsedCommand,
        prompt: &PromptRecord,
    ) -> Result<Option<SemanticAnalysis>, AnalyzerError>;
}

// ============================================================================
// SECTION: Script Runner
// ============================================================================

/// Script runner errors crossing the subsystem seam.
#[derive(Debug, Error)]
pub enum ScriptRunError {
    /// Script file missing on disk.
    #[error("script not found: {0}")]
    NotFound(String),
    /// Runtime interpreter missing.
    #[error("script interpreter missing: {0}")]
    InterpreterMissing(String),
    /// Extracted inputs violate the tool's schema.
    #[error("script input invalid: {0}")]
    InvalidInput(String),
    /// Subsystem failure outside the subprocess itself.
    #[error("script execution failed: {0}")]
    Execution(String),
}

/// Outcome of the script subsystem for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptDisposition {
    /// No enabled tool matched.
    NoMatch,
    /// A tool matched but awaits caller confirmation.
    NeedsConfirmation {
        /// Tool awaiting approval.
        tool_id: ToolId,
        /// Confirmation message for the caller.
        message: String,
        /// When the pending confirmation expires.
        expires_at: Timestamp,
    },
    /// A tool matched and ran.
    Executed {
        /// Tool that ran.
        tool_id: ToolId,
        /// Execution result.
        execution: ScriptExecution,
    },
}

/// Script subsystem seam consumed by the engine.
#[async_trait::async_trait]
pub trait ScriptRunner {
    /// Matches and, confirmation permitting, executes a tool for a request.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptRunError`] for subsystem failures; subprocess
    /// failures surface inside [`ScriptDisposition::Executed`].
    async fn run_for_prompt(
        &self,
        prompt_id: &PromptId,
        tools: &[ScriptTool],
        raw_args: &str,
        bindings: &std::collections::BTreeMap<String, String>,
    ) -> Result<ScriptDisposition, ScriptRunError>;
}

// ============================================================================
// SECTION: Session Store
// ============================================================================

/// Session store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("session store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("session store corruption: {0}")]
    Corrupt(String),
    /// Store serialization failure.
    #[error("session store serialization error: {0}")]
    Serialization(String),
    /// Store reported an error.
    #[error("session store error: {0}")]
    Store(String),
}

/// Whole-document session registry persistence.
///
/// The registry is a single append-mostly document; implementations must make
/// `save` atomic (write-then-rename) and treat corrupt documents as empty on
/// load.
pub trait SessionStore {
    /// Loads the registry document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails in a non-recoverable way.
    fn load(&self) -> Result<SessionRegistryDocument, StoreError>;

    /// Persists the registry document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when saving fails.
    fn save(&self, document: &SessionRegistryDocument) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Wall-clock abstraction so expiry logic is testable.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

// ============================================================================
// SECTION: Engine Metrics
// ============================================================================

/// Gate verdict outcome label for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerdictOutcome {
    /// Verdict passed.
    Pass,
    /// Verdict failed within budget.
    Fail,
    /// Verdict failed with the budget exhausted.
    Exhausted,
}

/// Engine-level metrics sink.
pub trait EngineMetrics {
    /// Records a run start.
    fn on_run_started(&self, session_backed: bool);

    /// Records a run resume.
    fn on_run_resumed(&self);

    /// Records a run completion.
    fn on_run_completed(&self, steps: usize);

    /// Records a gate verdict outcome.
    fn on_gate_verdict(&self, outcome: VerdictOutcome);
}

/// No-op engine metrics sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEngineMetrics;

impl EngineMetrics for NoopEngineMetrics {
    fn on_run_started(&self, _session_backed: bool) {}

    fn on_run_resumed(&self) {}

    fn on_run_completed(&self, _steps: usize) {}

    fn on_gate_verdict(&self, _outcome: VerdictOutcome) {}
}
