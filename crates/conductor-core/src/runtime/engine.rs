// crates/conductor-core/src/runtime/engine.rs
// ============================================================================
// Module: Prompt Engine
// Description: Execute/resume orchestration over parser, planner, and sessions.
// Purpose: Single canonical execution path for the Conductor tool surface.
// Dependencies: crate::{core, interfaces, parser, runtime}
// ============================================================================

//! ## Overview
//! The prompt engine is the single canonical execution path. All API surfaces
//! (stdio, HTTP) must call into these methods to preserve the session
//! invariants. An `execute` starts a run from a command string; a `resume`
//! continues one by run id with completed step text, a gate verdict, or a
//! gate action. The engine never blocks on LLM work: every return is an
//! envelope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::core::AbortEnvelope;
use crate::core::ChainSession;
use crate::core::CompletionEnvelope;
use crate::core::ConfirmationEnvelope;
use crate::core::EnforcementMode;
use crate::core::EngineReply;
use crate::core::ExecutionPhase;
use crate::core::ExecutionPlan;
use crate::core::GateAction;
use crate::core::GateActionEnvelope;
use crate::core::GateDefinition;
use crate::core::InfoEnvelope;
use crate::core::InjectionSettings;
use crate::core::InjectionType;
use crate::core::ParsedCommand;
use crate::core::PauseEnvelope;
use crate::core::PendingGateReview;
use crate::core::QuickGateSpec;
use crate::core::RunId;
use crate::core::RunStatus;
use crate::core::SessionBlueprint;
use crate::core::StepState;
use crate::core::identifiers::GateId;
use crate::core::identifiers::PromptId;
use crate::core::identifiers::StyleId;
use crate::interfaces::AnalyzerError;
use crate::interfaces::Clock;
use crate::interfaces::EngineMetrics;
use crate::interfaces::FrameworkRegistry;
use crate::interfaces::GateRegistry;
use crate::interfaces::PromptRecord;
use crate::interfaces::PromptRegistry;
use crate::interfaces::RegistryError;
use crate::interfaces::ScriptDisposition;
use crate::interfaces::ScriptRunError;
use crate::interfaces::ScriptRunner;
use crate::interfaces::ScriptToolRegistry;
use crate::interfaces::SemanticAnalyzer;
use crate::interfaces::SessionStore;
use crate::interfaces::VerdictOutcome;
use crate::parser::BUILTIN_COMMANDS;
use crate::parser::CommandParser;
use crate::parser::ParseError;
use crate::runtime::args::render_template;
use crate::runtime::gates::GateContext;
use crate::runtime::gates::GateError;
use crate::runtime::gates::GateEvaluator;
use crate::runtime::gates::criteria_pass;
use crate::runtime::gates::format_criteria;
use crate::runtime::gates::improvement_hints;
use crate::runtime::gates::parse_verdict_field;
use crate::runtime::gates::resolve_enforcement;
use crate::runtime::gates::resolve_retry;
use crate::runtime::gates::scan_verdict;
use crate::runtime::injection::DecisionContext;
use crate::runtime::injection::InjectionDecisionService;
use crate::runtime::planner::PlanError;
use crate::runtime::planner::PlanInputs;
use crate::runtime::planner::build_plan;
use crate::runtime::session::ChainSessionManager;
use crate::runtime::session::SessionError;

/// Default analyzer confidence floor for framework recommendations.
const DEFAULT_MIN_FRAMEWORK_CONFIDENCE: f64 = 0.7;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Command parsing failed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Planning failed.
    #[error(transparent)]
    Plan(#[from] PlanError),
    /// Gate evaluation failed.
    #[error(transparent)]
    Gate(#[from] GateError),
    /// Session registry failure.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Registry access failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Script subsystem failure.
    #[error(transparent)]
    Script(#[from] ScriptRunError),
    /// Semantic analyzer failure.
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    /// Resume referenced an unknown run.
    #[error("run '{0}' not found")]
    SessionNotFound(String),
    /// Resume referenced a run that is no longer resumable.
    #[error("run '{id}' is not resumable ({status})")]
    RunNotResumable {
        /// Run identifier.
        id: String,
        /// Current run status label.
        status: String,
    },
    /// A prompt present at parse time vanished from the registry.
    #[error("prompt '{0}' disappeared from the registry")]
    PromptVanished(String),
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Options for an execute request.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Marks the context as an explicit gate request for activation rules.
    pub explicit_gate_request: bool,
}

/// Request starting a new run.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    /// Command string.
    pub command: String,
    /// Caller-supplied quick gates.
    pub gates: Vec<QuickGateSpec>,
    /// Execution options.
    pub options: ExecuteOptions,
}

/// Request resuming an existing run.
#[derive(Debug, Clone)]
pub struct ResumeRequest {
    /// Run identifier from the pause envelope.
    pub chain_id: RunId,
    /// Completed step output.
    pub user_response: Option<String>,
    /// Gate verdict text.
    pub gate_verdict: Option<String>,
    /// Gate action after retry exhaustion.
    pub gate_action: Option<GateAction>,
    /// Fall through to a fresh execute when the run is missing.
    pub force_restart: bool,
}

// ============================================================================
// SECTION: Engine Services
// ============================================================================

/// External collaborators injected into the engine.
///
/// Services are explicitly constructed and passed in; there are no
/// module-level singletons.
pub struct EngineServices {
    /// Prompt catalog.
    pub prompts: Arc<dyn PromptRegistry + Send + Sync>,
    /// Gate catalog.
    pub gates: Arc<dyn GateRegistry + Send + Sync>,
    /// Framework catalog.
    pub frameworks: Arc<dyn FrameworkRegistry + Send + Sync>,
    /// Script tool catalog.
    pub tools: Arc<dyn ScriptToolRegistry + Send + Sync>,
    /// Script subsystem.
    pub scripts: Arc<dyn ScriptRunner + Send + Sync>,
    /// Optional semantic analyzer oracle.
    pub analyzer: Option<Arc<dyn SemanticAnalyzer + Send + Sync>>,
    /// Engine metrics sink.
    pub metrics: Arc<dyn EngineMetrics + Send + Sync>,
    /// Clock.
    pub clock: Arc<dyn Clock + Send + Sync>,
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum analyzer confidence for a framework recommendation to bind.
    pub min_framework_confidence: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_framework_confidence: DEFAULT_MIN_FRAMEWORK_CONFIDENCE,
        }
    }
}

// ============================================================================
// SECTION: Prompt Engine
// ============================================================================

/// The public execution surface.
pub struct PromptEngine {
    /// Command parser.
    parser: CommandParser,
    /// Injected collaborators.
    services: EngineServices,
    /// Session registry.
    sessions: ChainSessionManager,
    /// Injection decision service.
    injection: InjectionDecisionService,
    /// Registry-backed gate selection.
    evaluator: GateEvaluator,
    /// Tuning knobs.
    config: EngineConfig,
}

impl PromptEngine {
    /// Creates an engine over its services and session store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Session`] when the session registry cannot be
    /// loaded.
    pub fn new(
        services: EngineServices,
        store: Arc<dyn SessionStore + Send + Sync>,
        settings: InjectionSettings,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let sessions = ChainSessionManager::new(store, Arc::clone(&services.clock))?;
        let injection = InjectionDecisionService::new(settings, Arc::clone(&services.clock));
        let evaluator = GateEvaluator::new(Arc::clone(&services.gates));
        Ok(Self {
            parser: CommandParser::new(),
            services,
            sessions,
            injection,
            evaluator,
            config,
        })
    }

    /// Replaces the parser, typically to attach telemetry.
    pub fn set_parser(&mut self, parser: CommandParser) {
        self.parser = parser;
    }

    /// Returns the session manager for administrative surfaces.
    #[must_use]
    pub const fn sessions(&self) -> &ChainSessionManager {
        &self.sessions
    }

    /// Returns the injection decision service for override surfaces.
    #[must_use]
    pub const fn injection(&self) -> &InjectionDecisionService {
        &self.injection
    }

    /// Starts a new run from a command string.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] on parse, plan, registry, or persistence
    /// failure.
    pub async fn execute(&self, request: ExecuteRequest) -> Result<EngineReply, EngineError> {
        // Built-in commands route before the parser.
        if let Some(reply) = self.route_builtin(&request.command)? {
            return Ok(reply);
        }

        self.injection.reset();
        // Best-effort sweep of runs idle past the 24 h threshold.
        let _ = self.sessions.cleanup_stale();

        let catalog = self.services.prompts.list()?;
        let available: Vec<PromptId> = catalog.iter().map(|record| record.id.clone()).collect();
        let command = self.parser.parse(&request.command, &available)?;

        let prompt = self.require_prompt(&command.prompt_id)?;
        let analysis = match &self.services.analyzer {
            Some(analyzer) => analyzer.analyze(&command, &prompt)?,
            None => None,
        };

        // Gate activation context for the base prompt.
        let framework_hint = command
            .framework_override()
            .cloned()
            .or_else(|| analysis.as_ref().and_then(|found| found.framework.clone()));
        let explicit_request = request.options.explicit_gate_request
            || !request.gates.is_empty()
            || !command.gate_values().is_empty();
        let gate_ctx = GateContext {
            category: Some(prompt.category.clone()),
            framework: framework_hint,
            explicit_request,
        };
        let active_gates = self.evaluator.active_gates(&gate_ctx)?;

        let mut operator_gates: Vec<GateDefinition> = Vec::new();
        for value in command.gate_values() {
            operator_gates.push(self.evaluator.resolve_token(value)?);
        }
        operator_gates.extend(self.evaluator.definitions(&prompt.gate_ids)?);

        let tools = self.services.tools.tools_for_prompt(&prompt.id)?;

        let plan = build_plan(&PlanInputs {
            command: &command,
            prompt: &prompt,
            active_gates: &active_gates,
            request_gates: &request.gates,
            operator_gates: &operator_gates,
            analysis: analysis.as_ref(),
            has_script_tools: !tools.is_empty(),
            min_framework_confidence: self.config.min_framework_confidence,
        })?;

        // Script tools run before any session exists so a confirmation
        // round-trip does not leave a half-started run behind.
        let mut script_section = None;
        if !tools.is_empty() {
            let bindings = plan.steps.first().map(|step| step.args.clone()).unwrap_or_default();
            match self
                .services
                .scripts
                .run_for_prompt(&prompt.id, &tools, &command.raw_args, &bindings)
                .await?
            {
                ScriptDisposition::NoMatch => {}
                ScriptDisposition::NeedsConfirmation {
                    tool_id,
                    message,
                    expires_at,
                } => {
                    return Ok(EngineReply::Confirmation(ConfirmationEnvelope {
                        prompt_id: prompt.id.clone(),
                        tool_id,
                        message,
                        expires_at,
                    }));
                }
                ScriptDisposition::Executed {
                    execution, ..
                } => {
                    script_section = Some(
                        serde_json::to_string_pretty(&execution.output)
                            .unwrap_or_else(|_| execution.stdout.clone()),
                    );
                }
            }
        }

        if plan.requires_session {
            let session = self.sessions.create_run(
                SessionBlueprint {
                    command: command.clone(),
                    plan: plan.clone(),
                },
                command.raw_args.clone(),
            )?;
            self.services.metrics.on_run_started(true);
            let now = self.services.clock.now();
            self.sessions.update(&session.run_id, |live| live.mark_step_emitted(now))?;
            let envelope = self.render_step(
                &plan,
                1,
                Some(&session),
                &command,
                &[],
                script_section.as_deref(),
            )?;
            return Ok(EngineReply::Pause(envelope));
        }

        // Ephemeral single-step run: no session is created.
        self.services.metrics.on_run_started(false);
        let envelope =
            self.render_step(&plan, 1, None, &command, &[], script_section.as_deref())?;
        Ok(EngineReply::Pause(envelope))
    }

    /// Resumes an existing run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SessionNotFound`] for unknown run ids unless
    /// `force_restart` is set, and propagates gate and persistence failures.
    pub async fn resume(&self, request: ResumeRequest) -> Result<EngineReply, EngineError> {
        self.injection.reset();

        let Some(session) = self.sessions.get(&request.chain_id)? else {
            if request.force_restart {
                let base = request.chain_id.base_part();
                let prompt_id =
                    base.as_str().strip_prefix("chain-").unwrap_or(base.as_str()).to_string();
                return Box::pin(self.execute(ExecuteRequest {
                    command: format!(">>{prompt_id}"),
                    gates: Vec::new(),
                    options: ExecuteOptions::default(),
                }))
                .await;
            }
            return Err(EngineError::SessionNotFound(request.chain_id.as_str().to_string()));
        };

        if session.status != RunStatus::Active {
            return Err(EngineError::RunNotResumable {
                id: request.chain_id.as_str().to_string(),
                status: session.status.as_str().to_string(),
            });
        }
        self.services.metrics.on_run_resumed();

        let now = self.services.clock.now();
        if let Some(output) = &request.user_response {
            self.sessions
                .update(&request.chain_id, |live| live.record_step_output(output, now))?;
        }

        let session = self
            .sessions
            .get(&request.chain_id)?
            .ok_or_else(|| EngineError::SessionNotFound(request.chain_id.as_str().to_string()))?;

        match session.pending_review.clone() {
            Some(review) => self.resume_with_review(&request, &session, review),
            None => self.resume_without_review(&request, &session),
        }
    }

    // ------------------------------------------------------------------
    // Built-in commands
    // ------------------------------------------------------------------

    /// Routes built-in commands before the parser.
    fn route_builtin(&self, command: &str) -> Result<Option<EngineReply>, EngineError> {
        let name = command.trim().trim_start_matches(">>").trim().to_lowercase();
        if !BUILTIN_COMMANDS.contains(&name.as_str()) {
            return Ok(None);
        }
        let text = match name.as_str() {
            "help" => help_text(),
            "status" => {
                let (total, active) = self.sessions.counts()?;
                format!("runs: {total} total, {active} active")
            }
            _ => {
                let mut names: Vec<String> = self
                    .services
                    .prompts
                    .list()?
                    .into_iter()
                    .map(|record| format!(">>{} - {}", record.id, record.name))
                    .collect();
                names.sort();
                names.join("\n")
            }
        };
        Ok(Some(EngineReply::Info(InfoEnvelope {
            text,
        })))
    }

    // ------------------------------------------------------------------
    // Resume paths
    // ------------------------------------------------------------------

    /// Resume when a gate review is pending on the current step.
    fn resume_with_review(
        &self,
        request: &ResumeRequest,
        session: &ChainSession,
        review: PendingGateReview,
    ) -> Result<EngineReply, EngineError> {
        let plan = &session.blueprint.plan;
        let definitions = self.step_gate_definitions(plan, session.current_step)?;
        let enforcement = resolve_enforcement(&definitions);

        let verdict = match &request.gate_verdict {
            Some(text) => Some(parse_verdict_field(text)?),
            None => request.user_response.as_deref().and_then(scan_verdict),
        };

        match verdict {
            Some(verdict) if verdict.passed => {
                let output = session
                    .current_record()
                    .and_then(|record| record.last_result.clone())
                    .unwrap_or_default();
                let mut criteria_ok = true;
                for definition in &definitions {
                    if !criteria_pass(definition, &output)? {
                        criteria_ok = false;
                        break;
                    }
                }
                if criteria_ok || enforcement != EnforcementMode::Blocking {
                    self.services.metrics.on_gate_verdict(VerdictOutcome::Pass);
                    self.advance_and_continue(session)
                } else {
                    self.record_gate_failure(
                        request,
                        session,
                        &review,
                        &definitions,
                        enforcement,
                        "pass criteria not satisfied".to_string(),
                    )
                }
            }
            Some(verdict) => self.record_gate_failure(
                request,
                session,
                &review,
                &definitions,
                enforcement,
                verdict.rationale,
            ),
            None => {
                if review.is_exhausted() {
                    match request.gate_action {
                        Some(action) => self.apply_gate_action(session, &review, action),
                        None => Ok(EngineReply::GateActionRequired(gate_action_envelope(
                            session, &review,
                        ))),
                    }
                } else {
                    Err(EngineError::Gate(GateError::InvalidVerdict(
                        "gate review pending; provide gate_verdict".to_string(),
                    )))
                }
            }
        }
    }

    /// Resume when no review is pending: record output, open a review if the
    /// step has blocking gates, otherwise advance.
    fn resume_without_review(
        &self,
        request: &ResumeRequest,
        session: &ChainSession,
    ) -> Result<EngineReply, EngineError> {
        let plan = &session.blueprint.plan;
        let definitions = self.step_gate_definitions(plan, session.current_step)?;

        if !definitions.is_empty() {
            let enforcement = resolve_enforcement(&definitions);
            let retry = resolve_retry(&definitions);
            let review = PendingGateReview {
                gate_ids: definitions.iter().map(|definition| definition.id.clone()).collect(),
                attempt: 0,
                max_attempts: retry.max_attempts,
                last_feedback: None,
            };

            if let Some(text) = &request.gate_verdict {
                // Verdict arrived together with the step output.
                let verdict = parse_verdict_field(text)?;
                if verdict.passed {
                    self.services.metrics.on_gate_verdict(VerdictOutcome::Pass);
                    return self.advance_and_continue(session);
                }
                return self.record_gate_failure(
                    request,
                    session,
                    &review,
                    &definitions,
                    enforcement,
                    verdict.rationale,
                );
            }

            if enforcement == EnforcementMode::Blocking {
                let now = self.services.clock.now();
                self.sessions.update(&session.run_id, |live| {
                    live.store_pending_review(review.clone(), now);
                })?;
                let envelope = self.render_gate_review(session, &definitions, &review)?;
                return Ok(EngineReply::Pause(envelope));
            }
        }

        self.advance_and_continue(session)
    }

    /// Records a failing verdict and either re-emits, asks for an action, or
    /// auto-continues for non-blocking gates.
    fn record_gate_failure(
        &self,
        _request: &ResumeRequest,
        session: &ChainSession,
        review: &PendingGateReview,
        definitions: &[GateDefinition],
        enforcement: EnforcementMode,
        feedback: String,
    ) -> Result<EngineReply, EngineError> {
        let now = self.services.clock.now();
        let attempt = review.attempt + 1;
        let updated = PendingGateReview {
            gate_ids: review.gate_ids.clone(),
            attempt,
            max_attempts: review.max_attempts,
            last_feedback: Some(feedback),
        };

        if attempt >= review.max_attempts {
            self.services.metrics.on_gate_verdict(VerdictOutcome::Exhausted);
            if enforcement == EnforcementMode::Blocking {
                self.sessions.update(&session.run_id, |live| {
                    live.store_pending_review(updated.clone(), now);
                })?;
                return Ok(EngineReply::GateActionRequired(gate_action_envelope(
                    session, &updated,
                )));
            }
            // Advisory and informational gates auto-continue on exhaustion.
            return self.advance_and_continue(session);
        }

        self.services.metrics.on_gate_verdict(VerdictOutcome::Fail);
        self.sessions.update(&session.run_id, |live| {
            live.store_pending_review(updated.clone(), now);
        })?;

        let retry = resolve_retry(definitions);
        let hints = if retry.improvement_hints {
            let mut hints = improvement_hints(definitions);
            if let Some(last) = &updated.last_feedback {
                hints.push(format!("reviewer feedback: {last}"));
            }
            hints
        } else {
            Vec::new()
        };
        let envelope = self.render_step(
            &session.blueprint.plan,
            session.current_step,
            Some(session),
            &session.blueprint.command,
            &hints,
            None,
        )?;
        Ok(EngineReply::Pause(envelope))
    }

    /// Applies a caller-chosen gate action after exhaustion.
    fn apply_gate_action(
        &self,
        session: &ChainSession,
        review: &PendingGateReview,
        action: GateAction,
    ) -> Result<EngineReply, EngineError> {
        let now = self.services.clock.now();
        match action {
            GateAction::Retry => {
                let reset = PendingGateReview {
                    gate_ids: review.gate_ids.clone(),
                    attempt: 0,
                    max_attempts: review.max_attempts,
                    last_feedback: review.last_feedback.clone(),
                };
                self.sessions.update(&session.run_id, |live| {
                    live.store_pending_review(reset.clone(), now);
                })?;
                let definitions =
                    self.step_gate_definitions(&session.blueprint.plan, session.current_step)?;
                let hints = improvement_hints(&definitions);
                let envelope = self.render_step(
                    &session.blueprint.plan,
                    session.current_step,
                    Some(session),
                    &session.blueprint.command,
                    &hints,
                    None,
                )?;
                Ok(EngineReply::Pause(envelope))
            }
            GateAction::Skip => {
                self.sessions.update(&session.run_id, |live| {
                    live.skip_current_step(now);
                    live.advance_step(now);
                })?;
                self.continue_after_advance(&session.run_id)
            }
            GateAction::Abort => {
                self.sessions.update(&session.run_id, |live| live.abort(now))?;
                Ok(EngineReply::Aborted(AbortEnvelope {
                    chain_id: session.run_id.clone(),
                    reason: "aborted by gate action".to_string(),
                }))
            }
        }
    }

    /// Completes the current step, advances, and emits what follows.
    fn advance_and_continue(&self, session: &ChainSession) -> Result<EngineReply, EngineError> {
        let now = self.services.clock.now();
        self.sessions.update(&session.run_id, |live| {
            live.complete_current_step(now);
            live.advance_step(now);
        })?;
        self.continue_after_advance(&session.run_id)
    }

    /// Emits the next step or the completion envelope.
    fn continue_after_advance(&self, run_id: &RunId) -> Result<EngineReply, EngineError> {
        let session = self
            .sessions
            .get(run_id)?
            .ok_or_else(|| EngineError::SessionNotFound(run_id.as_str().to_string()))?;

        if session.is_plan_exhausted() {
            self.services.metrics.on_run_completed(session.total_steps);
            let final_output = session
                .steps
                .iter()
                .rev()
                .find_map(|record| record.last_result.clone());
            return Ok(EngineReply::Completed(CompletionEnvelope {
                chain_id: Some(session.run_id.clone()),
                final_output,
                steps_completed: session.total_steps,
            }));
        }

        let now = self.services.clock.now();
        self.sessions.update(run_id, |live| live.mark_step_emitted(now))?;
        let envelope = self.render_step(
            &session.blueprint.plan,
            session.current_step,
            Some(&session),
            &session.blueprint.command,
            &[],
            None,
        )?;
        Ok(EngineReply::Pause(envelope))
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Renders a step into a pause envelope with injections applied.
    fn render_step(
        &self,
        plan: &ExecutionPlan,
        step_number: usize,
        session: Option<&ChainSession>,
        command: &ParsedCommand,
        hints: &[String],
        script_section: Option<&str>,
    ) -> Result<PauseEnvelope, EngineError> {
        let step = step_number
            .checked_sub(1)
            .and_then(|idx| plan.steps.get(idx))
            .ok_or_else(|| EngineError::PromptVanished(format!("step {step_number}")))?;
        let prompt = self.require_prompt(&step.prompt_id)?;

        // Bindings: planned args plus outputs of completed earlier steps.
        let mut bindings: BTreeMap<String, String> = step.args.clone();
        if let Some(session) = session {
            for (idx, record) in session.steps.iter().enumerate() {
                if record.state == StepState::Completed {
                    if let (Some(var), Some(result)) =
                        (plan.steps.get(idx).and_then(|s| s.output_var.clone()), &record.last_result)
                    {
                        bindings.insert(var, result.clone());
                    }
                }
            }
        }

        let ctx = DecisionContext {
            modifier: plan.modifier,
            step: step_number,
            total_steps: plan.total_steps(),
            category: Some(prompt.category.clone()),
            framework: plan.framework_override.clone(),
            phase: Some(ExecutionPhase::Step),
        };

        let mut rendered = render_template(&prompt.user_template, &bindings);

        if let Some(section) = script_section {
            rendered.push_str("\n\n## Tool Output\n");
            rendered.push_str(section);
        }

        let system_prompt = self.build_system_prompt(plan, &prompt, &ctx)?;

        let definitions = self.step_gate_definitions(plan, step_number)?;
        let gate_decision = self.injection.decide(InjectionType::GateGuidance, &ctx);
        if gate_decision.inject && !definitions.is_empty() {
            let lines: Vec<String> = definitions
                .iter()
                .map(|definition| match &definition.guidance {
                    Some(guidance) => format!("{}: {guidance}", definition.name),
                    None => definition.name.clone(),
                })
                .collect();
            let block = format_criteria(&lines);
            if !block.is_empty() {
                rendered.push_str("\n\n## Quality Gates\n");
                rendered.push_str(&block);
            }
        }

        if let Some(style) = command.style() {
            let style_decision = self.injection.decide(InjectionType::StyleGuidance, &ctx);
            if style_decision.inject {
                rendered.push_str(&style_block(style));
            }
        }

        if !hints.is_empty() {
            rendered.push_str("\n\n## Improvement Hints\n");
            rendered.push_str(&format_criteria(hints));
        }

        Ok(PauseEnvelope {
            chain_id: session.map(|live| live.run_id.clone()),
            step: step_number,
            total_steps: plan.total_steps(),
            rendered_prompt: rendered,
            system_prompt,
            awaiting_gates: definitions.iter().map(|definition| definition.id.clone()).collect(),
            improvement_hints: hints.to_vec(),
        })
    }

    /// Renders the gate-review pause for the current step.
    fn render_gate_review(
        &self,
        session: &ChainSession,
        definitions: &[GateDefinition],
        review: &PendingGateReview,
    ) -> Result<PauseEnvelope, EngineError> {
        let lines: Vec<String> = definitions
            .iter()
            .map(|definition| match &definition.guidance {
                Some(guidance) => format!("{}: {guidance}", definition.name),
                None => definition.name.clone(),
            })
            .collect();
        let mut rendered = format!(
            "Review the step {} output against the quality gates and reply with \
             'GATE_REVIEW: PASS - rationale' or 'GATE_REVIEW: FAIL - rationale'.",
            session.current_step
        );
        let block = format_criteria(&lines);
        if !block.is_empty() {
            rendered.push_str("\n\n## Quality Gates\n");
            rendered.push_str(&block);
        }
        Ok(PauseEnvelope {
            chain_id: Some(session.run_id.clone()),
            step: session.current_step,
            total_steps: session.total_steps,
            rendered_prompt: rendered,
            system_prompt: None,
            awaiting_gates: review.gate_ids.clone(),
            improvement_hints: Vec::new(),
        })
    }

    /// Builds the injected system prompt for a step.
    fn build_system_prompt(
        &self,
        plan: &ExecutionPlan,
        prompt: &PromptRecord,
        ctx: &DecisionContext,
    ) -> Result<Option<String>, EngineError> {
        let decision = self.injection.decide(InjectionType::SystemPrompt, ctx);
        if !decision.inject {
            return Ok(None);
        }
        let mut sections = Vec::new();
        if plan.requires_framework {
            if let Some(framework_id) = &plan.framework_override {
                if let Some(framework) = self.services.frameworks.get(framework_id)? {
                    sections.push(framework.system_prompt);
                }
            }
        }
        if let Some(template) = &prompt.system_template {
            sections.push(template.clone());
        }
        if sections.is_empty() {
            return Ok(None);
        }
        Ok(Some(sections.join("\n\n")))
    }

    // ------------------------------------------------------------------
    // Lookup helpers
    // ------------------------------------------------------------------

    /// Returns a prompt that must exist post-parse.
    fn require_prompt(&self, id: &PromptId) -> Result<PromptRecord, EngineError> {
        self.services
            .prompts
            .get(id)?
            .ok_or_else(|| EngineError::PromptVanished(id.as_str().to_string()))
    }

    /// Resolves gate definitions for a step: registry entries first, then
    /// plan-local quick gates.
    fn step_gate_definitions(
        &self,
        plan: &ExecutionPlan,
        step_number: usize,
    ) -> Result<Vec<GateDefinition>, EngineError> {
        let ids = plan.gates_for_step(step_number);
        let mut out: Vec<GateDefinition> = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(found) = self.lookup_gate(plan, id)? {
                out.push(found);
            }
        }
        Ok(out)
    }

    /// Looks up one gate id in the registry, then the plan's quick gates.
    fn lookup_gate(
        &self,
        plan: &ExecutionPlan,
        id: &GateId,
    ) -> Result<Option<GateDefinition>, EngineError> {
        if let Some(found) = self.services.gates.get(id)? {
            return Ok(Some(found));
        }
        Ok(plan.quick_gates.iter().find(|quick| &quick.id == id).cloned())
    }
}

// ============================================================================
// SECTION: Envelope Helpers
// ============================================================================

/// Builds a gate-action envelope from an exhausted review.
fn gate_action_envelope(session: &ChainSession, review: &PendingGateReview) -> GateActionEnvelope {
    GateActionEnvelope {
        chain_id: session.run_id.clone(),
        gate_ids: review.gate_ids.clone(),
        attempts: review.attempt,
        max_attempts: review.max_attempts,
        last_feedback: review.last_feedback.clone(),
        choices: vec![GateAction::Retry, GateAction::Skip, GateAction::Abort],
    }
}

/// Style guidance block appended to rendered steps.
fn style_block(style: &StyleId) -> String {
    format!("\n\n## Style\nRespond in the '{style}' style.")
}

/// Help text for the `help` built-in.
fn help_text() -> String {
    [
        "Command forms:",
        "  >>prompt_id arguments",
        "  /prompt_id arguments",
        "  %modifier >>prompt_id ... (one modifier per command)",
        "  @FRAMEWORK >>prompt_id ...",
        "  >>step_one --> >>step_two (chain)",
        "  >>prompt_id :: \"gate criteria\"",
        "  #style(name) to select a response style",
        "Built-ins: help, status, listprompts",
    ]
    .join("\n")
}
