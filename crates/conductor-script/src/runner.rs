// crates/conductor-script/src/runner.rs
// ============================================================================
// Module: Default Script Runner
// Description: Matcher, confirmation tracker, and executor behind one seam.
// Purpose: Implement the engine-facing ScriptRunner contract.
// Dependencies: conductor-core, crate::{confirm, executor, matcher}
// ============================================================================

//! ## Overview
//! The default runner wires the three script subsystems together. A matched
//! tool with `confirm: true` and no explicit `tool:<id>` request goes through
//! the pending-confirmation tracker; `auto_approve_on_valid` tools run once
//! as their own validator and skip confirmation when the run reports
//! `{"valid": true}` with no warnings, in which case that run is the result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use conductor_core::PromptId;
use conductor_core::ScriptDisposition;
use conductor_core::ScriptRunError;
use conductor_core::ScriptRunner;
use conductor_core::ScriptTool;
use conductor_core::Clock;
use serde_json::Value;

use crate::confirm::ConfirmationState;
use crate::confirm::PendingConfirmationTracker;
use crate::executor::ScriptExecutor;
use crate::matcher::ToolMatch;
use crate::matcher::match_tool;

// ============================================================================
// SECTION: Default Runner
// ============================================================================

/// Default engine-facing script runner.
pub struct DefaultScriptRunner {
    /// Pending confirmation tracker.
    confirmations: PendingConfirmationTracker,
    /// Subprocess executor.
    executor: ScriptExecutor,
}

impl DefaultScriptRunner {
    /// Creates a runner with default tracker and executor.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            confirmations: PendingConfirmationTracker::new(clock),
            executor: ScriptExecutor::new(),
        }
    }

    /// Creates a runner over explicit components.
    #[must_use]
    pub const fn with_components(
        confirmations: PendingConfirmationTracker,
        executor: ScriptExecutor,
    ) -> Self {
        Self {
            confirmations,
            executor,
        }
    }

    /// Returns the confirmation tracker for status surfaces.
    #[must_use]
    pub const fn confirmations(&self) -> &PendingConfirmationTracker {
        &self.confirmations
    }

    /// Runs a matched tool and wraps the result.
    async fn run_matched(
        &self,
        prompt_id: &PromptId,
        matched: &ToolMatch,
    ) -> Result<ScriptDisposition, ScriptRunError> {
        let execution = self
            .executor
            .execute(prompt_id, &matched.tool, &matched.inputs, &BTreeMap::new(), None)
            .await?;
        Ok(ScriptDisposition::Executed {
            tool_id: matched.tool.id.clone(),
            execution,
        })
    }
}

#[async_trait::async_trait]
impl ScriptRunner for DefaultScriptRunner {
    async fn run_for_prompt(
        &self,
        prompt_id: &PromptId,
        tools: &[ScriptTool],
        raw_args: &str,
        bindings: &BTreeMap<String, String>,
    ) -> Result<ScriptDisposition, ScriptRunError> {
        let Some(matched) = match_tool(tools, raw_args, bindings)? else {
            return Ok(ScriptDisposition::NoMatch);
        };

        let needs_confirmation = matched.tool.execution.confirm && !matched.explicit;
        if !needs_confirmation {
            return self.run_matched(prompt_id, &matched).await;
        }

        if matched.tool.execution.auto_approve_on_valid {
            let execution = self
                .executor
                .execute(prompt_id, &matched.tool, &matched.inputs, &BTreeMap::new(), None)
                .await?;
            if execution.success && validator_approves(&execution.output) {
                return Ok(ScriptDisposition::Executed {
                    tool_id: matched.tool.id.clone(),
                    execution,
                });
            }
        }

        match self
            .confirmations
            .check_and_record(prompt_id, &matched.tool.id, &matched.inputs)
        {
            ConfirmationState::Approved => self.run_matched(prompt_id, &matched).await,
            ConfirmationState::Recorded {
                expires_at,
            } => Ok(ScriptDisposition::NeedsConfirmation {
                tool_id: matched.tool.id.clone(),
                message: matched
                    .tool
                    .execution
                    .confirm_message
                    .clone()
                    .unwrap_or_else(|| {
                        format!(
                            "Run tool '{}' with these inputs? Re-run the identical command \
                             within 5 minutes to confirm.",
                            matched.tool.name
                        )
                    }),
                expires_at,
            }),
        }
    }
}

// ============================================================================
// SECTION: Validator Output
// ============================================================================

/// Returns true when a validator run reports valid with no warnings.
fn validator_approves(output: &Value) -> bool {
    let valid = output.get("valid").and_then(Value::as_bool) == Some(true);
    let warnings_clear = match output.get("warnings") {
        None => true,
        Some(Value::Array(entries)) => entries.is_empty(),
        Some(Value::Null) => true,
        Some(_) => false,
    };
    valid && warnings_clear
}
