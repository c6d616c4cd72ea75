// crates/conductor-mcp/src/tools.rs
// ============================================================================
// Module: MCP Tool Router
// Description: Tool contracts and routing for the Conductor MCP server.
// Purpose: Expose thin wrappers over the prompt engine and authoring manager.
// Dependencies: conductor-core, serde_json
// ============================================================================

//! ## Overview
//! The tool router dispatches MCP tool calls to the prompt engine and the
//! authoring manager. Tool inputs are untrusted: payloads are decoded into
//! typed requests and every failure is reported in the uniform error
//! envelope (`isError: true` with code, severity, and suggested actions)
//! rather than crossing the boundary as an exception.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use conductor_core::EngineError;
use conductor_core::EngineReply;
use conductor_core::ExecuteOptions;
use conductor_core::ExecuteRequest;
use conductor_core::GateAction;
use conductor_core::GateError;
use conductor_core::ParseError;
use conductor_core::PromptEngine;
use conductor_core::PromptId;
use conductor_core::PromptRecord;
use conductor_core::QuickGateSpec;
use conductor_core::ResumeRequest;
use conductor_core::RunId;
use conductor_core::SessionError;
use conductor_core::runtime::AuthoringError;
use conductor_core::runtime::PromptManager;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::telemetry::CountingMetrics;

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Closed set of MCP tools exposed by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ToolName {
    /// Start or resume a run.
    ConductorExecute,
    /// Authoring CRUD and version history.
    ConductorManage,
    /// Analytics snapshot.
    ConductorStatus,
}

impl ToolName {
    /// Parses a wire tool name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "conductor_execute" => Some(Self::ConductorExecute),
            "conductor_manage" => Some(Self::ConductorManage),
            "conductor_status" => Some(Self::ConductorStatus),
            _ => None,
        }
    }

    /// Returns the stable wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConductorExecute => "conductor_execute",
            Self::ConductorManage => "conductor_manage",
            Self::ConductorStatus => "conductor_status",
        }
    }
}

/// Tool definition shape used by MCP tool listings.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Wire tool name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// JSON Schema for the tool input.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Returns the canonical tool definitions.
///
/// The order is intentional and preserved in listings; append new tools at
/// the end.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: ToolName::ConductorExecute.as_str(),
            description: "Execute a prompt command or resume a paused run. Provide 'command' \
                          to start, or 'chain_id' with user_response/gate_verdict/gate_action \
                          to resume.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "chain_id": {"type": "string"},
                    "user_response": {"type": "string"},
                    "gate_verdict": {"type": "string"},
                    "gate_action": {"type": "string", "enum": ["retry", "skip", "abort"]},
                    "force_restart": {"type": "boolean"},
                    "gates": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": {"type": "string"},
                                "description": {"type": "string"},
                                "apply_to_steps": {
                                    "type": "array",
                                    "items": {"type": "integer"}
                                }
                            },
                            "required": ["name", "description"]
                        }
                    },
                    "options": {
                        "type": "object",
                        "properties": {
                            "explicit_gate_request": {"type": "boolean"}
                        }
                    }
                }
            }),
        },
        ToolDefinition {
            name: ToolName::ConductorManage.as_str(),
            description: "Manage the prompt catalog: list, inspect, create, update, delete, \
                          reload, history, rollback, compare.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": [
                            "list", "inspect", "create", "update", "delete",
                            "reload", "history", "rollback", "compare"
                        ]
                    },
                    "id": {"type": "string"},
                    "prompt": {"type": "object"},
                    "version": {"type": "integer"},
                    "from": {"type": "integer"},
                    "to": {"type": "integer"},
                    "confirm": {"type": "boolean"}
                },
                "required": ["action"]
            }),
        },
        ToolDefinition {
            name: ToolName::ConductorStatus.as_str(),
            description: "Report run counts and request counters.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
    ]
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool routing errors.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool name did not resolve.
    #[error("unknown tool")]
    UnknownTool,
    /// Payload decoding failed.
    #[error("invalid tool payload: {0}")]
    Decode(String),
    /// Engine failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Authoring failure.
    #[error(transparent)]
    Authoring(#[from] AuthoringError),
    /// Session registry failure.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Response serialization failed.
    #[error("response serialization failed")]
    Serialization,
}

impl ToolError {
    /// Returns the stable error code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::UnknownTool => -32601,
            Self::Decode(_) => -32602,
            Self::Engine(_) => -32010,
            Self::Authoring(_) => -32011,
            Self::Session(_) => -32012,
            Self::Serialization => -32060,
        }
    }

    /// Returns the severity label for the error envelope.
    #[must_use]
    pub fn severity(&self) -> &'static str {
        match self {
            Self::UnknownTool | Self::Decode(_) => "warning",
            Self::Engine(EngineError::Parse(_) | EngineError::Gate(_)) => "warning",
            Self::Serialization => "critical",
            _ => "error",
        }
    }

    /// Returns suggested actions for the error envelope.
    #[must_use]
    pub fn suggested_actions(&self) -> Vec<String> {
        match self {
            Self::UnknownTool => {
                vec!["call tools/list to see the available tools".to_string()]
            }
            Self::Engine(EngineError::Parse(ParseError::UnknownPrompt {
                suggestions,
                hint,
                ..
            })) => {
                let mut actions: Vec<String> = suggestions
                    .iter()
                    .map(|candidate| format!("did you mean '>>{candidate}'?"))
                    .collect();
                if let Some(hint) = hint {
                    actions.push(hint.clone());
                }
                actions
            }
            Self::Engine(EngineError::Parse(_)) => vec![
                "command forms: >>prompt args, %modifier >>prompt, >>a --> >>b, \
                 >>prompt :: \"criteria\""
                    .to_string(),
            ],
            Self::Engine(EngineError::Gate(GateError::InvalidVerdict(_))) => vec![
                "use the canonical form 'GATE_REVIEW: PASS|FAIL - rationale'".to_string(),
            ],
            Self::Engine(EngineError::SessionNotFound(_)) => vec![
                "start a new run with 'command', or pass force_restart=true".to_string(),
            ],
            _ => Vec::new(),
        }
    }

    /// Builds the uniform error envelope.
    #[must_use]
    pub fn envelope(&self) -> Value {
        json!({
            "isError": true,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "severity": self.severity(),
                "suggestedActions": self.suggested_actions(),
            }
        })
    }
}

// ============================================================================
// SECTION: Tool Requests
// ============================================================================

/// Options payload for the execute tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteToolOptions {
    /// Marks the context as an explicit gate request.
    #[serde(default)]
    pub explicit_gate_request: bool,
}

/// Execute tool payload: either a new command or a resume.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteToolRequest {
    /// Command string starting a new run.
    #[serde(default)]
    pub command: Option<String>,
    /// Run id resuming an existing run.
    #[serde(default)]
    pub chain_id: Option<String>,
    /// Completed step output.
    #[serde(default)]
    pub user_response: Option<String>,
    /// Gate verdict text.
    #[serde(default)]
    pub gate_verdict: Option<String>,
    /// Gate action after exhaustion.
    #[serde(default)]
    pub gate_action: Option<GateAction>,
    /// Fall through to execute when the run is missing.
    #[serde(default)]
    pub force_restart: bool,
    /// Caller-supplied quick gates.
    #[serde(default)]
    pub gates: Vec<QuickGateSpec>,
    /// Execution options.
    #[serde(default)]
    pub options: Option<ExecuteToolOptions>,
}

/// Manage tool payload, one variant per action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManageToolRequest {
    /// List every prompt.
    List,
    /// Inspect one prompt.
    Inspect {
        /// Prompt identifier.
        id: String,
    },
    /// Create a prompt.
    Create {
        /// Prompt record.
        prompt: PromptRecord,
    },
    /// Update a prompt.
    Update {
        /// Prompt record.
        prompt: PromptRecord,
    },
    /// Delete a prompt.
    Delete {
        /// Prompt identifier.
        id: String,
    },
    /// Reload the catalog from disk.
    Reload,
    /// Version history for a prompt.
    History {
        /// Prompt identifier.
        id: String,
    },
    /// Roll a prompt back to an earlier version.
    Rollback {
        /// Prompt identifier.
        id: String,
        /// Target version.
        version: u32,
        /// Required confirmation flag.
        #[serde(default)]
        confirm: bool,
    },
    /// Compare two versions of a prompt.
    Compare {
        /// Prompt identifier.
        id: String,
        /// Source version.
        from: u32,
        /// Target version.
        to: u32,
    },
}

/// Status tool response.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Total runs in the registry.
    pub runs_total: usize,
    /// Active runs.
    pub runs_active: usize,
    /// Requests observed since start.
    pub requests: u64,
    /// Failed requests observed since start.
    pub errors: u64,
    /// Tool calls observed since start.
    pub tool_calls: u64,
}

// ============================================================================
// SECTION: Tool Router
// ============================================================================

/// Tool router for MCP requests.
#[derive(Clone)]
pub struct ToolRouter {
    /// Prompt engine, the single canonical execution path.
    engine: Arc<PromptEngine>,
    /// Authoring manager.
    manager: Arc<dyn PromptManager + Send + Sync>,
    /// Request counters backing the status tool.
    counters: Arc<CountingMetrics>,
}

impl ToolRouter {
    /// Creates a router.
    #[must_use]
    pub fn new(
        engine: Arc<PromptEngine>,
        manager: Arc<dyn PromptManager + Send + Sync>,
        counters: Arc<CountingMetrics>,
    ) -> Self {
        Self {
            engine,
            manager,
            counters,
        }
    }

    /// Lists the MCP tools supported by this server.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Handles a tool call by name with JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when routing, decoding, or execution fails.
    pub async fn handle_tool_call(&self, name: &str, payload: Value) -> Result<Value, ToolError> {
        let tool = ToolName::parse(name).ok_or(ToolError::UnknownTool)?;
        match tool {
            ToolName::ConductorExecute => {
                let request = decode::<ExecuteToolRequest>(payload)?;
                let reply = self.execute(request).await?;
                serde_json::to_value(reply).map_err(|_| ToolError::Serialization)
            }
            ToolName::ConductorManage => {
                let request = decode::<ManageToolRequest>(payload)?;
                let response = self.manage(&request)?;
                Ok(response)
            }
            ToolName::ConductorStatus => {
                let response = self.status()?;
                serde_json::to_value(response).map_err(|_| ToolError::Serialization)
            }
        }
    }

    /// Routes the execute tool to the engine.
    async fn execute(&self, request: ExecuteToolRequest) -> Result<EngineReply, ToolError> {
        match (request.command, request.chain_id) {
            (Some(command), None) => {
                let reply = self
                    .engine
                    .execute(ExecuteRequest {
                        command,
                        gates: request.gates,
                        options: ExecuteOptions {
                            explicit_gate_request: request
                                .options
                                .is_some_and(|options| options.explicit_gate_request),
                        },
                    })
                    .await?;
                Ok(reply)
            }
            (None, Some(chain_id)) => {
                let reply = self
                    .engine
                    .resume(ResumeRequest {
                        chain_id: RunId::new(chain_id),
                        user_response: request.user_response,
                        gate_verdict: request.gate_verdict,
                        gate_action: request.gate_action,
                        force_restart: request.force_restart,
                    })
                    .await?;
                Ok(reply)
            }
            (Some(_), Some(_)) => Err(ToolError::Decode(
                "provide either 'command' or 'chain_id', not both".to_string(),
            )),
            (None, None) => Err(ToolError::Decode(
                "provide 'command' to start or 'chain_id' to resume".to_string(),
            )),
        }
    }

    /// Routes the manage tool to the authoring manager.
    fn manage(&self, request: &ManageToolRequest) -> Result<Value, ToolError> {
        let value = match request {
            ManageToolRequest::List => serde_json::to_value(self.manager.list()?),
            ManageToolRequest::Inspect {
                id,
            } => serde_json::to_value(self.manager.inspect(&PromptId::normalize(id))?),
            ManageToolRequest::Create {
                prompt,
            } => {
                self.manager.create(prompt.clone())?;
                Ok(json!({"created": prompt.id}))
            }
            ManageToolRequest::Update {
                prompt,
            } => {
                self.manager.update(prompt.clone())?;
                Ok(json!({"updated": prompt.id}))
            }
            ManageToolRequest::Delete {
                id,
            } => {
                self.manager.delete(&PromptId::normalize(id))?;
                Ok(json!({"deleted": id}))
            }
            ManageToolRequest::Reload => {
                let count = self.manager.reload()?;
                Ok(json!({"reloaded": count}))
            }
            ManageToolRequest::History {
                id,
            } => serde_json::to_value(self.manager.history(&PromptId::normalize(id))?),
            ManageToolRequest::Rollback {
                id,
                version,
                confirm,
            } => {
                self.manager.rollback(&PromptId::normalize(id), *version, *confirm)?;
                Ok(json!({"rolled_back": id, "version": version}))
            }
            ManageToolRequest::Compare {
                id,
                from,
                to,
            } => serde_json::to_value(self.manager.compare(
                &PromptId::normalize(id),
                *from,
                *to,
            )?),
        };
        value.map_err(|_| ToolError::Serialization)
    }

    /// Builds the status snapshot.
    fn status(&self) -> Result<StatusResponse, ToolError> {
        let (runs_total, runs_active) = self.engine.sessions().counts()?;
        let (requests, errors, tool_calls) = self.counters.snapshot();
        Ok(StatusResponse {
            runs_total,
            runs_active,
            requests,
            errors,
            tool_calls,
        })
    }
}

/// Decodes a typed request from the payload.
fn decode<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, ToolError> {
    serde_json::from_value(payload).map_err(|err| ToolError::Decode(err.to_string()))
}
