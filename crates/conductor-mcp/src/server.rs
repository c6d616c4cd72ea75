// crates/conductor-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: JSON-RPC 2.0 server over stdio and HTTP transports.
// Purpose: Expose the Conductor tools to an LLM host.
// Dependencies: conductor-config, conductor-core, conductor-script, axum, tokio
// ============================================================================

//! ## Overview
//! The server speaks JSON-RPC 2.0 with the `tools/list` and `tools/call`
//! methods. Stdio framing is newline-delimited (one request per line) with
//! stdout reserved for the protocol; HTTP accepts POSTs on `/rpc`. All calls
//! route through [`crate::tools::ToolRouter`], and tool-level failures are
//! reported inside the result envelope rather than as transport errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use conductor_config::ConductorConfig;
use conductor_config::ServerTransport;
use conductor_core::EngineConfig;
use conductor_core::EngineServices;
use conductor_core::InjectionSettings;
use conductor_core::NoopEngineMetrics;
use conductor_core::PromptEngine;
use conductor_core::SystemClock;
use conductor_script::DefaultScriptRunner;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;

use crate::audit::McpAuditEvent;
use crate::audit::McpAuditSink;
use crate::audit::StderrAuditSink;
use crate::manager::FilePromptManager;
use crate::registry::BuiltinFrameworkRegistry;
use crate::registry::FileGateRegistry;
use crate::registry::FilePromptRegistry;
use crate::registry::FileScriptToolRegistry;
use crate::session_storage::FileSessionStore;
use crate::telemetry::CountingMetrics;
use crate::telemetry::McpMethod;
use crate::telemetry::McpMetricEvent;
use crate::telemetry::McpMetrics;
use crate::telemetry::McpOutcome;
use crate::tools::ToolDefinition;
use crate::tools::ToolName;
use crate::tools::ToolRouter;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, Error)]
pub enum McpServerError {
    /// Configuration problem discovered at startup.
    #[error("server config error: {0}")]
    Config(String),
    /// Initialization failure.
    #[error("server init error: {0}")]
    Init(String),
    /// Transport failure.
    #[error("server transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: ConductorConfig,
    /// Tool router for request dispatch.
    router: ToolRouter,
    /// Metrics sink for observability.
    metrics: Arc<dyn McpMetrics>,
    /// Audit sink for request logging.
    audit: Arc<dyn McpAuditSink>,
    /// Startup warnings from catalog loading.
    warnings: Vec<String>,
}

impl McpServer {
    /// Builds a server from configuration, wiring registries into the engine.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when catalogs cannot be scanned or the
    /// session registry cannot be loaded.
    pub fn from_config(config: ConductorConfig) -> Result<Self, McpServerError> {
        let clock = Arc::new(SystemClock);

        let prompts = Arc::new(
            FilePromptRegistry::load_with_resources(
                config.paths.prompts_path(),
                config.paths.resources_dir.clone(),
            )
            .map_err(|err| McpServerError::Init(err.to_string()))?,
        );
        let gates = Arc::new(
            FileGateRegistry::load(config.paths.gates_path())
                .map_err(|err| McpServerError::Init(err.to_string()))?,
        );
        let tools = Arc::new(
            FileScriptToolRegistry::load(&config.paths.prompts_path())
                .map_err(|err| McpServerError::Init(err.to_string()))?,
        );
        let store = Arc::new(FileSessionStore::new(config.paths.session_registry_path()));

        let mut warnings = prompts.load_warnings();
        warnings.extend(gates.load_warnings());
        warnings.extend(tools.load_warnings());
        warnings.extend(store.load_warnings());

        let services = EngineServices {
            prompts: prompts.clone(),
            gates,
            frameworks: Arc::new(BuiltinFrameworkRegistry),
            tools,
            scripts: Arc::new(DefaultScriptRunner::new(clock.clone())),
            analyzer: None,
            metrics: Arc::new(NoopEngineMetrics),
            clock: clock.clone(),
        };
        let engine = PromptEngine::new(
            services,
            store,
            InjectionSettings::default(),
            EngineConfig {
                min_framework_confidence: config.analysis.min_framework_confidence,
            },
        )
        .map_err(|err| McpServerError::Init(err.to_string()))?;

        let manager = Arc::new(FilePromptManager::new(prompts, clock));
        let counters = Arc::new(CountingMetrics::new());
        let router = ToolRouter::new(Arc::new(engine), manager, counters.clone());

        Ok(Self {
            config,
            router,
            metrics: counters,
            audit: Arc::new(StderrAuditSink),
            warnings,
        })
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn McpMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn McpAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns startup warnings from catalog loading.
    #[must_use]
    pub fn startup_warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Serves the configured transport until the host disconnects.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] on transport failure.
    pub async fn serve(self) -> Result<(), McpServerError> {
        match self.config.server.transport {
            ServerTransport::Stdio => self.serve_stdio().await,
            ServerTransport::Http => self.serve_http().await,
        }
    }

    // ------------------------------------------------------------------
    // Stdio transport
    // ------------------------------------------------------------------

    /// Serves newline-delimited JSON-RPC over stdin/stdout.
    async fn serve_stdio(self) -> Result<(), McpServerError> {
        let state = ServerState {
            router: self.router,
            metrics: self.metrics,
            audit: self.audit,
            transport: ServerTransport::Stdio,
            max_body_bytes: self.config.server.max_body_bytes,
        };
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            let (_, response) = handle_raw(&state, line.as_bytes()).await;
            let mut payload = serde_json::to_vec(&response)
                .map_err(|_| McpServerError::Transport("response serialization".to_string()))?;
            payload.push(b'\n');
            stdout
                .write_all(&payload)
                .await
                .map_err(|err| McpServerError::Transport(format!("stdout write: {err}")))?;
            stdout
                .flush()
                .await
                .map_err(|err| McpServerError::Transport(format!("stdout flush: {err}")))?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // HTTP transport
    // ------------------------------------------------------------------

    /// Serves JSON-RPC over HTTP POST `/rpc`.
    async fn serve_http(self) -> Result<(), McpServerError> {
        let bind = self
            .config
            .server
            .bind
            .as_ref()
            .ok_or_else(|| McpServerError::Config("bind address required".to_string()))?;
        let addr: SocketAddr = bind
            .parse()
            .map_err(|_| McpServerError::Config("invalid bind address".to_string()))?;
        let state = Arc::new(ServerState {
            router: self.router,
            metrics: self.metrics,
            audit: self.audit,
            transport: ServerTransport::Http,
            max_body_bytes: self.config.server.max_body_bytes,
        });
        let app = Router::new().route("/rpc", post(handle_http)).with_state(state);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| McpServerError::Transport(format!("http bind: {err}")))?;
        axum::serve(listener, app)
            .await
            .map_err(|err| McpServerError::Transport(format!("http server: {err}")))
    }
}

// ============================================================================
// SECTION: Shared Server State
// ============================================================================

/// Shared request-handling state.
struct ServerState {
    /// Tool router for request dispatch.
    router: ToolRouter,
    /// Metrics sink.
    metrics: Arc<dyn McpMetrics>,
    /// Audit sink.
    audit: Arc<dyn McpAuditSink>,
    /// Transport label for telemetry.
    transport: ServerTransport,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

/// HTTP handler delegating to the shared dispatch path.
async fn handle_http(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> (StatusCode, axum::Json<JsonRpcResponse>) {
    let (status, response) = handle_raw(&state, &body).await;
    (status, axum::Json(response))
}

// ============================================================================
// SECTION: JSON-RPC Handling
// ============================================================================

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier.
    id: Value,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
}

/// Tool call parameters for JSON-RPC requests.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
}

/// Tool list response payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<ToolDefinition>,
}

/// Tool call response payload.
#[derive(Debug, Serialize)]
struct ToolCallResult {
    /// Tool output content.
    content: Vec<ToolContent>,
}

/// Tool output payloads for JSON-RPC responses.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolContent {
    /// JSON tool output.
    Json {
        /// JSON payload.
        json: Value,
    },
}

/// Parses and dispatches one raw request body.
async fn handle_raw(state: &ServerState, body: &[u8]) -> (StatusCode, JsonRpcResponse) {
    let started = Instant::now();

    if body.len() > state.max_body_bytes {
        let response = error_response(Value::Null, -32600, "request body too large");
        record(state, McpMethod::Invalid, None, &response, started);
        return (StatusCode::PAYLOAD_TOO_LARGE, response);
    }

    let request: JsonRpcRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(err) => {
            let response =
                error_response(Value::Null, -32700, &format!("parse error: {err}"));
            record(state, McpMethod::Invalid, None, &response, started);
            return (StatusCode::BAD_REQUEST, response);
        }
    };

    if request.jsonrpc != "2.0" {
        let response = error_response(request.id, -32600, "invalid json-rpc version");
        record(state, McpMethod::Invalid, None, &response, started);
        return (StatusCode::BAD_REQUEST, response);
    }

    match request.method.as_str() {
        "tools/list" => {
            let result = ToolListResult {
                tools: state.router.list_tools(),
            };
            let response = result_response(request.id, &result);
            record(state, McpMethod::ToolsList, None, &response, started);
            (StatusCode::OK, response)
        }
        "tools/call" => {
            let params: ToolCallParams =
                match serde_json::from_value(request.params.unwrap_or(Value::Null)) {
                    Ok(params) => params,
                    Err(err) => {
                        let response = error_response(
                            request.id,
                            -32602,
                            &format!("invalid params: {err}"),
                        );
                        record(state, McpMethod::ToolsCall, None, &response, started);
                        return (StatusCode::BAD_REQUEST, response);
                    }
                };
            let tool_name = params.name.clone();
            // Tool-level failures stay inside the result envelope.
            let json = match state.router.handle_tool_call(&params.name, params.arguments).await
            {
                Ok(value) => value,
                Err(error) => error.envelope(),
            };
            let result = ToolCallResult {
                content: vec![ToolContent::Json {
                    json,
                }],
            };
            let response = result_response(request.id, &result);
            record(state, McpMethod::ToolsCall, Some(tool_name), &response, started);
            (StatusCode::OK, response)
        }
        _ => {
            let response = error_response(request.id, -32601, "method not found");
            record(state, McpMethod::Other, None, &response, started);
            (StatusCode::NOT_FOUND, response)
        }
    }
}

/// Builds a success response.
fn result_response<T: Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: serde_json::to_value(result).ok(),
        error: None,
    }
}

/// Builds an error response.
fn error_response(id: Value, code: i64, message: &str) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.to_string(),
        }),
    }
}

/// Records metrics and audit for one request.
fn record(
    state: &ServerState,
    method: McpMethod,
    tool: Option<String>,
    response: &JsonRpcResponse,
    started: Instant,
) {
    let outcome = if response.error.is_some() { McpOutcome::Error } else { McpOutcome::Ok };
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    state.metrics.record(&McpMetricEvent {
        transport: state.transport,
        method,
        tool: tool.as_deref().and_then(ToolName::parse).map(ToolName::as_str),
        outcome,
        error_code: response.error.as_ref().map(|error| error.code),
        duration_ms,
    });
    state.audit.record(&McpAuditEvent {
        transport: state.transport,
        method: method.as_str().to_string(),
        tool,
        outcome: outcome.as_str(),
        error_code: response.error.as_ref().map(|error| error.code),
        duration_ms,
    });
}
