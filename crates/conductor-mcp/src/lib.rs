// crates/conductor-mcp/src/lib.rs
// ============================================================================
// Module: Conductor MCP Library
// Description: MCP server, tool router, and file-backed catalogs.
// Purpose: Expose the Conductor execution plane over JSON-RPC 2.0.
// Dependencies: conductor-config, conductor-core, conductor-script
// ============================================================================

//! ## Overview
//! This crate is the serving layer: JSON-RPC transports (stdio, HTTP), the
//! tool router, the file-backed prompt/gate/script-tool catalogs, the atomic
//! session store, and the authoring manager. The core stays
//! filesystem-agnostic; everything on-disk lives here.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod manager;
pub mod registry;
pub mod server;
pub mod session_storage;
pub mod telemetry;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::McpAuditEvent;
pub use audit::McpAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use manager::FilePromptManager;
pub use registry::BuiltinFrameworkRegistry;
pub use registry::FileGateRegistry;
pub use registry::FilePromptRegistry;
pub use registry::FileScriptToolRegistry;
pub use registry::builtin_frameworks;
pub use server::McpServer;
pub use server::McpServerError;
pub use session_storage::FileSessionStore;
pub use telemetry::CountingMetrics;
pub use telemetry::McpMethod;
pub use telemetry::McpMetricEvent;
pub use telemetry::McpMetrics;
pub use telemetry::McpOutcome;
pub use telemetry::NoopMetrics;
pub use tools::ExecuteToolRequest;
pub use tools::ManageToolRequest;
pub use tools::StatusResponse;
pub use tools::ToolDefinition;
pub use tools::ToolError;
pub use tools::ToolName;
pub use tools::ToolRouter;
pub use tools::tool_definitions;
