// crates/conductor-mcp/src/audit.rs
// ============================================================================
// Module: MCP Audit
// Description: Request audit events and pluggable sinks.
// Purpose: Record who called which tool with what outcome.
// Dependencies: conductor-config, serde_json
// ============================================================================

//! ## Overview
//! Audit events are one JSON line per request. Sinks are pluggable: the
//! default stderr sink suits stdio deployments where stdout carries the
//! protocol, and the no-op sink disables auditing. Payload bodies are never
//! audited; only method, tool, and outcome labels are.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;

use conductor_config::ServerTransport;
use serde::Serialize;

// ============================================================================
// SECTION: Audit Events
// ============================================================================

/// One request audit event.
#[derive(Debug, Clone, Serialize)]
pub struct McpAuditEvent {
    /// Transport used for the request.
    pub transport: ServerTransport,
    /// JSON-RPC method name.
    pub method: String,
    /// Tool name when the method was tools/call.
    pub tool: Option<String>,
    /// Outcome label.
    pub outcome: &'static str,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Request duration in milliseconds.
    pub duration_ms: u64,
}

// ============================================================================
// SECTION: Audit Sinks
// ============================================================================

/// Audit sink for request logging.
pub trait McpAuditSink: Send + Sync {
    /// Records one audit event.
    fn record(&self, event: &McpAuditEvent);
}

/// No-op audit sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl McpAuditSink for NoopAuditSink {
    fn record(&self, _event: &McpAuditEvent) {}
}

/// Stderr audit sink emitting one JSON line per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrAuditSink;

impl McpAuditSink for StderrAuditSink {
    #[allow(clippy::print_stderr, reason = "Stderr is the audit channel for stdio servers.")]
    fn record(&self, event: &McpAuditEvent) {
        if let Ok(line) = serde_json::to_string(event) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{line}");
        }
    }
}
