// crates/conductor-mcp/src/telemetry.rs
// ============================================================================
// Module: MCP Telemetry
// Description: Observability hooks for MCP transport and tool routing.
// Purpose: Provide metric events and counters without hard dependencies.
// Dependencies: conductor-config
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for MCP request counters. It
//! is intentionally dependency-light so deployments can plug in Prometheus or
//! OpenTelemetry without redesign. Labels are fixed strings; request payloads
//! never enter metric events.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use conductor_config::ServerTransport;

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// MCP request method classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum McpMethod {
    /// JSON-RPC tools/list.
    ToolsList,
    /// JSON-RPC tools/call.
    ToolsCall,
    /// Invalid or malformed JSON-RPC request.
    Invalid,
    /// Unsupported JSON-RPC method.
    Other,
}

impl McpMethod {
    /// Returns a stable label for the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::Invalid => "invalid",
            Self::Other => "other",
        }
    }
}

/// MCP request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum McpOutcome {
    /// Successful request.
    Ok,
    /// Failed request.
    Error,
}

impl McpOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// MCP request metric event payload.
#[derive(Debug, Clone)]
pub struct McpMetricEvent {
    /// Transport used for the request.
    pub transport: ServerTransport,
    /// JSON-RPC method classification.
    pub method: McpMethod,
    /// Tool name when available.
    pub tool: Option<&'static str>,
    /// Request outcome.
    pub outcome: McpOutcome,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Request duration in milliseconds.
    pub duration_ms: u64,
}

// ============================================================================
// SECTION: Metrics Sink
// ============================================================================

/// MCP metrics sink.
pub trait McpMetrics: Send + Sync {
    /// Records one request event.
    fn record(&self, event: &McpMetricEvent);
}

/// No-op metrics sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl McpMetrics for NoopMetrics {
    fn record(&self, _event: &McpMetricEvent) {}
}

/// In-memory counting sink backing the status tool.
#[derive(Debug, Default)]
pub struct CountingMetrics {
    /// Total requests observed.
    requests: AtomicU64,
    /// Failed requests observed.
    errors: AtomicU64,
    /// Tool calls observed.
    tool_calls: AtomicU64,
}

impl CountingMetrics {
    /// Creates a zeroed counting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns (requests, errors, tool calls).
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.requests.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
            self.tool_calls.load(Ordering::Relaxed),
        )
    }
}

impl McpMetrics for CountingMetrics {
    fn record(&self, event: &McpMetricEvent) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if event.outcome == McpOutcome::Error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        if event.method == McpMethod::ToolsCall {
            self.tool_calls.fetch_add(1, Ordering::Relaxed);
        }
    }
}
