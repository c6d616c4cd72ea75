// crates/conductor-config/src/lib.rs
// ============================================================================
// Module: Conductor Config Library
// Description: Configuration loading and validation for Prompt Conductor.
// Purpose: Expose the configuration model to the server and CLI.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! Configuration for the Conductor server: transport, on-disk layout, and
//! semantic-analysis knobs. Every field has a serde default and validation
//! fails closed before anything starts serving.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AnalysisConfig;
pub use config::ConductorConfig;
pub use config::ConfigError;
pub use config::ENV_RESOURCES_PATH;
pub use config::ENV_SERVER_ROOT;
pub use config::PathsConfig;
pub use config::ServerConfig;
pub use config::ServerTransport;
