// crates/conductor-script/src/lib.rs
// ============================================================================
// Module: Conductor Script Library
// Description: Script tool matching, confirmation, and execution.
// Purpose: Run developer-authored prompt tools as bounded subprocesses.
// Dependencies: conductor-core, jsonschema, serde_jcs, sha2, tokio
// ============================================================================

//! ## Overview
//! Prompts may declare script tools; this crate decides which tool matches a
//! request, enforces single-use confirmation, and executes the script as a
//! subprocess with a filtered environment and enforced timeout. The engine
//! consumes all of it through [`conductor_core::ScriptRunner`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod confirm;
pub mod executor;
pub mod matcher;
pub mod runner;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use confirm::ConfirmationState;
pub use confirm::DEFAULT_CONFIRMATION_TTL_MS;
pub use confirm::PendingConfirmationTracker;
pub use confirm::canonical_hash;
pub use executor::DEFAULT_TIMEOUT_MS;
pub use executor::MAX_TIMEOUT_MS;
pub use executor::ScriptExecutor;
pub use executor::effective_timeout;
pub use executor::resolve_runtime;
pub use executor::runtime_program;
pub use matcher::ToolMatch;
pub use matcher::coerce_inputs;
pub use matcher::has_explicit_token;
pub use matcher::match_tool;
pub use runner::DefaultScriptRunner;
