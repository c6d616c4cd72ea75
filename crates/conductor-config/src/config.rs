// crates/conductor-config/src/config.rs
// ============================================================================
// Module: Conductor Configuration
// Description: Server, path, analysis, and injection configuration.
// Purpose: Load, default, and validate the server configuration.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Configuration is TOML with serde defaults for every field, so an empty
//! file is a valid configuration. Environment variables override the search
//! roots: `MCP_SERVER_ROOT` for prompt and gate definitions,
//! `MCP_RESOURCES_PATH` for user-created prompt data. Validation fails
//! closed before a server starts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Environment variable overriding the definition search root.
pub const ENV_SERVER_ROOT: &str = "MCP_SERVER_ROOT";

/// Environment variable overriding the user resources directory.
pub const ENV_RESOURCES_PATH: &str = "MCP_RESOURCES_PATH";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("config io error: {0}")]
    Io(String),
    /// Parsing the configuration failed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Validation failed.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Server Section
// ============================================================================

/// Server transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// Newline-delimited JSON-RPC over stdin/stdout.
    #[default]
    Stdio,
    /// JSON-RPC over HTTP POST.
    Http,
}

/// Server section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Transport to serve.
    #[serde(default)]
    pub transport: ServerTransport,
    /// Bind address for the HTTP transport.
    #[serde(default)]
    pub bind: Option<String>,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: ServerTransport::default(),
            bind: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Default maximum request body size: 1 MiB.
const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

// ============================================================================
// SECTION: Paths Section
// ============================================================================

/// On-disk layout section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Search root for prompt and gate definitions.
    #[serde(default = "default_server_root")]
    pub server_root: PathBuf,
    /// Prompt catalog directory below the server root.
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,
    /// Gate catalog directory below the server root.
    #[serde(default = "default_gates_dir")]
    pub gates_dir: String,
    /// Runtime state directory below the server root.
    #[serde(default = "default_runtime_state_dir")]
    pub runtime_state_dir: String,
    /// Optional user data directory for created prompts.
    #[serde(default)]
    pub resources_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            server_root: default_server_root(),
            prompts_dir: default_prompts_dir(),
            gates_dir: default_gates_dir(),
            runtime_state_dir: default_runtime_state_dir(),
            resources_dir: None,
        }
    }
}

impl PathsConfig {
    /// Returns the absolute prompt catalog directory.
    #[must_use]
    pub fn prompts_path(&self) -> PathBuf {
        self.server_root.join(&self.prompts_dir)
    }

    /// Returns the absolute gate catalog directory.
    #[must_use]
    pub fn gates_path(&self) -> PathBuf {
        self.server_root.join(&self.gates_dir)
    }

    /// Returns the absolute runtime state directory.
    #[must_use]
    pub fn runtime_state_path(&self) -> PathBuf {
        self.server_root.join(&self.runtime_state_dir)
    }

    /// Returns the session registry document path.
    #[must_use]
    pub fn session_registry_path(&self) -> PathBuf {
        self.runtime_state_path().join("chain-sessions.json")
    }
}

/// Default definition search root.
fn default_server_root() -> PathBuf {
    PathBuf::from(".")
}

/// Default prompts directory name.
fn default_prompts_dir() -> String {
    "prompts".to_string()
}

/// Default gates directory name.
fn default_gates_dir() -> String {
    "gates".to_string()
}

/// Default runtime state directory name.
fn default_runtime_state_dir() -> String {
    "runtime-state".to_string()
}

// ============================================================================
// SECTION: Analysis Section
// ============================================================================

/// Semantic analysis section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Whether the semantic analyzer is consulted.
    #[serde(default)]
    pub enabled: bool,
    /// Minimum confidence for a framework recommendation to bind.
    #[serde(default = "default_min_framework_confidence")]
    pub min_framework_confidence: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_framework_confidence: default_min_framework_confidence(),
        }
    }
}

/// Default framework recommendation confidence floor.
const fn default_min_framework_confidence() -> f64 {
    0.7
}

// ============================================================================
// SECTION: Top-Level Configuration
// ============================================================================

/// Top-level Conductor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConductorConfig {
    /// Server section.
    #[serde(default)]
    pub server: ServerConfig,
    /// Paths section.
    #[serde(default)]
    pub paths: PathsConfig,
    /// Analysis section.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl ConductorConfig {
    /// Loads a configuration file, applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Parses a configuration from TOML text, applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies `MCP_SERVER_ROOT` and `MCP_RESOURCES_PATH` overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var(ENV_SERVER_ROOT) {
            if !root.is_empty() {
                self.paths.server_root = PathBuf::from(root);
            }
        }
        if let Ok(resources) = std::env::var(ENV_RESOURCES_PATH) {
            if !resources.is_empty() {
                self.paths.resources_dir = Some(PathBuf::from(resources));
            }
        }
    }

    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.transport == ServerTransport::Http && self.server.bind.is_none() {
            return Err(ConfigError::Invalid(
                "http transport requires a bind address".to_string(),
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.analysis.min_framework_confidence) {
            return Err(ConfigError::Invalid(
                "min_framework_confidence must be within [0, 1]".to_string(),
            ));
        }
        if self.paths.prompts_dir.is_empty()
            || self.paths.gates_dir.is_empty()
            || self.paths.runtime_state_dir.is_empty()
        {
            return Err(ConfigError::Invalid("path sections must be non-empty".to_string()));
        }
        Ok(())
    }
}
