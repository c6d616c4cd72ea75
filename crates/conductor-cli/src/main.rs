#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )
)]
// crates/conductor-cli/src/main.rs
// ============================================================================
// Module: Conductor CLI Entry Point
// Description: Command dispatcher for the Prompt Conductor server.
// Purpose: Serve the MCP transports and debug configurations offline.
// Dependencies: clap, conductor-config, conductor-core, conductor-mcp
// ============================================================================

//! ## Overview
//! The CLI wires configuration into the MCP server and offers two offline
//! helpers: configuration validation and command parsing against the loaded
//! prompt catalog. Diagnostics go to stderr; stdout is reserved for command
//! output (and the protocol when serving stdio).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use conductor_config::ConductorConfig;
use conductor_core::CommandParser;
use conductor_core::PromptRegistry;
use conductor_mcp::FilePromptRegistry;
use conductor_mcp::McpServer;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "prompt-conductor", version, arg_required_else_help = true)]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: CliCommand,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Serve the configured MCP transport.
    Serve {
        /// Configuration file path.
        #[arg(long, default_value = "conductor.toml")]
        config: PathBuf,
    },
    /// Validate a configuration file and exit.
    ValidateConfig {
        /// Configuration file path.
        #[arg(long, default_value = "conductor.toml")]
        config: PathBuf,
    },
    /// Parse a command against the prompt catalog and print the result.
    Parse {
        /// Configuration file path.
        #[arg(long, default_value = "conductor.toml")]
        config: PathBuf,
        /// Command string to parse.
        command: String,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failures.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration problem.
    #[error("{0}")]
    Config(String),
    /// Server failure.
    #[error("{0}")]
    Server(String),
    /// Parse debugging failure.
    #[error("{0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report(&format!("error: {error}"));
            ExitCode::FAILURE
        }
    }
}

/// Dispatches one subcommand.
async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        CliCommand::Serve {
            config,
        } => {
            let config = load_config(&config)?;
            let server =
                McpServer::from_config(config).map_err(|err| CliError::Server(err.to_string()))?;
            for warning in server.startup_warnings() {
                report(&format!("warning: {warning}"));
            }
            server.serve().await.map_err(|err| CliError::Server(err.to_string()))
        }
        CliCommand::ValidateConfig {
            config,
        } => {
            load_config(&config)?;
            report("config ok");
            Ok(())
        }
        CliCommand::Parse {
            config,
            command,
        } => {
            let config = load_config(&config)?;
            let registry = FilePromptRegistry::load_with_resources(
                config.paths.prompts_path(),
                config.paths.resources_dir.clone(),
            )
            .map_err(|err| CliError::Parse(err.to_string()))?;
            let available: Vec<_> = registry
                .list()
                .map_err(|err| CliError::Parse(err.to_string()))?
                .into_iter()
                .map(|record| record.id)
                .collect();
            let parsed = CommandParser::new()
                .parse(&command, &available)
                .map_err(|err| CliError::Parse(err.to_string()))?;
            let rendered = serde_json::to_string_pretty(&parsed)
                .map_err(|err| CliError::Parse(err.to_string()))?;
            emit(&rendered);
            Ok(())
        }
    }
}

/// Loads and validates a configuration file.
fn load_config(path: &std::path::Path) -> Result<ConductorConfig, CliError> {
    if path.exists() {
        ConductorConfig::load(path).map_err(|err| CliError::Config(err.to_string()))
    } else {
        // Missing config falls back to defaults with env overrides applied.
        let mut config = ConductorConfig::default();
        config.apply_env_overrides();
        config.validate().map_err(|err| CliError::Config(err.to_string()))?;
        Ok(config)
    }
}

/// Writes a diagnostic line to stderr.
#[allow(clippy::print_stderr, reason = "Stderr is the CLI diagnostic channel.")]
fn report(message: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{message}");
}

/// Writes command output to stdout.
#[allow(clippy::print_stdout, reason = "Stdout is the CLI output channel.")]
fn emit(message: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{message}");
}
