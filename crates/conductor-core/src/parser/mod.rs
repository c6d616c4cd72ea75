// crates/conductor-core/src/parser/mod.rs
// ============================================================================
// Module: Conductor Command Parser
// Description: Multi-strategy parsing of untrusted command strings.
// Purpose: Convert command text into a ParsedCommand or a precise error.
// Dependencies: crate::core, strsim
// ============================================================================

//! ## Overview
//! The parser tries strategies in descending confidence: symbolic (full
//! operator grammar, 0.97), simple (`>>id args`, 0.95), then JSON wrapper
//! (0.85). A shared normalizer repairs stray `>>` markers and extracts the
//! single permitted `%modifier` before any strategy runs. The parser never
//! silently drops a token: unrecognized constructs become warnings or errors.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod json;
mod normalize;
mod simple;
mod suggest;
mod symbolic;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::CommandFormat;
use crate::core::CommandMetadata;
use crate::core::CommandType;
use crate::core::Operator;
use crate::core::ParsedCommand;
use crate::core::PromptId;

pub use suggest::BUILTIN_COMMANDS;

/// Confidence assigned to symbolic parses.
const SYMBOLIC_CONFIDENCE: f64 = 0.97;
/// Confidence assigned to simple parses.
const SIMPLE_CONFIDENCE: f64 = 0.95;
/// Confidence assigned to JSON parses.
const JSON_CONFIDENCE: f64 = 0.85;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Command parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input was empty after trimming.
    #[error("empty command")]
    Empty,
    /// No strategy recognized the input.
    #[error("no parse strategy applies to '{0}'")]
    NoStrategy(String),
    /// Unknown `%modifier` name.
    #[error("unknown modifier '%{0}'")]
    InvalidModifier(String),
    /// More than one modifier in a command.
    #[error("multiple modifiers: '%{first}' and '%{second}'")]
    DuplicateModifier {
        /// First modifier observed.
        first: String,
        /// Second modifier observed.
        second: String,
    },
    /// Chain step without a `>>`/`/` prefix.
    #[error("malformed chain step '{0}': steps must begin with >>id or /id")]
    MalformedStep(String),
    /// Conditional operator missing its condition or branch.
    #[error("malformed conditional in '{0}': expected ? \"condition\" : branch")]
    MalformedConditional(String),
    /// Step prefix with no identifier.
    #[error("step prefix with empty prompt id")]
    EmptyStepId,
    /// JSON wrapper was malformed.
    #[error("invalid json command: {0}")]
    InvalidJson(String),
    /// Resolved prompt id matches nothing in the catalog.
    #[error("unknown prompt '{id}'")]
    UnknownPrompt {
        /// The unresolved prompt id.
        id: String,
        /// Levenshtein-ranked suggestions, closest first.
        suggestions: Vec<String>,
        /// Hint when the id is close to a built-in command.
        hint: Option<String>,
    },
}

// ============================================================================
// SECTION: Parser Metrics
// ============================================================================

/// Parser telemetry sink.
pub trait ParserMetrics {
    /// Records a successful parse with its strategy and confidence.
    fn on_parse(&self, format: CommandFormat, confidence: f64);

    /// Records a parse failure.
    fn on_failure(&self, error: &ParseError);
}

/// No-op parser metrics sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopParserMetrics;

impl ParserMetrics for NoopParserMetrics {
    fn on_parse(&self, _format: CommandFormat, _confidence: f64) {}

    fn on_failure(&self, _error: &ParseError) {}
}

// ============================================================================
// SECTION: Command Parser
// ============================================================================

/// Multi-strategy command parser.
#[derive(Clone)]
pub struct CommandParser {
    /// Telemetry sink for strategy use and failures.
    metrics: Arc<dyn ParserMetrics + Send + Sync>,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    /// Creates a parser with no-op telemetry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(NoopParserMetrics),
        }
    }

    /// Creates a parser with the given telemetry sink.
    #[must_use]
    pub fn with_metrics(metrics: Arc<dyn ParserMetrics + Send + Sync>) -> Self {
        Self {
            metrics,
        }
    }

    /// Parses a command against the available prompt catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the command is empty, malformed, carries
    /// duplicate modifiers, or references an unknown prompt.
    pub fn parse(
        &self,
        command: &str,
        available: &[PromptId],
    ) -> Result<ParsedCommand, ParseError> {
        let result = self.parse_inner(command, available);
        match &result {
            Ok(parsed) => self.metrics.on_parse(parsed.format, parsed.confidence),
            Err(error) => self.metrics.on_failure(error),
        }
        result
    }

    /// Strategy ladder without telemetry.
    fn parse_inner(
        &self,
        command: &str,
        available: &[PromptId],
    ) -> Result<ParsedCommand, ParseError> {
        let original = command.trim().to_string();
        if original.is_empty() {
            return Err(ParseError::Empty);
        }

        let (normalized, prefix_normalized) = normalize::normalize_prefixes(&original);
        let (modifier, rest) = normalize::extract_modifier(&normalized)?;
        if rest.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut warnings = Vec::new();
        let (steps, operators, format, confidence, chain) = if symbolic::applies(&rest) {
            let outcome = symbolic::parse(&rest)?;
            warnings.extend(outcome.warnings);
            (outcome.steps, outcome.operators, CommandFormat::Symbolic, SYMBOLIC_CONFIDENCE, outcome.chain)
        } else if simple::applies(&rest) {
            let step = simple::parse(&rest, &mut warnings)?;
            (vec![step], Vec::new(), CommandFormat::Simple, SIMPLE_CONFIDENCE, false)
        } else if json::applies(&rest) {
            let step = json::parse(&rest, &mut warnings)?;
            (vec![step], Vec::new(), CommandFormat::Json, JSON_CONFIDENCE, false)
        } else {
            return Err(ParseError::NoStrategy(original));
        };

        for step in &steps {
            ensure_known(&step.prompt_id, available)?;
        }
        for operator in &operators {
            if let Operator::Conditional {
                branch, ..
            } = operator
            {
                ensure_known(&PromptId::normalize(branch), available)?;
            }
        }

        let first = steps
            .first()
            .ok_or_else(|| ParseError::MalformedStep(original.clone()))?;
        Ok(ParsedCommand {
            prompt_id: first.prompt_id.clone(),
            raw_args: first.raw_args.clone(),
            modifier,
            operators,
            steps,
            format,
            confidence,
            warnings,
            command_type: if chain { CommandType::Chain } else { CommandType::Single },
            metadata: CommandMetadata {
                original_command: original,
                prefix_normalized,
            },
        })
    }
}

/// Fails with ranked suggestions when the id is not in the catalog.
fn ensure_known(id: &PromptId, available: &[PromptId]) -> Result<(), ParseError> {
    if available.iter().any(|known| known == id) {
        return Ok(());
    }
    Err(ParseError::UnknownPrompt {
        id: id.as_str().to_string(),
        suggestions: suggest::rank(id.as_str(), available),
        hint: suggest::builtin_hint(id.as_str()),
    })
}
