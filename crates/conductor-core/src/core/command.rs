// crates/conductor-core/src/core/command.rs
// ============================================================================
// Module: Conductor Command Model
// Description: Parsed command structure, operators, and modifiers.
// Purpose: Capture the request-scoped, immutable result of command parsing.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! A parsed command is the immutable output of the command parser. Operators
//! form a closed tagged union matched exhaustively by the planner; dynamic
//! dispatch on operator strings is deliberately absent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::FrameworkId;
use crate::core::identifiers::PromptId;
use crate::core::identifiers::StyleId;

// ============================================================================
// SECTION: Modifiers
// ============================================================================

/// Command modifier in `%name` form.
///
/// # Invariants
/// - At most one modifier per command; the parser rejects a second occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    /// Suppress system-prompt, gate-guidance, and style injection.
    Clean,
    /// Force system-prompt and gate-guidance injection.
    Guided,
    /// Suppress system-prompt and gate-guidance injection, keep style.
    Lean,
    /// Force framework system-prompt injection.
    Framework,
    /// Force system-prompt injection for judge selection only.
    Judge,
}

impl Modifier {
    /// Parses a modifier name without the leading `%`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "clean" => Some(Self::Clean),
            "guided" => Some(Self::Guided),
            "lean" => Some(Self::Lean),
            "framework" => Some(Self::Framework),
            "judge" => Some(Self::Judge),
            _ => None,
        }
    }

    /// Returns the stable lowercase name of the modifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Guided => "guided",
            Self::Lean => "lean",
            Self::Framework => "framework",
            Self::Judge => "judge",
        }
    }
}

// ============================================================================
// SECTION: Operators
// ============================================================================

/// Command operator recognized by the symbolic parser.
///
/// # Invariants
/// - Operators apply to the whole command; steps carrying operators are
///   rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operator {
    /// Chain operator `-->` between steps.
    Chain,
    /// Parallel operator `+` between steps.
    Parallel,
    /// Conditional operator `? "condition" : branch`.
    Conditional {
        /// Condition text evaluated by the LLM driver.
        condition: String,
        /// Branch prompt identifier taken when the condition holds.
        branch: String,
    },
    /// Gate operator `::` or `=` with a criteria value.
    Gate {
        /// Quoted criteria text or a registered gate token.
        value: String,
    },
    /// Framework operator `@ID`.
    Framework {
        /// Framework identifier in canonical uppercase form.
        id: FrameworkId,
    },
    /// Style selector `#name`, `#style(name)`, or `#style:name`.
    Style {
        /// Style identifier.
        id: StyleId,
    },
}

// ============================================================================
// SECTION: Format and Type
// ============================================================================

/// Detected command input format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandFormat {
    /// `>>id args` or `/id args`.
    Simple,
    /// `{"command": "...", "args": {...}}` wrapper.
    Json,
    /// Full operator grammar.
    Symbolic,
}

/// Whole-command classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    /// One prompt, no chain operator.
    Single,
    /// Multi-step chain.
    Chain,
}

// ============================================================================
// SECTION: Parsed Command
// ============================================================================

/// One step of a parsed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStep {
    /// Prompt identifier in canonical form.
    pub prompt_id: PromptId,
    /// Raw argument tail for the step.
    pub raw_args: String,
}

/// Parse metadata preserved for telemetry and error reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// Trimmed original command string.
    pub original_command: String,
    /// Whether the prefix normalizer rewrote the command.
    pub prefix_normalized: bool,
}

/// Immutable result of command parsing.
///
/// # Invariants
/// - `command_type` is [`CommandType::Chain`] iff a chain operator was
///   observed.
/// - `steps` is non-empty; `prompt_id` equals the first step's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedCommand {
    /// Base prompt identifier (first step).
    pub prompt_id: PromptId,
    /// Raw argument tail of the first step.
    pub raw_args: String,
    /// Optional command modifier.
    pub modifier: Option<Modifier>,
    /// Operators observed across the whole command.
    pub operators: Vec<Operator>,
    /// Ordered command steps.
    pub steps: Vec<CommandStep>,
    /// Detected input format.
    pub format: CommandFormat,
    /// Parse confidence in `[0, 1]`.
    pub confidence: f64,
    /// Non-fatal parse warnings.
    pub warnings: Vec<String>,
    /// Whole-command classification.
    pub command_type: CommandType,
    /// Parse metadata.
    pub metadata: CommandMetadata,
}

impl ParsedCommand {
    /// Returns true when a chain operator was observed.
    #[must_use]
    pub fn is_chain(&self) -> bool {
        self.command_type == CommandType::Chain
    }

    /// Returns every gate criteria value from `::` operators, in order.
    #[must_use]
    pub fn gate_values(&self) -> Vec<&str> {
        self.operators
            .iter()
            .filter_map(|op| match op {
                Operator::Gate {
                    value,
                } => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns the framework override when an `@ID` operator is present.
    #[must_use]
    pub fn framework_override(&self) -> Option<&FrameworkId> {
        self.operators.iter().find_map(|op| match op {
            Operator::Framework {
                id,
            } => Some(id),
            _ => None,
        })
    }

    /// Returns the style selector when present.
    #[must_use]
    pub fn style(&self) -> Option<&StyleId> {
        self.operators.iter().find_map(|op| match op {
            Operator::Style {
                id,
            } => Some(id),
            _ => None,
        })
    }
}
