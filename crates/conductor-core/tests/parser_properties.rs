// conductor-core/tests/parser_properties.rs
// ============================================================================
// Module: Parser Property Tests
// Description: Normalization idempotence and verdict round-trips.
// ============================================================================
//! ## Overview
//! Property checks over identifier normalization, command metadata
//! preservation, and verdict parsing round-trips.

#![allow(
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
)]

use conductor_core::CommandParser;
use conductor_core::PromptId;
use conductor_core::runtime::parse_verdict_field;
use proptest::prelude::proptest;

proptest! {
    /// Normalization is idempotent.
    #[test]
    fn prompt_id_normalization_idempotent(raw in "[a-zA-Z0-9 _-]{1,32}") {
        let once = PromptId::normalize(&raw);
        let twice = PromptId::normalize(once.as_str());
        assert_eq!(once, twice);
    }

    /// Normalized ids are always canonical or empty.
    #[test]
    fn prompt_id_normalization_canonical(raw in "[a-zA-Z0-9 _-]{1,32}") {
        let id = PromptId::normalize(&raw);
        assert!(id.as_str().is_empty() || id.is_canonical());
    }

    /// Parsing preserves the trimmed original command in metadata.
    #[test]
    fn original_command_preserved(args in "[a-z0-9 ]{0,24}") {
        let command = format!(">>known {args}");
        let parsed = CommandParser::new()
            .parse(&command, &[PromptId::new("known")])
            .unwrap();
        assert_eq!(parsed.metadata.original_command, command.trim());
    }

    /// Canonical PASS verdicts round-trip their rationale.
    #[test]
    fn pass_verdict_round_trip(rationale in "[a-zA-Z0-9][a-zA-Z0-9 ]{0,38}[a-zA-Z0-9]") {
        let text = format!("GATE_REVIEW: PASS - {rationale}");
        let verdict = parse_verdict_field(&text).unwrap();
        assert!(verdict.passed);
        assert_eq!(verdict.rationale, rationale);
        assert_eq!(verdict.raw_verdict, text);
    }

    /// Canonical FAIL verdicts round-trip their rationale.
    #[test]
    fn fail_verdict_round_trip(rationale in "[a-zA-Z0-9][a-zA-Z0-9 ]{0,38}[a-zA-Z0-9]") {
        let text = format!("GATE FAIL - {rationale}");
        let verdict = parse_verdict_field(&text).unwrap();
        assert!(!verdict.passed);
        assert_eq!(verdict.rationale, rationale);
    }
}
