// crates/conductor-core/src/core/time.rs
// ============================================================================
// Module: Conductor Time Model
// Description: Canonical timestamp representation for sessions and expiries.
// Purpose: Provide explicit time values so expiry logic is replayable in tests.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Prompt Conductor stamps session activity, pending confirmations, and
//! injection decisions with explicit unix-millisecond timestamps. The core
//! never reads wall-clock time directly; hosts supply a
//! [`crate::interfaces::Clock`] implementation, and tests drive a manual
//! clock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp in unix epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; monotonicity is a caller
///   responsibility.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(&self) -> i64 {
        self.0
    }

    /// Returns this timestamp advanced by the given number of milliseconds.
    #[must_use]
    pub const fn plus_millis(&self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns the elapsed milliseconds from `earlier` to this timestamp.
    #[must_use]
    pub const fn millis_since(&self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
