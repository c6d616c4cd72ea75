// crates/conductor-core/src/runtime/clock.rs
// ============================================================================
// Module: Conductor Clocks
// Description: System and manual clock implementations.
// Purpose: Provide wall-clock time in production and scripted time in tests.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Expiry logic (pending confirmations, runtime overrides, stale sessions)
//! reads time through [`Clock`]. Production uses [`SystemClock`]; tests drive
//! a [`ManualClock`] forward explicitly so sweeps are deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::core::Timestamp;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: System Clock
// ============================================================================

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
        Timestamp::from_unix_millis(millis)
    }
}

// ============================================================================
// SECTION: Manual Clock
// ============================================================================

/// Manually advanced clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current time behind a mutex so tests can share the clock.
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Creates a manual clock at the given time.
    #[must_use]
    pub fn starting_at(now: Timestamp) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Advances the clock by the given number of milliseconds.
    pub fn advance_millis(&self, millis: i64) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = guard.plus_millis(millis);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.lock().map_or(Timestamp::from_unix_millis(0), |guard| *guard)
    }
}
