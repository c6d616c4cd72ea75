// crates/conductor-script/src/confirm.rs
// ============================================================================
// Module: Pending Confirmation Tracker
// Description: Single-use confirmation entries keyed by canonical input hash.
// Purpose: Let an identical re-run within the window auto-approve a tool.
// Dependencies: conductor-core, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! A tool with `confirm: true` does not run on first request. The tracker
//! records `(prompt, tool, SHA-256(canonical inputs))` with a five-minute
//! expiry; a re-run with byte-identical canonical inputs inside the window
//! auto-approves and consumes the entry, so a third identical call requires
//! confirmation again. Expired entries are evicted on touch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use conductor_core::Clock;
use conductor_core::PromptId;
use conductor_core::Timestamp;
use conductor_core::ToolId;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

/// Default confirmation window: five minutes.
pub const DEFAULT_CONFIRMATION_TTL_MS: i64 = 5 * 60 * 1000;

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Outcome of touching the tracker for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationState {
    /// A matching entry existed and was consumed; the tool may run.
    Approved,
    /// A new entry was recorded; the caller must confirm by re-running.
    Recorded {
        /// When the new entry expires.
        expires_at: Timestamp,
    },
}

/// One pending confirmation entry.
#[derive(Debug, Clone)]
struct PendingEntry {
    /// Hash over the canonicalized inputs.
    input_hash: String,
    /// Expiry timestamp.
    expires_at: Timestamp,
}

/// Tracker for pending script-tool confirmations.
pub struct PendingConfirmationTracker {
    /// Entries keyed by `prompt/tool`.
    entries: Mutex<BTreeMap<String, PendingEntry>>,
    /// Confirmation window in milliseconds.
    ttl_ms: i64,
    /// Clock for expiry decisions.
    clock: Arc<dyn Clock + Send + Sync>,
}

impl PendingConfirmationTracker {
    /// Creates a tracker with the default five-minute window.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self::with_ttl(clock, DEFAULT_CONFIRMATION_TTL_MS)
    }

    /// Creates a tracker with a custom window.
    #[must_use]
    pub fn with_ttl(clock: Arc<dyn Clock + Send + Sync>, ttl_ms: i64) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            ttl_ms,
            clock,
        }
    }

    /// Touches the tracker for a request.
    ///
    /// A live entry with the same input hash approves and is consumed;
    /// anything else records a fresh entry and asks for confirmation.
    #[must_use]
    pub fn check_and_record(
        &self,
        prompt_id: &PromptId,
        tool_id: &ToolId,
        inputs: &Value,
    ) -> ConfirmationState {
        let now = self.clock.now();
        let key = format!("{prompt_id}/{tool_id}");
        let input_hash = canonical_hash(inputs);

        let Ok(mut entries) = self.entries.lock() else {
            return ConfirmationState::Recorded {
                expires_at: now.plus_millis(self.ttl_ms),
            };
        };

        // Evict expired entries on touch.
        entries.retain(|_, entry| entry.expires_at >= now);

        if let Some(entry) = entries.get(&key) {
            if entry.input_hash == input_hash {
                entries.remove(&key);
                return ConfirmationState::Approved;
            }
        }

        let expires_at = now.plus_millis(self.ttl_ms);
        entries.insert(
            key,
            PendingEntry {
                input_hash,
                expires_at,
            },
        );
        ConfirmationState::Recorded {
            expires_at,
        }
    }

    /// Returns the number of live entries, evicting expired ones.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let now = self.clock.now();
        self.entries.lock().map_or(0, |mut entries| {
            entries.retain(|_, entry| entry.expires_at >= now);
            entries.len()
        })
    }
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// SHA-256 over the JCS-canonicalized input object.
///
/// Canonicalization makes the hash stable under key reordering so identical
/// inputs always collide.
#[must_use]
pub fn canonical_hash(inputs: &Value) -> String {
    let canonical = serde_jcs::to_string(inputs)
        .unwrap_or_else(|_| inputs.to_string());
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
