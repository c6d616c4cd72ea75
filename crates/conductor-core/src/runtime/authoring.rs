// crates/conductor-core/src/runtime/authoring.rs
// ============================================================================
// Module: Prompt Authoring Contracts
// Description: Manager trait, version records, and reference validation.
// Purpose: Validate prompt references and define the narrow CRUD surface.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Authoring is a narrow CRUD surface with version history. Create and update
//! validation walks `{{ref:prompt_id}}` references over the registry snapshot:
//! self-references and circular chains are rejected outright, and dangling
//! references are rejected in strict mode. Runtime expansion refuses unknown
//! references by policy rather than re-walking cycles.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::PromptId;
use crate::core::Timestamp;
use crate::interfaces::PromptRecord;
use crate::runtime::args::reference_targets;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authoring errors.
#[derive(Debug, Error)]
pub enum AuthoringError {
    /// Prompt references itself.
    #[error("prompt '{0}' references itself")]
    SelfReference(String),
    /// Reference target does not exist (strict mode).
    #[error("prompt '{from}' references unknown prompt '{to}'")]
    DanglingReference {
        /// Referencing prompt.
        from: String,
        /// Missing target.
        to: String,
    },
    /// Reference chain forms a cycle.
    #[error("circular prompt reference chain: {0}")]
    CircularReference(String),
    /// Prompt does not exist.
    #[error("prompt '{0}' not found")]
    NotFound(String),
    /// Requested version does not exist.
    #[error("prompt '{id}' has no version {version}")]
    VersionNotFound {
        /// Prompt identifier.
        id: String,
        /// Missing version number.
        version: u32,
    },
    /// Destructive operation attempted without confirmation.
    #[error("operation requires confirm=true")]
    ConfirmationRequired,
    /// Backend reported an error.
    #[error("authoring backend error: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Reference Validation
// ============================================================================

/// Validates `{{ref:...}}` references for a new or updated prompt.
///
/// The candidate is checked against a snapshot of the registry:
/// self-references fail immediately, dangling references fail in strict mode,
/// and circular chains are detected via depth-first search over the snapshot
/// with the candidate substituted in.
///
/// # Errors
///
/// Returns [`AuthoringError`] describing the first violation found.
pub fn validate_references(
    candidate: &PromptRecord,
    snapshot: &[PromptRecord],
    strict: bool,
) -> Result<(), AuthoringError> {
    let mut graph: BTreeMap<PromptId, Vec<PromptId>> = snapshot
        .iter()
        .map(|record| (record.id.clone(), record_references(record)))
        .collect();
    let candidate_refs = record_references(candidate);

    for target in &candidate_refs {
        if *target == candidate.id {
            return Err(AuthoringError::SelfReference(candidate.id.as_str().to_string()));
        }
        if strict && !graph.contains_key(target) && *target != candidate.id {
            return Err(AuthoringError::DanglingReference {
                from: candidate.id.as_str().to_string(),
                to: target.as_str().to_string(),
            });
        }
    }
    graph.insert(candidate.id.clone(), candidate_refs);

    let mut visiting = Vec::new();
    let mut done = BTreeSet::new();
    dfs(&candidate.id, &graph, &mut visiting, &mut done)
}

/// Returns the reference targets declared by a prompt's templates.
fn record_references(record: &PromptRecord) -> Vec<PromptId> {
    let mut targets = reference_targets(&record.user_template);
    if let Some(system) = &record.system_template {
        targets.extend(reference_targets(system));
    }
    targets.into_iter().map(|target| PromptId::normalize(&target)).collect()
}

/// Depth-first cycle search.
fn dfs(
    node: &PromptId,
    graph: &BTreeMap<PromptId, Vec<PromptId>>,
    visiting: &mut Vec<PromptId>,
    done: &mut BTreeSet<PromptId>,
) -> Result<(), AuthoringError> {
    if done.contains(node) {
        return Ok(());
    }
    if visiting.contains(node) {
        let mut path: Vec<&str> = visiting.iter().map(PromptId::as_str).collect();
        path.push(node.as_str());
        return Err(AuthoringError::CircularReference(path.join(" -> ")));
    }
    visiting.push(node.clone());
    if let Some(targets) = graph.get(node) {
        for target in targets {
            dfs(target, graph, visiting, done)?;
        }
    }
    visiting.pop();
    done.insert(node.clone());
    Ok(())
}

// ============================================================================
// SECTION: Version Records
// ============================================================================

/// One saved prompt version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptVersion {
    /// Version number, 1-based and monotonic.
    pub version: u32,
    /// Prompt record at that version.
    pub record: PromptRecord,
    /// When the version was saved.
    pub saved_at: Timestamp,
}

/// Field-level comparison between two prompt versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptComparison {
    /// Source version.
    pub from: u32,
    /// Target version.
    pub to: u32,
    /// Human-readable change descriptions.
    pub changes: Vec<String>,
}

/// Compares two prompt records field by field.
#[must_use]
pub fn compare_records(from: &PromptVersion, to: &PromptVersion) -> PromptComparison {
    let mut changes = Vec::new();
    let a = &from.record;
    let b = &to.record;
    if a.name != b.name {
        changes.push(format!("name: '{}' -> '{}'", a.name, b.name));
    }
    if a.category != b.category {
        changes.push(format!("category: '{}' -> '{}'", a.category, b.category));
    }
    if a.description != b.description {
        changes.push("description changed".to_string());
    }
    if a.user_template != b.user_template {
        changes.push("user template changed".to_string());
    }
    if a.system_template != b.system_template {
        changes.push("system template changed".to_string());
    }
    if a.arguments != b.arguments {
        changes.push("arguments changed".to_string());
    }
    if a.chain_steps != b.chain_steps {
        changes.push("chain steps changed".to_string());
    }
    if a.gate_ids != b.gate_ids {
        changes.push("gate ids changed".to_string());
    }
    PromptComparison {
        from: from.version,
        to: to.version,
        changes,
    }
}

// ============================================================================
// SECTION: Prompt Manager
// ============================================================================

/// Narrow CRUD and version-history surface over the prompt catalog.
pub trait PromptManager {
    /// Lists every prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AuthoringError`] when the backend fails.
    fn list(&self) -> Result<Vec<PromptRecord>, AuthoringError>;

    /// Returns one prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AuthoringError::NotFound`] when the prompt does not exist.
    fn inspect(&self, id: &PromptId) -> Result<PromptRecord, AuthoringError>;

    /// Creates a prompt after reference validation.
    ///
    /// # Errors
    ///
    /// Returns [`AuthoringError`] on validation or backend failure.
    fn create(&self, record: PromptRecord) -> Result<(), AuthoringError>;

    /// Updates a prompt after reference validation, recording a version.
    ///
    /// # Errors
    ///
    /// Returns [`AuthoringError`] on validation or backend failure.
    fn update(&self, record: PromptRecord) -> Result<(), AuthoringError>;

    /// Deletes a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AuthoringError::NotFound`] when the prompt does not exist.
    fn delete(&self, id: &PromptId) -> Result<(), AuthoringError>;

    /// Reloads the catalog from its backing store.
    ///
    /// # Errors
    ///
    /// Returns [`AuthoringError`] when the backend fails.
    fn reload(&self) -> Result<usize, AuthoringError>;

    /// Returns the version history for a prompt, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AuthoringError::NotFound`] when the prompt does not exist.
    fn history(&self, id: &PromptId) -> Result<Vec<PromptVersion>, AuthoringError>;

    /// Rolls a prompt back to an earlier version.
    ///
    /// # Errors
    ///
    /// Returns [`AuthoringError::ConfirmationRequired`] unless `confirm` is
    /// set, and [`AuthoringError::VersionNotFound`] for unknown versions.
    fn rollback(&self, id: &PromptId, version: u32, confirm: bool) -> Result<(), AuthoringError>;

    /// Compares two versions of a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AuthoringError::VersionNotFound`] for unknown versions.
    fn compare(
        &self,
        id: &PromptId,
        from: u32,
        to: u32,
    ) -> Result<PromptComparison, AuthoringError>;
}
