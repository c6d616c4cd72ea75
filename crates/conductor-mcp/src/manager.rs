// crates/conductor-mcp/src/manager.rs
// ============================================================================
// Module: File Prompt Manager
// Description: Narrow CRUD and version history over the prompt catalog.
// Purpose: Implement the authoring contract against the on-disk layout.
// Dependencies: conductor-core, crate::registry, serde_yaml
// ============================================================================

//! ## Overview
//! The manager writes the same layout the registry reads: `prompt.yaml` plus
//! `user-message.md` and optional `system-message.md` under the prompt's
//! category directory. Reference validation (self, dangling, circular) runs
//! before any write. Version history is a capacity-bounded in-memory ring
//! per prompt, enough for `history`, `rollback`, and `compare`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use conductor_core::Clock;
use conductor_core::PromptArgument;
use conductor_core::ChainStepSpec;
use conductor_core::GateId;
use conductor_core::PromptId;
use conductor_core::PromptRecord;
use conductor_core::PromptRegistry;
use conductor_core::runtime::AuthoringError;
use conductor_core::runtime::PromptComparison;
use conductor_core::runtime::PromptManager;
use conductor_core::runtime::PromptVersion;
use conductor_core::runtime::compare_records;
use conductor_core::runtime::validate_references;
use serde::Serialize;

use crate::registry::FilePromptRegistry;

/// Versions retained per prompt.
const HISTORY_CAPACITY: usize = 20;

// ============================================================================
// SECTION: Manifest Output
// ============================================================================

/// Serialized `prompt.yaml` shape.
#[derive(Debug, Serialize)]
struct PromptFileOut<'a> {
    /// Human-readable prompt name.
    name: &'a str,
    /// Category identifier.
    category: &'a str,
    /// Prompt description.
    description: &'a str,
    /// Declared template arguments.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    arguments: Vec<&'a PromptArgument>,
    /// Chain steps.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    chain: Vec<&'a ChainStepSpec>,
    /// Gate ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    gates: Vec<&'a GateId>,
}

// ============================================================================
// SECTION: File Prompt Manager
// ============================================================================

/// File-backed authoring manager.
pub struct FilePromptManager {
    /// Prompt catalog shared with the engine.
    registry: Arc<FilePromptRegistry>,
    /// Clock for version stamps.
    clock: Arc<dyn Clock + Send + Sync>,
    /// Per-prompt version history, oldest first.
    history: Mutex<BTreeMap<PromptId, Vec<PromptVersion>>>,
    /// Whether dangling references are rejected.
    strict_references: bool,
}

impl FilePromptManager {
    /// Creates a manager over a loaded registry.
    #[must_use]
    pub fn new(registry: Arc<FilePromptRegistry>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            registry,
            clock,
            history: Mutex::new(BTreeMap::new()),
            strict_references: true,
        }
    }

    /// Disables strict dangling-reference rejection.
    #[must_use]
    pub fn with_lenient_references(mut self) -> Self {
        self.strict_references = false;
        self
    }

    /// Validates a record against the current catalog snapshot.
    fn validate(&self, record: &PromptRecord) -> Result<(), AuthoringError> {
        let snapshot = self
            .registry
            .list()
            .map_err(|err| AuthoringError::Backend(err.to_string()))?;
        validate_references(record, &snapshot, self.strict_references)
    }

    /// Writes a prompt's files into the authoring root.
    ///
    /// With a resources root configured, created and updated prompts land
    /// there instead of the shipped catalog.
    fn write_record(&self, record: &PromptRecord) -> Result<(), AuthoringError> {
        let dir = self.registry.authoring_dir(&record.id, &record.category);
        std::fs::create_dir_all(&dir)
            .map_err(|err| AuthoringError::Backend(format!("{}: {err}", dir.display())))?;

        let manifest = PromptFileOut {
            name: &record.name,
            category: record.category.as_str(),
            description: &record.description,
            arguments: record.arguments.iter().collect(),
            chain: record.chain_steps.iter().collect(),
            gates: record.gate_ids.iter().collect(),
        };
        let yaml = serde_yaml::to_string(&manifest)
            .map_err(|err| AuthoringError::Backend(err.to_string()))?;
        std::fs::write(dir.join("prompt.yaml"), yaml)
            .map_err(|err| AuthoringError::Backend(format!("{}: {err}", dir.display())))?;
        std::fs::write(dir.join("user-message.md"), &record.user_template)
            .map_err(|err| AuthoringError::Backend(format!("{}: {err}", dir.display())))?;
        match &record.system_template {
            Some(system) => std::fs::write(dir.join("system-message.md"), system)
                .map_err(|err| AuthoringError::Backend(format!("{}: {err}", dir.display())))?,
            None => {
                let _ = std::fs::remove_file(dir.join("system-message.md"));
            }
        }
        Ok(())
    }

    /// Appends a version to a prompt's history ring.
    fn push_version(&self, record: &PromptRecord) {
        if let Ok(mut history) = self.history.lock() {
            let versions = history.entry(record.id.clone()).or_default();
            let next = versions.last().map_or(1, |latest| latest.version + 1);
            versions.push(PromptVersion {
                version: next,
                record: record.clone(),
                saved_at: self.clock.now(),
            });
            if versions.len() > HISTORY_CAPACITY {
                versions.remove(0);
            }
        }
    }

    /// Finds one version in a prompt's history.
    fn find_version(&self, id: &PromptId, version: u32) -> Result<PromptVersion, AuthoringError> {
        let history = self.history.lock().map_err(|_| {
            AuthoringError::Backend("history lock poisoned".to_string())
        })?;
        history
            .get(id)
            .and_then(|versions| versions.iter().find(|entry| entry.version == version))
            .cloned()
            .ok_or(AuthoringError::VersionNotFound {
                id: id.as_str().to_string(),
                version,
            })
    }
}

impl PromptManager for FilePromptManager {
    fn list(&self) -> Result<Vec<PromptRecord>, AuthoringError> {
        self.registry.list().map_err(|err| AuthoringError::Backend(err.to_string()))
    }

    fn inspect(&self, id: &PromptId) -> Result<PromptRecord, AuthoringError> {
        self.registry
            .get(id)
            .map_err(|err| AuthoringError::Backend(err.to_string()))?
            .ok_or_else(|| AuthoringError::NotFound(id.as_str().to_string()))
    }

    fn create(&self, record: PromptRecord) -> Result<(), AuthoringError> {
        self.validate(&record)?;
        self.write_record(&record)?;
        self.registry.insert_record(record.clone());
        self.push_version(&record);
        Ok(())
    }

    fn update(&self, record: PromptRecord) -> Result<(), AuthoringError> {
        let existing = self.inspect(&record.id)?;
        self.validate(&record)?;
        // Seed history for prompts loaded from disk before their first edit.
        if let Ok(history) = self.history.lock() {
            if !history.contains_key(&record.id) {
                drop(history);
                self.push_version(&existing);
            }
        }
        self.write_record(&record)?;
        self.registry.insert_record(record.clone());
        self.push_version(&record);
        Ok(())
    }

    fn delete(&self, id: &PromptId) -> Result<(), AuthoringError> {
        let existing = self.inspect(id)?;
        // Authored prompts live under the resources root; shipped prompts
        // under the catalog. Remove whichever holds the definition.
        let authored = self.registry.authoring_dir(&existing.id, &existing.category);
        let dir = if authored.is_dir() {
            authored
        } else {
            self.registry.prompt_dir(&existing.id, &existing.category)
        };
        std::fs::remove_dir_all(&dir)
            .map_err(|err| AuthoringError::Backend(format!("{}: {err}", dir.display())))?;
        self.registry.remove_record(id);
        Ok(())
    }

    fn reload(&self) -> Result<usize, AuthoringError> {
        self.registry.reload().map_err(|err| AuthoringError::Backend(err.to_string()))
    }

    fn history(&self, id: &PromptId) -> Result<Vec<PromptVersion>, AuthoringError> {
        self.inspect(id)?;
        let history = self.history.lock().map_err(|_| {
            AuthoringError::Backend("history lock poisoned".to_string())
        })?;
        Ok(history.get(id).cloned().unwrap_or_default())
    }

    fn rollback(&self, id: &PromptId, version: u32, confirm: bool) -> Result<(), AuthoringError> {
        if !confirm {
            return Err(AuthoringError::ConfirmationRequired);
        }
        let target = self.find_version(id, version)?;
        self.write_record(&target.record)?;
        self.registry.insert_record(target.record.clone());
        self.push_version(&target.record);
        Ok(())
    }

    fn compare(
        &self,
        id: &PromptId,
        from: u32,
        to: u32,
    ) -> Result<PromptComparison, AuthoringError> {
        let from_version = self.find_version(id, from)?;
        let to_version = self.find_version(id, to)?;
        Ok(compare_records(&from_version, &to_version))
    }
}
