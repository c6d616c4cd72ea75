// crates/conductor-mcp/src/session_storage.rs
// ============================================================================
// Module: File Session Store
// Description: Atomic JSON persistence for the session registry document.
// Purpose: Keep the filesystem boundary out of the core session manager.
// Dependencies: conductor-core, serde_json
// ============================================================================

//! ## Overview
//! The session registry is one JSON document under the runtime-state
//! directory. Saves write a temporary sibling file and rename it into place
//! so readers never observe a torn document. A missing or corrupt document
//! loads as an empty registry with a warning rather than failing the server.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use conductor_core::SessionRegistryDocument;
use conductor_core::SessionStore;
use conductor_core::StoreError;

// ============================================================================
// SECTION: File Store
// ============================================================================

/// File-backed session store with atomic saves.
pub struct FileSessionStore {
    /// Document path, typically `runtime-state/chain-sessions.json`.
    path: PathBuf,
    /// Warnings from the last load.
    warnings: Mutex<Vec<String>>,
}

impl FileSessionStore {
    /// Creates a store for the given document path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Returns the warnings from the last load.
    #[must_use]
    pub fn load_warnings(&self) -> Vec<String> {
        self.warnings.lock().map_or_else(|_| Vec::new(), |guard| guard.clone())
    }

    /// Records a load warning.
    fn warn(&self, message: String) {
        if let Ok(mut guard) = self.warnings.lock() {
            guard.push(message);
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<SessionRegistryDocument, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionRegistryDocument::default());
            }
            Err(err) => {
                return Err(StoreError::Io(format!("{}: {err}", self.path.display())));
            }
        };
        match serde_json::from_str(&text) {
            Ok(document) => Ok(document),
            Err(err) => {
                // Corrupt documents load as empty with a warning.
                self.warn(format!(
                    "corrupt session registry '{}' loaded as empty: {err}",
                    self.path.display()
                ));
                Ok(SessionRegistryDocument::default())
            }
        }
    }

    fn save(&self, document: &SessionRegistryDocument) -> Result<(), StoreError> {
        let payload = serde_json::to_vec_pretty(document)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;

        let parent = self.path.parent().ok_or_else(|| {
            StoreError::Io(format!("'{}' has no parent directory", self.path.display()))
        })?;
        std::fs::create_dir_all(parent)
            .map_err(|err| StoreError::Io(format!("{}: {err}", parent.display())))?;

        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&temp_path)
                .map_err(|err| StoreError::Io(format!("{}: {err}", temp_path.display())))?;
            file.write_all(&payload)
                .map_err(|err| StoreError::Io(format!("{}: {err}", temp_path.display())))?;
            file.sync_all()
                .map_err(|err| StoreError::Io(format!("{}: {err}", temp_path.display())))?;
        }
        std::fs::rename(&temp_path, &self.path)
            .map_err(|err| StoreError::Io(format!("{}: {err}", self.path.display())))
    }
}
