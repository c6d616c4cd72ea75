// crates/conductor-core/src/runtime/store.rs
// ============================================================================
// Module: Conductor In-Memory Store
// Description: Simple in-memory session store for tests and examples.
// Purpose: Provide a deterministic store implementation without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides a simple in-memory implementation of [`SessionStore`]
//! for tests and local demos. It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use crate::core::SessionRegistryDocument;
use crate::interfaces::SessionStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory session store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    /// Last saved document behind a mutex.
    document: Arc<Mutex<SessionRegistryDocument>>,
}

impl InMemorySessionStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the last saved document.
    #[must_use]
    pub fn snapshot(&self) -> SessionRegistryDocument {
        self.document.lock().map_or_else(|_| SessionRegistryDocument::default(), |guard| guard.clone())
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self) -> Result<SessionRegistryDocument, StoreError> {
        let guard = self
            .document
            .lock()
            .map_err(|_| StoreError::Store("session store mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, document: &SessionRegistryDocument) -> Result<(), StoreError> {
        let mut guard = self
            .document
            .lock()
            .map_err(|_| StoreError::Store("session store mutex poisoned".to_string()))?;
        *guard = document.clone();
        Ok(())
    }
}
