// crates/conductor-core/src/runtime/session.rs
// ============================================================================
// Module: Chain Session Manager
// Description: Registry of active runs with persistence on every mutation.
// Purpose: Enforce run-id allocation, the one-active-per-base rule, and sweeps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The session manager owns every chain session. Mutations are serialized
//! behind the registry mutex and persisted through the [`SessionStore`] after
//! every change, with one retry for transient store failures. Creating a run
//! for a base chain that already has an active run marks the prior run
//! dormant; lookups for missing run ids return `None` rather than failing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use thiserror::Error;

use crate::core::BaseChainId;
use crate::core::ChainSession;
use crate::core::RunId;
use crate::core::RunLifecycle;
use crate::core::RunStatus;
use crate::core::SessionBlueprint;
use crate::core::SessionRegistryDocument;
use crate::core::REGISTRY_VERSION;
use crate::interfaces::Clock;
use crate::interfaces::SessionStore;
use crate::interfaces::StoreError;

/// Stale-session sweep threshold: 24 hours of inactivity.
pub const STALE_AFTER_MS: i64 = 24 * 60 * 60 * 1000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Session manager errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Persistence failed after a retry.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Registry mutex was poisoned.
    #[error("session registry lock poisoned")]
    Poisoned,
}

// ============================================================================
// SECTION: Session Manager
// ============================================================================

/// Persistent registry of chain sessions.
pub struct ChainSessionManager {
    /// Persistence boundary.
    store: Arc<dyn SessionStore + Send + Sync>,
    /// Clock for activity stamps and sweeps.
    clock: Arc<dyn Clock + Send + Sync>,
    /// In-memory registry document, the single write-contended store.
    registry: Mutex<SessionRegistryDocument>,
}

impl ChainSessionManager {
    /// Creates a manager, loading the persisted registry.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] when the store fails in a
    /// non-recoverable way; corrupt documents load as empty upstream.
    pub fn new(
        store: Arc<dyn SessionStore + Send + Sync>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self, SessionError> {
        let mut document = store.load()?;
        document.version = REGISTRY_VERSION;
        Ok(Self {
            store,
            clock,
            registry: Mutex::new(document),
        })
    }

    /// Creates a new run for a blueprint, retiring any prior active run of
    /// the same base chain to dormant.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when persistence fails.
    pub fn create_run(
        &self,
        blueprint: SessionBlueprint,
        original_args: String,
    ) -> Result<ChainSession, SessionError> {
        let now = self.clock.now();
        let base = BaseChainId::for_prompt(&blueprint.command.prompt_id);
        let mut registry = self.lock()?;

        // Newest run wins; prior active runs of this base become dormant.
        let prior: Vec<String> =
            registry.base_runs.get(base.as_str()).cloned().unwrap_or_default();
        for run_key in &prior {
            if let Some(session) = registry.runs.get_mut(run_key) {
                if session.status == RunStatus::Active
                    && session.lifecycle == RunLifecycle::Canonical
                {
                    session.lifecycle = RunLifecycle::Dormant;
                    registry
                        .run_history
                        .entry(base.as_str().to_string())
                        .or_default()
                        .push(run_key.clone());
                }
            }
        }

        let ordinal = next_ordinal(&registry, &base);
        let run_id = RunId::numbered(&base, ordinal);
        let session =
            ChainSession::new(run_id.clone(), base.clone(), blueprint, original_args, now);

        registry.runs.insert(run_id.as_str().to_string(), session.clone());
        registry
            .run_mapping
            .insert(run_id.as_str().to_string(), base.as_str().to_string());
        registry
            .base_runs
            .entry(base.as_str().to_string())
            .or_default()
            .push(run_id.as_str().to_string());

        self.persist(&registry)?;
        Ok(session)
    }

    /// Returns a session snapshot by run id.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Poisoned`] when the registry lock is poisoned.
    pub fn get(&self, run_id: &RunId) -> Result<Option<ChainSession>, SessionError> {
        let registry = self.lock()?;
        Ok(registry.runs.get(run_id.as_str()).cloned())
    }

    /// Applies a mutation to a session and persists the registry.
    ///
    /// Returns `None` when the run id is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when persistence fails.
    pub fn update<T>(
        &self,
        run_id: &RunId,
        mutate: impl FnOnce(&mut ChainSession) -> T,
    ) -> Result<Option<T>, SessionError> {
        let mut registry = self.lock()?;
        let Some(session) = registry.runs.get_mut(run_id.as_str()) else {
            return Ok(None);
        };
        let outcome = mutate(session);
        self.persist(&registry)?;
        Ok(Some(outcome))
    }

    /// Returns the active run id for a base chain, when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Poisoned`] when the registry lock is poisoned.
    pub fn active_run_for_base(
        &self,
        base: &BaseChainId,
    ) -> Result<Option<RunId>, SessionError> {
        let now = self.clock.now();
        let registry = self.lock()?;
        let runs = registry.base_runs.get(base.as_str()).cloned().unwrap_or_default();
        for run_key in runs.iter().rev() {
            if let Some(session) = registry.runs.get(run_key) {
                if session.is_active(now, STALE_AFTER_MS) {
                    return Ok(Some(session.run_id.clone()));
                }
            }
        }
        Ok(None)
    }

    /// Removes a run from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when persistence fails.
    pub fn clear(&self, run_id: &RunId) -> Result<bool, SessionError> {
        let mut registry = self.lock()?;
        let removed = registry.runs.remove(run_id.as_str()).is_some();
        if removed {
            registry.run_mapping.remove(run_id.as_str());
            let base = run_id.base_part();
            if let Some(runs) = registry.base_runs.get_mut(base.as_str()) {
                runs.retain(|key| key != run_id.as_str());
            }
            self.persist(&registry)?;
        }
        Ok(removed)
    }

    /// Sweeps runs idle for longer than 24 hours.
    ///
    /// Idempotent and best-effort: swept run ids move to the per-base
    /// history.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when persistence fails.
    pub fn cleanup_stale(&self) -> Result<usize, SessionError> {
        let now = self.clock.now();
        let mut registry = self.lock()?;
        let stale: Vec<String> = registry
            .runs
            .iter()
            .filter(|(_, session)| now.millis_since(session.last_activity_at) > STALE_AFTER_MS)
            .map(|(key, _)| key.clone())
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        for run_key in &stale {
            if let Some(session) = registry.runs.remove(run_key) {
                registry.run_mapping.remove(run_key);
                let base = session.base_chain_id.as_str().to_string();
                if let Some(runs) = registry.base_runs.get_mut(&base) {
                    runs.retain(|key| key != run_key);
                }
                let history = registry.run_history.entry(base).or_default();
                if !history.contains(run_key) {
                    history.push(run_key.clone());
                }
            }
        }
        self.persist(&registry)?;
        Ok(stale.len())
    }

    /// Returns (total, active) run counts for status reporting.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Poisoned`] when the registry lock is poisoned.
    pub fn counts(&self) -> Result<(usize, usize), SessionError> {
        let now = self.clock.now();
        let registry = self.lock()?;
        let total = registry.runs.len();
        let active = registry
            .runs
            .values()
            .filter(|session| session.is_active(now, STALE_AFTER_MS))
            .count();
        Ok((total, active))
    }

    /// Locks the registry, mapping poisoning to an error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SessionRegistryDocument>, SessionError> {
        self.registry.lock().map_err(|_| SessionError::Poisoned)
    }

    /// Persists the registry with one retry for transient failures.
    fn persist(&self, document: &SessionRegistryDocument) -> Result<(), SessionError> {
        if self.store.save(document).is_ok() {
            return Ok(());
        }
        self.store.save(document).map_err(SessionError::Store)
    }
}

/// Returns the next 1-based ordinal for a base chain.
///
/// Ordinals never regress even after runs are cleared or swept: the maximum
/// suffix across live runs and history advances monotonically.
fn next_ordinal(registry: &SessionRegistryDocument, base: &BaseChainId) -> u64 {
    let live = registry.base_runs.get(base.as_str()).into_iter().flatten();
    let retired = registry.run_history.get(base.as_str()).into_iter().flatten();
    let highest = live
        .chain(retired)
        .filter_map(|run_key| run_key.rsplit_once('#'))
        .filter_map(|(_, suffix)| suffix.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    highest + 1
}
