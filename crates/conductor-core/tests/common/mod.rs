// conductor-core/tests/common/mod.rs
// ============================================================================
// Module: Engine Test Fixtures
// Description: In-memory registries and a scripted runner for engine tests.
// ============================================================================
//! ## Overview
//! Static registry implementations backing the end-to-end engine scenarios.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Fixtures are shared across test binaries that use different subsets."
)]

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use conductor_core::Clock;
use conductor_core::EngineConfig;
use conductor_core::EngineServices;
use conductor_core::FrameworkDefinition;
use conductor_core::FrameworkId;
use conductor_core::FrameworkRegistry;
use conductor_core::GateDefinition;
use conductor_core::GateId;
use conductor_core::GateRegistry;
use conductor_core::InMemorySessionStore;
use conductor_core::InjectionSettings;
use conductor_core::ManualClock;
use conductor_core::NoopEngineMetrics;
use conductor_core::PromptEngine;
use conductor_core::PromptId;
use conductor_core::PromptRecord;
use conductor_core::PromptRegistry;
use conductor_core::RegistryError;
use conductor_core::ScriptDisposition;
use conductor_core::ScriptRunError;
use conductor_core::ScriptRunner;
use conductor_core::ScriptTool;
use conductor_core::ScriptToolRegistry;
use conductor_core::CategoryId;
use conductor_core::Timestamp;

/// Static prompt catalog.
pub struct StaticPrompts {
    /// Records keyed by id.
    pub records: BTreeMap<PromptId, PromptRecord>,
}

impl PromptRegistry for StaticPrompts {
    fn get(&self, id: &PromptId) -> Result<Option<PromptRecord>, RegistryError> {
        Ok(self.records.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<PromptRecord>, RegistryError> {
        Ok(self.records.values().cloned().collect())
    }
}

/// Static gate catalog.
pub struct StaticGates {
    /// All definitions.
    pub gates: Vec<GateDefinition>,
}

impl GateRegistry for StaticGates {
    fn get(&self, id: &GateId) -> Result<Option<GateDefinition>, RegistryError> {
        Ok(self.gates.iter().find(|gate| &gate.id == id).cloned())
    }

    fn list(&self) -> Result<Vec<GateDefinition>, RegistryError> {
        Ok(self.gates.clone())
    }
}

/// Static framework catalog.
pub struct StaticFrameworks {
    /// All definitions.
    pub frameworks: Vec<FrameworkDefinition>,
}

impl FrameworkRegistry for StaticFrameworks {
    fn get(&self, id: &FrameworkId) -> Result<Option<FrameworkDefinition>, RegistryError> {
        Ok(self.frameworks.iter().find(|framework| framework.id.matches(id)).cloned())
    }
}

/// Static script-tool catalog.
pub struct StaticTools {
    /// Tools keyed by prompt id.
    pub tools: BTreeMap<PromptId, Vec<ScriptTool>>,
}

impl ScriptToolRegistry for StaticTools {
    fn tools_for_prompt(&self, id: &PromptId) -> Result<Vec<ScriptTool>, RegistryError> {
        Ok(self.tools.get(id).cloned().unwrap_or_default())
    }
}

/// Script runner replaying queued dispositions.
pub struct ScriptedRunner {
    /// Dispositions returned in order; empty queue yields no-match.
    pub queue: Mutex<VecDeque<ScriptDisposition>>,
}

impl ScriptedRunner {
    /// Creates a runner that never matches.
    pub fn no_match() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Creates a runner replaying the given dispositions.
    pub fn replay(dispositions: Vec<ScriptDisposition>) -> Self {
        Self {
            queue: Mutex::new(dispositions.into()),
        }
    }
}

#[async_trait::async_trait]
impl ScriptRunner for ScriptedRunner {
    async fn run_for_prompt(
        &self,
        _prompt_id: &PromptId,
        _tools: &[ScriptTool],
        _raw_args: &str,
        _bindings: &BTreeMap<String, String>,
    ) -> Result<ScriptDisposition, ScriptRunError> {
        Ok(self
            .queue
            .lock()
            .expect("queue lock")
            .pop_front()
            .unwrap_or(ScriptDisposition::NoMatch))
    }
}

/// Builds a simple single-template prompt record.
pub fn prompt(id: &str, template: &str) -> PromptRecord {
    PromptRecord {
        id: PromptId::new(id),
        name: id.to_string(),
        category: CategoryId::new("general"),
        description: String::new(),
        user_template: template.to_string(),
        system_template: None,
        arguments: vec![conductor_core::PromptArgument {
            name: "text".to_string(),
            required: false,
            description: None,
        }],
        chain_steps: Vec::new(),
        gate_ids: Vec::new(),
    }
}

/// Everything an engine test needs to build and drive an engine.
pub struct Harness {
    /// Engine under test.
    pub engine: PromptEngine,
    /// Backing store for registry assertions.
    pub store: Arc<InMemorySessionStore>,
    /// Manual clock.
    pub clock: Arc<ManualClock>,
}

/// Builds an engine over static catalogs.
pub fn harness(
    prompts: Vec<PromptRecord>,
    gates: Vec<GateDefinition>,
    tools: BTreeMap<PromptId, Vec<ScriptTool>>,
    scripts: Arc<dyn ScriptRunner + Send + Sync>,
) -> Harness {
    let clock = Arc::new(ManualClock::starting_at(Timestamp::from_unix_millis(10_000)));
    let store = Arc::new(InMemorySessionStore::new());
    let services = EngineServices {
        prompts: Arc::new(StaticPrompts {
            records: prompts.into_iter().map(|record| (record.id.clone(), record)).collect(),
        }),
        gates: Arc::new(StaticGates {
            gates,
        }),
        frameworks: Arc::new(StaticFrameworks {
            frameworks: vec![FrameworkDefinition {
                id: FrameworkId::new("CAGEERF"),
                name: "CAGEERF".to_string(),
                system_prompt: "Apply the CAGEERF methodology.".to_string(),
            }],
        }),
        tools: Arc::new(StaticTools {
            tools,
        }),
        scripts,
        analyzer: None,
        metrics: Arc::new(NoopEngineMetrics),
        clock: clock.clone() as Arc<dyn Clock + Send + Sync>,
    };
    let engine = PromptEngine::new(
        services,
        store.clone(),
        InjectionSettings::default(),
        EngineConfig::default(),
    )
    .expect("engine construction");
    Harness {
        engine,
        store,
        clock,
    }
}
