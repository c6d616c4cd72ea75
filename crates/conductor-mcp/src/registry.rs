// crates/conductor-mcp/src/registry.rs
// ============================================================================
// Module: File-Backed Registries
// Description: YAML prompt, gate, script-tool, and framework catalogs.
// Purpose: Load the on-disk layout behind the core registry traits.
// Dependencies: conductor-core, serde_yaml
// ============================================================================

//! ## Overview
//! The core consumes abstract registries; this module loads them from the
//! documented layout: `prompts/{category}/{id}/prompt.yaml` with
//! `user-message.md` and optional `system-message.md`, per-prompt
//! `tools/{tool}/tool.yaml` with `schema.json`, and `gates/{id}/gate.yaml`
//! with optional `guidance.md`. Loading is fail-closed per entry: an invalid
//! definition is skipped and reported as a warning instead of poisoning the
//! whole catalog.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use conductor_core::ActivationRules;
use conductor_core::CategoryId;
use conductor_core::ChainStepSpec;
use conductor_core::EnforcementMode;
use conductor_core::FrameworkDefinition;
use conductor_core::FrameworkId;
use conductor_core::FrameworkRegistry;
use conductor_core::GateDefinition;
use conductor_core::GateId;
use conductor_core::GateKind;
use conductor_core::GateRegistry;
use conductor_core::GateSeverity;
use conductor_core::GateType;
use conductor_core::PassCriterion;
use conductor_core::PromptArgument;
use conductor_core::PromptId;
use conductor_core::PromptRecord;
use conductor_core::PromptRegistry;
use conductor_core::RegistryError;
use conductor_core::RetryConfig;
use conductor_core::ScriptRuntime;
use conductor_core::ScriptTool;
use conductor_core::ScriptToolRegistry;
use conductor_core::ToolExecutionConfig;
use conductor_core::ToolId;
use serde::Deserialize;

// ============================================================================
// SECTION: Prompt Files
// ============================================================================

/// `prompt.yaml` schema.
#[derive(Debug, Deserialize)]
struct PromptFile {
    /// Human-readable prompt name.
    name: String,
    /// Optional category override; defaults to the parent directory.
    #[serde(default)]
    category: Option<String>,
    /// Prompt description.
    #[serde(default)]
    description: String,
    /// Declared template arguments.
    #[serde(default)]
    arguments: Vec<PromptArgument>,
    /// Chain steps for multi-step prompts.
    #[serde(default)]
    chain: Vec<ChainStepSpec>,
    /// Gate ids the prompt explicitly requests.
    #[serde(default)]
    gates: Vec<GateId>,
    /// Inline user template when `user-message.md` is absent.
    #[serde(default)]
    user_message: Option<String>,
    /// Inline system template when `system-message.md` is absent.
    #[serde(default)]
    system_message: Option<String>,
}

/// File-backed prompt catalog.
pub struct FilePromptRegistry {
    /// Prompt catalog root.
    root: PathBuf,
    /// Optional user data root for created prompts.
    resources_root: Option<PathBuf>,
    /// Loaded records keyed by prompt id.
    records: Mutex<BTreeMap<PromptId, PromptRecord>>,
    /// Per-entry load warnings.
    warnings: Mutex<Vec<String>>,
}

impl FilePromptRegistry {
    /// Loads the catalog under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] when the root cannot be scanned; invalid
    /// entries become warnings, not errors.
    pub fn load(root: PathBuf) -> Result<Self, RegistryError> {
        Self::load_with_resources(root, None)
    }

    /// Loads the catalog under `root` plus user-created prompts under the
    /// resources root.
    ///
    /// Resources entries win on id collisions so user edits shadow shipped
    /// prompts. The resources root may not exist yet; it is created lazily on
    /// the first authored write.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] when a present root cannot be scanned.
    pub fn load_with_resources(
        root: PathBuf,
        resources_root: Option<PathBuf>,
    ) -> Result<Self, RegistryError> {
        let registry = Self {
            root,
            resources_root,
            records: Mutex::new(BTreeMap::new()),
            warnings: Mutex::new(Vec::new()),
        };
        registry.reload()?;
        Ok(registry)
    }

    /// Rescans the catalog, replacing the loaded records.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] when a present root cannot be scanned.
    pub fn reload(&self) -> Result<usize, RegistryError> {
        let mut records = BTreeMap::new();
        let mut warnings = Vec::new();

        if self.root.is_dir() {
            scan_prompt_tree(&self.root, &mut records, &mut warnings)?;
        } else {
            warnings.push(format!("prompt root '{}' does not exist", self.root.display()));
        }
        if let Some(resources) = &self.resources_root {
            if resources.is_dir() {
                scan_prompt_tree(resources, &mut records, &mut warnings)?;
            }
        }

        let count = records.len();
        if let Ok(mut guard) = self.records.lock() {
            *guard = records;
        }
        if let Ok(mut guard) = self.warnings.lock() {
            *guard = warnings;
        }
        Ok(count)
    }

    /// Returns the warnings from the last load.
    #[must_use]
    pub fn load_warnings(&self) -> Vec<String> {
        self.warnings.lock().map_or_else(|_| Vec::new(), |guard| guard.clone())
    }

    /// Returns the directory holding one prompt in the shipped catalog.
    #[must_use]
    pub fn prompt_dir(&self, id: &PromptId, category: &CategoryId) -> PathBuf {
        self.root.join(category.as_str()).join(id.as_str())
    }

    /// Returns the directory authored prompts are written to: the resources
    /// root when configured, else the shipped catalog.
    #[must_use]
    pub fn authoring_dir(&self, id: &PromptId, category: &CategoryId) -> PathBuf {
        match &self.resources_root {
            Some(resources) => resources.join(category.as_str()).join(id.as_str()),
            None => self.prompt_dir(id, category),
        }
    }

    /// Replaces one record in memory (used by the authoring manager).
    pub(crate) fn insert_record(&self, record: PromptRecord) {
        if let Ok(mut guard) = self.records.lock() {
            guard.insert(record.id.clone(), record);
        }
    }

    /// Removes one record from memory (used by the authoring manager).
    pub(crate) fn remove_record(&self, id: &PromptId) -> bool {
        self.records.lock().is_ok_and(|mut guard| guard.remove(id).is_some())
    }
}

impl PromptRegistry for FilePromptRegistry {
    fn get(&self, id: &PromptId) -> Result<Option<PromptRecord>, RegistryError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| RegistryError::Backend("prompt registry lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<PromptRecord>, RegistryError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| RegistryError::Backend("prompt registry lock poisoned".to_string()))?;
        Ok(guard.values().cloned().collect())
    }
}

/// Scans one `{category}/{id}` prompt tree into the record map.
fn scan_prompt_tree(
    root: &Path,
    records: &mut BTreeMap<PromptId, PromptRecord>,
    warnings: &mut Vec<String>,
) -> Result<(), RegistryError> {
    for category_entry in read_dir_sorted(root)? {
        if !category_entry.is_dir() {
            continue;
        }
        let category = dir_name(&category_entry);
        for prompt_entry in read_dir_sorted(&category_entry)? {
            if !prompt_entry.is_dir() {
                continue;
            }
            match load_prompt(&prompt_entry, &category) {
                Ok(record) => {
                    records.insert(record.id.clone(), record);
                }
                Err(reason) => warnings
                    .push(format!("skipped prompt '{}': {reason}", prompt_entry.display())),
            }
        }
    }
    Ok(())
}

/// Loads one prompt directory.
fn load_prompt(dir: &Path, category: &str) -> Result<PromptRecord, String> {
    let manifest_path = dir.join("prompt.yaml");
    let text = std::fs::read_to_string(&manifest_path).map_err(|err| err.to_string())?;
    let file: PromptFile = serde_yaml::from_str(&text).map_err(|err| err.to_string())?;

    let user_template = match read_optional(&dir.join("user-message.md")) {
        Some(text) => text,
        None => file.user_message.ok_or("missing user-message.md and user_message")?,
    };
    let system_template =
        read_optional(&dir.join("system-message.md")).or(file.system_message);

    let id = PromptId::normalize(&dir_name(dir));
    if !id.is_canonical() {
        return Err(format!("prompt id '{id}' is not canonical"));
    }
    Ok(PromptRecord {
        id,
        name: file.name,
        category: CategoryId::normalize(file.category.as_deref().unwrap_or(category)),
        description: file.description,
        user_template,
        system_template,
        arguments: file.arguments,
        chain_steps: file.chain,
        gate_ids: file.gates,
    })
}

// ============================================================================
// SECTION: Gate Files
// ============================================================================

/// `gate.yaml` schema.
#[derive(Debug, Deserialize)]
struct GateFile {
    /// Human-readable gate name.
    name: String,
    /// Gate policy type.
    #[serde(rename = "type")]
    gate_type: GateType,
    /// Gate severity.
    severity: GateSeverity,
    /// Optional enforcement override.
    #[serde(default)]
    enforcement: Option<EnforcementMode>,
    /// Inline guidance text.
    #[serde(default)]
    guidance: Option<String>,
    /// Guidance markdown file relative to the gate directory.
    #[serde(default)]
    guidance_file: Option<String>,
    /// Pass criteria.
    #[serde(default)]
    pass_criteria: Vec<PassCriterion>,
    /// Activation rules.
    #[serde(default)]
    activation: ActivationRules,
    /// Retry configuration.
    #[serde(default)]
    retry: RetryConfig,
    /// Gate origin classification.
    #[serde(default = "default_kind")]
    kind: GateKind,
}

/// Default gate kind for files that omit the field.
const fn default_kind() -> GateKind {
    GateKind::Custom
}

/// File-backed gate catalog.
pub struct FileGateRegistry {
    /// Loaded definitions keyed by gate id.
    definitions: Mutex<BTreeMap<GateId, GateDefinition>>,
    /// Gate catalog root.
    root: PathBuf,
    /// Per-entry load warnings.
    warnings: Mutex<Vec<String>>,
}

impl FileGateRegistry {
    /// Loads the catalog under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] when the root cannot be scanned.
    pub fn load(root: PathBuf) -> Result<Self, RegistryError> {
        let registry = Self {
            definitions: Mutex::new(BTreeMap::new()),
            root,
            warnings: Mutex::new(Vec::new()),
        };
        registry.reload()?;
        Ok(registry)
    }

    /// Rescans the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] when the root cannot be scanned.
    pub fn reload(&self) -> Result<usize, RegistryError> {
        let mut definitions = BTreeMap::new();
        let mut warnings = Vec::new();

        if self.root.is_dir() {
            for gate_entry in read_dir_sorted(&self.root)? {
                if !gate_entry.is_dir() {
                    continue;
                }
                match load_gate(&gate_entry) {
                    Ok(definition) => {
                        definitions.insert(definition.id.clone(), definition);
                    }
                    Err(reason) => warnings
                        .push(format!("skipped gate '{}': {reason}", gate_entry.display())),
                }
            }
        } else {
            warnings.push(format!("gate root '{}' does not exist", self.root.display()));
        }

        let count = definitions.len();
        if let Ok(mut guard) = self.definitions.lock() {
            *guard = definitions;
        }
        if let Ok(mut guard) = self.warnings.lock() {
            *guard = warnings;
        }
        Ok(count)
    }

    /// Returns the warnings from the last load.
    #[must_use]
    pub fn load_warnings(&self) -> Vec<String> {
        self.warnings.lock().map_or_else(|_| Vec::new(), |guard| guard.clone())
    }
}

impl GateRegistry for FileGateRegistry {
    fn get(&self, id: &GateId) -> Result<Option<GateDefinition>, RegistryError> {
        let guard = self
            .definitions
            .lock()
            .map_err(|_| RegistryError::Backend("gate registry lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<GateDefinition>, RegistryError> {
        let guard = self
            .definitions
            .lock()
            .map_err(|_| RegistryError::Backend("gate registry lock poisoned".to_string()))?;
        Ok(guard.values().cloned().collect())
    }
}

/// Loads one gate directory.
fn load_gate(dir: &Path) -> Result<GateDefinition, String> {
    let text =
        std::fs::read_to_string(dir.join("gate.yaml")).map_err(|err| err.to_string())?;
    let file: GateFile = serde_yaml::from_str(&text).map_err(|err| err.to_string())?;

    let guidance = match &file.guidance_file {
        Some(name) => Some(
            std::fs::read_to_string(dir.join(name)).map_err(|err| err.to_string())?,
        ),
        None => file.guidance,
    };

    Ok(GateDefinition {
        id: GateId::new(dir_name(dir)),
        name: file.name,
        gate_type: file.gate_type,
        severity: file.severity,
        enforcement: file.enforcement,
        guidance,
        pass_criteria: file.pass_criteria,
        activation: file.activation,
        retry: file.retry,
        kind: file.kind,
    })
}

// ============================================================================
// SECTION: Script Tool Files
// ============================================================================

/// `tool.yaml` schema.
#[derive(Debug, Deserialize)]
struct ToolFile {
    /// Human-readable tool name.
    name: String,
    /// Script filename relative to the tool directory.
    script: String,
    /// Script runtime.
    #[serde(default)]
    runtime: ScriptRuntime,
    /// Execution configuration.
    #[serde(default)]
    execution: ToolExecutionConfig,
    /// Timeout in milliseconds.
    #[serde(default)]
    timeout_ms: Option<u64>,
    /// Extra environment variables.
    #[serde(default)]
    env: BTreeMap<String, String>,
    /// Working subdirectory below the tool directory.
    #[serde(default)]
    working_dir: Option<String>,
    /// Whether the tool is enabled.
    #[serde(default = "default_enabled")]
    enabled: bool,
}

/// Tools default to enabled.
const fn default_enabled() -> bool {
    true
}

/// File-backed script tool catalog keyed by declaring prompt.
pub struct FileScriptToolRegistry {
    /// Loaded tools keyed by prompt id.
    tools: Mutex<BTreeMap<PromptId, Vec<ScriptTool>>>,
    /// Per-entry load warnings.
    warnings: Mutex<Vec<String>>,
}

impl FileScriptToolRegistry {
    /// Scans the prompt catalog for `tools/` directories.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] when the root cannot be scanned.
    pub fn load(prompt_root: &Path) -> Result<Self, RegistryError> {
        let mut tools: BTreeMap<PromptId, Vec<ScriptTool>> = BTreeMap::new();
        let mut warnings = Vec::new();

        if prompt_root.is_dir() {
            for category_entry in read_dir_sorted(prompt_root)? {
                if !category_entry.is_dir() {
                    continue;
                }
                for prompt_entry in read_dir_sorted(&category_entry)? {
                    let tools_dir = prompt_entry.join("tools");
                    if !tools_dir.is_dir() {
                        continue;
                    }
                    let prompt_id = PromptId::normalize(&dir_name(&prompt_entry));
                    for tool_entry in read_dir_sorted(&tools_dir)? {
                        if !tool_entry.is_dir() {
                            continue;
                        }
                        match load_tool(&tool_entry) {
                            Ok(tool) => tools.entry(prompt_id.clone()).or_default().push(tool),
                            Err(reason) => warnings.push(format!(
                                "skipped tool '{}': {reason}",
                                tool_entry.display()
                            )),
                        }
                    }
                }
            }
        }

        Ok(Self {
            tools: Mutex::new(tools),
            warnings: Mutex::new(warnings),
        })
    }

    /// Returns the warnings from the last load.
    #[must_use]
    pub fn load_warnings(&self) -> Vec<String> {
        self.warnings.lock().map_or_else(|_| Vec::new(), |guard| guard.clone())
    }
}

impl ScriptToolRegistry for FileScriptToolRegistry {
    fn tools_for_prompt(&self, id: &PromptId) -> Result<Vec<ScriptTool>, RegistryError> {
        let guard = self
            .tools
            .lock()
            .map_err(|_| RegistryError::Backend("tool registry lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned().unwrap_or_default())
    }
}

/// Loads one tool directory.
fn load_tool(dir: &Path) -> Result<ScriptTool, String> {
    let text =
        std::fs::read_to_string(dir.join("tool.yaml")).map_err(|err| err.to_string())?;
    let file: ToolFile = serde_yaml::from_str(&text).map_err(|err| err.to_string())?;

    let schema_text =
        std::fs::read_to_string(dir.join("schema.json")).map_err(|err| err.to_string())?;
    let input_schema: serde_json::Value =
        serde_json::from_str(&schema_text).map_err(|err| err.to_string())?;

    let script_path = dir.join(&file.script);
    if !script_path.is_file() {
        return Err(format!("script '{}' not found", script_path.display()));
    }

    Ok(ScriptTool {
        id: ToolId::new(dir_name(dir)),
        name: file.name,
        script_path,
        runtime: file.runtime,
        input_schema,
        execution: file.execution,
        timeout_ms: file.timeout_ms,
        env: file.env,
        working_dir: file.working_dir,
        enabled: file.enabled,
    })
}

// ============================================================================
// SECTION: Built-In Frameworks
// ============================================================================

/// Built-in methodology framework catalog.
///
/// Framework system prompts ship with the server; prompt authors select one
/// with `@ID` or rely on the analyzer recommendation.
#[derive(Debug, Default, Clone)]
pub struct BuiltinFrameworkRegistry;

impl FrameworkRegistry for BuiltinFrameworkRegistry {
    fn get(&self, id: &FrameworkId) -> Result<Option<FrameworkDefinition>, RegistryError> {
        Ok(builtin_frameworks()
            .into_iter()
            .find(|framework| framework.id.matches(id)))
    }
}

/// Returns the built-in framework definitions.
#[must_use]
pub fn builtin_frameworks() -> Vec<FrameworkDefinition> {
    vec![
        FrameworkDefinition {
            id: FrameworkId::new("CAGEERF"),
            name: "CAGEERF".to_string(),
            system_prompt: "Apply the CAGEERF methodology: establish Context, state \
                            Assumptions, set Goals, Execute systematically, Evaluate \
                            outcomes, Refine the approach, and Finalize with a clear \
                            deliverable."
                .to_string(),
        },
        FrameworkDefinition {
            id: FrameworkId::new("REACT"),
            name: "ReACT".to_string(),
            system_prompt: "Apply the ReACT pattern: interleave explicit Reasoning steps \
                            with Actions, observe the result of each action, and let \
                            observations drive the next thought."
                .to_string(),
        },
        FrameworkDefinition {
            id: FrameworkId::new("5W1H"),
            name: "5W1H".to_string(),
            system_prompt: "Apply the 5W1H method: answer Who, What, When, Where, Why, \
                            and How before drawing conclusions."
                .to_string(),
        },
        FrameworkDefinition {
            id: FrameworkId::new("SCAMPER"),
            name: "SCAMPER".to_string(),
            system_prompt: "Apply SCAMPER: consider Substitute, Combine, Adapt, Modify, \
                            Put to another use, Eliminate, and Reverse when exploring the \
                            problem."
                .to_string(),
        },
    ]
}

// ============================================================================
// SECTION: Directory Helpers
// ============================================================================

/// Returns the sorted entries of a directory.
fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, RegistryError> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|err| RegistryError::Io(format!("{}: {err}", dir.display())))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .collect();
    entries.sort();
    Ok(entries)
}

/// Returns the final path component as a string.
fn dir_name(path: &Path) -> String {
    path.file_name().map_or_else(String::new, |name| name.to_string_lossy().to_string())
}

/// Reads a file when it exists.
fn read_optional(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}
