//! Supervision configuration: which supervisors guard which tools.
//!
//! A `SupervisionConfig` is built once per agent run through
//! `SupervisionConfigBuilder`, optionally registered with a backend, and then
//! shared read-only (behind an `Arc`) by every guarded tool. Nothing in it
//! changes while calls are being supervised.
//!
//! Chains can be given directly as supervisor handles or by supervisor name,
//! either in code or from a TOML document:
//!
//! ```toml
//! global = [["audit-trail"]]
//!
//! [tools.divide]
//! chains = [["positive-divisor", "human-review"]]
//! ignored_attributes = ["request_id"]
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sentinel_contracts::{
    error::{SentinelError, SentinelResult},
    ids::{ChainId, RunId, SupervisorId, ToolId},
    mock::MockPolicy,
    remote::ToolSpec,
};

use crate::{
    chain::{Chain, ChainMember, ChainSet, SupervisorRef},
    evaluator::ChainEvaluator,
    traits::{DecisionLog, MockStrategy, RegistrationBackend},
};

// ── TOML schema ──────────────────────────────────────────────────────────────

/// Chain configuration for one tool, by supervisor name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolChainsEntry {
    /// Ordered chains of supervisor names.
    #[serde(default)]
    pub chains: Vec<Vec<String>>,

    /// Arguments that no modification may overwrite.
    #[serde(default)]
    pub ignored_attributes: Vec<String>,

    /// Overrides the configuration-wide mock policy for this tool.
    #[serde(default)]
    pub mock: Option<MockPolicy>,
}

/// Top-level structure deserialized from a chains TOML document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainsFile {
    /// Chains applied to every tool, after the tool's own chains.
    #[serde(default)]
    pub global: Vec<Vec<String>>,

    #[serde(default)]
    pub tools: BTreeMap<String, ToolChainsEntry>,
}

impl ChainsFile {
    /// Parse `s` as TOML.
    ///
    /// Returns `SentinelError::Config` if the TOML is malformed or does not
    /// match the expected schema.
    pub fn from_toml_str(s: &str) -> SentinelResult<Self> {
        toml::from_str(s)
            .map_err(|e| SentinelError::config(format!("failed to parse chains TOML: {}", e)))
    }

    /// Read and parse the file at `path`.
    pub fn from_file(path: &Path) -> SentinelResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SentinelError::config(format!(
                "failed to read chains file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }
}

// ── Resolved configuration ───────────────────────────────────────────────────

/// Supervision settings for one tool.
#[derive(Debug, Clone, Default)]
pub struct ToolSupervision {
    pub chains: Vec<Chain>,
    pub ignored_attributes: BTreeSet<String>,
    pub mock: Option<MockPolicy>,
}

/// Backend ids obtained when the configuration was registered.
#[derive(Debug, Clone)]
pub struct Registration {
    pub run_id: RunId,
    pub tool_ids: HashMap<String, ToolId>,
    pub supervisor_ids: HashMap<String, SupervisorId>,
    /// Chain ids per tool, aligned with the tool's resolved chain set.
    pub chain_ids: HashMap<String, Vec<ChainId>>,
}

/// The immutable supervision registry for one agent run.
pub struct SupervisionConfig {
    supervisors: BTreeMap<String, SupervisorRef>,
    tools: HashMap<String, ToolSupervision>,
    global: Vec<Chain>,
    mock_policy: MockPolicy,
    mock_strategy: Option<Arc<dyn MockStrategy>>,
    evaluator: ChainEvaluator,
    registration: Option<Registration>,
}

impl SupervisionConfig {
    pub fn builder() -> SupervisionConfigBuilder {
        SupervisionConfigBuilder::default()
    }

    /// Look up a supervisor implementation by name.
    pub fn supervisor(&self, name: &str) -> Option<&SupervisorRef> {
        self.supervisors.get(name)
    }

    pub fn tool(&self, name: &str) -> Option<&ToolSupervision> {
        self.tools.get(name)
    }

    pub fn evaluator(&self) -> &ChainEvaluator {
        &self.evaluator
    }

    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.registration.as_ref().map(|r| r.run_id)
    }

    pub fn mock_strategy(&self) -> Option<&Arc<dyn MockStrategy>> {
        self.mock_strategy.as_ref()
    }

    /// The mock policy in force for `tool`.
    pub fn mock_policy(&self, tool: &str) -> &MockPolicy {
        self.tools
            .get(tool)
            .and_then(|t| t.mock.as_ref())
            .unwrap_or(&self.mock_policy)
    }

    /// Arguments of `tool` that modifications may not touch.
    pub fn ignored_attributes(&self, tool: &str) -> BTreeSet<String> {
        self.tools
            .get(tool)
            .map(|t| t.ignored_attributes.clone())
            .unwrap_or_default()
    }

    /// Resolve the chain set guarding `tool`.
    ///
    /// Tool-specific chains come first, then global chains; duplicate
    /// supervisors are dropped after their first appearance. Registered ids
    /// are attached when available.
    pub fn chain_set(&self, tool: &str) -> ChainSet {
        let own = self
            .tools
            .get(tool)
            .map(|t| t.chains.clone())
            .unwrap_or_default();
        let mut set = ChainSet::new(own.into_iter().chain(self.global.clone()).collect());

        if let Some(registration) = &self.registration {
            let chain_ids = registration.chain_ids.get(tool);
            set = ChainSet::new(
                set.chains()
                    .iter()
                    .enumerate()
                    .map(|(index, chain)| Chain {
                        members: chain
                            .members
                            .iter()
                            .map(|m| ChainMember {
                                supervisor: Arc::clone(&m.supervisor),
                                supervisor_id: registration
                                    .supervisor_ids
                                    .get(m.name())
                                    .copied(),
                            })
                            .collect(),
                        chain_id: chain_ids.and_then(|ids| ids.get(index)).copied(),
                    })
                    .collect(),
            );
        }
        set
    }

    /// Register the run, every supervisor, every configured tool, and the
    /// chain assignments with `backend`.
    ///
    /// `tools` supplies descriptions and schemas; configured tools missing
    /// from it are registered by name only. Must complete before any guarded
    /// call so that evaluation only ever reads the registration.
    pub async fn register(
        mut self,
        backend: &dyn RegistrationBackend,
        run_name: &str,
        tools: &[ToolSpec],
    ) -> SentinelResult<Self> {
        let run_id = backend.create_run(run_name).await?;
        info!(run_id = %run_id, run = %run_name, "run created");

        let mut supervisor_ids = HashMap::new();
        for (name, supervisor) in &self.supervisors {
            let id = backend.register_supervisor(&supervisor.spec()).await?;
            debug!(supervisor = %name, supervisor_id = %id, "supervisor registered");
            supervisor_ids.insert(name.clone(), id);
        }

        let mut tool_names: BTreeSet<String> = self.tools.keys().cloned().collect();
        tool_names.extend(tools.iter().map(|t| t.name.clone()));

        let mut tool_ids = HashMap::new();
        let mut chain_ids = HashMap::new();
        for name in tool_names {
            let spec = tools
                .iter()
                .find(|t| t.name == name)
                .cloned()
                .unwrap_or_else(|| ToolSpec {
                    name: name.clone(),
                    description: String::new(),
                    schema: serde_json::Value::Null,
                });
            let tool_id = backend.register_tool(run_id, &spec).await?;

            let chains: Vec<Vec<SupervisorId>> = self
                .chain_set(&name)
                .chains()
                .iter()
                .map(|chain| {
                    chain
                        .members
                        .iter()
                        .filter_map(|m| supervisor_ids.get(m.name()).copied())
                        .collect()
                })
                .collect();
            let ids = if chains.is_empty() {
                Vec::new()
            } else {
                backend.assign_supervisors(run_id, tool_id, &chains).await?
            };
            debug!(tool = %name, tool_id = %tool_id, chains = ids.len(), "tool registered");

            tool_ids.insert(name.clone(), tool_id);
            chain_ids.insert(name, ids);
        }

        self.registration = Some(Registration {
            run_id,
            tool_ids,
            supervisor_ids,
            chain_ids,
        });
        Ok(self)
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

enum ChainSpec {
    Direct(Vec<SupervisorRef>),
    Named(Vec<String>),
}

#[derive(Default)]
struct PendingTool {
    chains: Vec<ChainSpec>,
    ignored_attributes: BTreeSet<String>,
    mock: Option<MockPolicy>,
}

/// Collects supervisors and chains, then resolves names in `build()`.
#[derive(Default)]
pub struct SupervisionConfigBuilder {
    supervisors: BTreeMap<String, SupervisorRef>,
    tools: BTreeMap<String, PendingTool>,
    global: Vec<ChainSpec>,
    mock_policy: MockPolicy,
    mock_strategy: Option<Arc<dyn MockStrategy>>,
    decision_log: Option<Arc<dyn DecisionLog>>,
}

impl SupervisionConfigBuilder {
    /// Make `supervisor` available by name.
    ///
    /// The first supervisor registered under a name wins; later ones with
    /// the same name are ignored.
    pub fn supervisor(mut self, supervisor: SupervisorRef) -> Self {
        self.add_supervisor(&supervisor);
        self
    }

    /// Guard `tool` with `chains`, never letting a modification touch
    /// `ignored_attributes`. May be called more than once per tool; chains
    /// accumulate in call order.
    pub fn configure<I, S>(mut self, tool: &str, chains: Vec<Vec<SupervisorRef>>, ignored_attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for chain in &chains {
            for supervisor in chain {
                self.add_supervisor(supervisor);
            }
        }
        let entry = self.tools.entry(tool.to_string()).or_default();
        entry.chains.extend(chains.into_iter().map(ChainSpec::Direct));
        entry
            .ignored_attributes
            .extend(ignored_attributes.into_iter().map(Into::into));
        self
    }

    /// Like `configure`, but chains reference supervisors by name. Unknown
    /// names fail `build()`.
    pub fn configure_by_name<I, S>(mut self, tool: &str, chains: Vec<Vec<String>>, ignored_attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.tools.entry(tool.to_string()).or_default();
        entry.chains.extend(chains.into_iter().map(ChainSpec::Named));
        entry
            .ignored_attributes
            .extend(ignored_attributes.into_iter().map(Into::into));
        self
    }

    /// Chains applied to every tool after its own.
    pub fn global_chains(mut self, chains: Vec<Vec<SupervisorRef>>) -> Self {
        for chain in &chains {
            for supervisor in chain {
                self.add_supervisor(supervisor);
            }
        }
        self.global.extend(chains.into_iter().map(ChainSpec::Direct));
        self
    }

    /// Add everything declared in a chains file.
    pub fn chains_file(mut self, file: ChainsFile) -> Self {
        self.global
            .extend(file.global.into_iter().map(ChainSpec::Named));
        for (tool, entry) in file.tools {
            let mock = entry.mock.clone();
            self = self.configure_by_name(&tool, entry.chains, entry.ignored_attributes);
            if let Some(mock) = mock {
                self = self.tool_mock_policy(&tool, mock);
            }
        }
        self
    }

    /// Mock policy applied to every tool without its own.
    pub fn mock_policy(mut self, policy: MockPolicy) -> Self {
        self.mock_policy = policy;
        self
    }

    pub fn tool_mock_policy(mut self, tool: &str, policy: MockPolicy) -> Self {
        self.tools.entry(tool.to_string()).or_default().mock = Some(policy);
        self
    }

    pub fn mock_strategy(mut self, strategy: Arc<dyn MockStrategy>) -> Self {
        self.mock_strategy = Some(strategy);
        self
    }

    pub fn decision_log(mut self, log: Arc<dyn DecisionLog>) -> Self {
        self.decision_log = Some(log);
        self
    }

    /// Resolve every named chain and freeze the configuration.
    ///
    /// Returns `SentinelError::Config` if a chain names a supervisor that was
    /// never made available.
    pub fn build(self) -> SentinelResult<SupervisionConfig> {
        let mut tools = HashMap::with_capacity(self.tools.len());
        for (name, pending) in self.tools {
            let chains = pending
                .chains
                .into_iter()
                .map(|spec| resolve(&self.supervisors, spec, &name))
                .collect::<SentinelResult<Vec<_>>>()?;
            tools.insert(
                name,
                ToolSupervision {
                    chains,
                    ignored_attributes: pending.ignored_attributes,
                    mock: pending.mock,
                },
            );
        }

        let global = self
            .global
            .into_iter()
            .map(|spec| resolve(&self.supervisors, spec, "*"))
            .collect::<SentinelResult<Vec<_>>>()?;

        let evaluator = match self.decision_log {
            Some(log) => ChainEvaluator::with_log(log),
            None => ChainEvaluator::new(),
        };

        Ok(SupervisionConfig {
            supervisors: self.supervisors,
            tools,
            global,
            mock_policy: self.mock_policy,
            mock_strategy: self.mock_strategy,
            evaluator,
            registration: None,
        })
    }

    fn add_supervisor(&mut self, supervisor: &SupervisorRef) {
        let name = supervisor.name().to_string();
        if self.supervisors.contains_key(&name) {
            debug!(supervisor = %name, "supervisor already known, keeping first");
            return;
        }
        self.supervisors.insert(name, Arc::clone(supervisor));
    }
}

fn resolve(
    supervisors: &BTreeMap<String, SupervisorRef>,
    spec: ChainSpec,
    tool: &str,
) -> SentinelResult<Chain> {
    match spec {
        // Direct handles go through the name map so one name is always one
        // implementation.
        ChainSpec::Direct(list) => Ok(Chain::new(
            list.into_iter()
                .map(|s| supervisors.get(s.name()).cloned().unwrap_or(s))
                .collect(),
        )),
        ChainSpec::Named(names) => {
            let mut resolved = Vec::with_capacity(names.len());
            for name in names {
                match supervisors.get(&name) {
                    Some(supervisor) => resolved.push(Arc::clone(supervisor)),
                    None => {
                        warn!(supervisor = %name, tool = %tool, "chain references unknown supervisor");
                        return Err(SentinelError::config(format!(
                            "chain for tool '{}' references unregistered supervisor '{}'",
                            tool, name
                        )));
                    }
                }
            }
            Ok(Chain::new(resolved))
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
