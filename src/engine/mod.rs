//! Infrastructure engine abstraction.
//!
//! [`Engine`] is the minimum contract ploy needs from the automation engine.
//! The production implementation drives the `pulumi` CLI ([`PulumiCli`]);
//! tests substitute a scripted engine.

pub mod error;
pub mod events;
pub mod program;
pub mod pulumi;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use error::{DeployError, Result};
pub use events::EngineEvent;
pub use program::Program;
pub use pulumi::PulumiCli;

/// Stack outputs as reported by the engine.
pub type Outputs = BTreeMap<String, serde_json::Value>;

/// Fully-qualified stack address: `org/project/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackRef {
    pub org: String,
    pub project: String,
    pub name: String,
}

impl StackRef {
    pub fn new(org: &str, project: &str, name: &str) -> Self {
        Self {
            org: org.to_string(),
            project: project.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for StackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.org, self.project, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRequirement {
    pub provider: String,
    pub version: String,
}

impl PluginRequirement {
    pub fn new(provider: &str, version: &str) -> Self {
        Self {
            provider: provider.to_string(),
            version: version.to_string(),
        }
    }
}

/// Provider plugins every ploy deployment needs, in install order.
pub fn default_plugins() -> Vec<PluginRequirement> {
    vec![
        PluginRequirement::new("aws", "v6.66.2"),
        PluginRequirement::new("kubernetes", "v4.19.0"),
        PluginRequirement::new("docker", "v4.5.8"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Preview,
    Apply,
    Destroy,
}

impl OperationMode {
    pub fn command(self) -> &'static str {
        match self {
            OperationMode::Preview => "preview",
            OperationMode::Apply => "up",
            OperationMode::Destroy => "destroy",
        }
    }

    /// Progressive verb for status lines.
    pub fn verb(self) -> &'static str {
        match self {
            OperationMode::Preview => "Previewing",
            OperationMode::Apply => "Creating",
            OperationMode::Destroy => "Destroying",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            OperationMode::Preview => "previewed",
            OperationMode::Apply => "created",
            OperationMode::Destroy => "destroyed",
        }
    }
}

/// Free-text status from a running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Message(String),
    Error(String),
    /// The producer has nothing more to say; the result is on its way.
    Complete,
}

/// One stack as listed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSummary {
    pub name: String,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub update_in_progress: bool,
    #[serde(default)]
    pub resource_count: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Handles to an operation started by [`Engine::start`].
///
/// Each receiver has exactly one producer task behind it. Dropping the
/// struct abandons the operation locally; `cancel` asks the engine to stop.
pub struct RunningOperation {
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
    pub status: mpsc::UnboundedReceiver<StatusUpdate>,
    pub result: JoinHandle<Result<Outputs>>,
    pub cancel: CancellationToken,
}

pub trait Engine: Send + Sync + 'static {
    fn select_or_create(&self, stack: &StackRef) -> Result<()>;

    fn set_config(&self, stack: &StackRef, key: &str, value: &str) -> Result<()>;

    fn install_plugin(&self, plugin: &PluginRequirement) -> Result<()>;

    fn set_program(&self, stack: &StackRef, program: &Program) -> Result<()>;

    /// Start `mode` against `stack` in the background. Must not block on the
    /// operation itself; requires a running tokio runtime.
    fn start(&self, stack: &StackRef, mode: OperationMode) -> Result<RunningOperation>;

    fn list_stacks(&self, org: &str, project: &str) -> Result<Vec<StackSummary>>;

    fn outputs(&self, stack: &StackRef) -> Result<Outputs>;

    fn remove_stack(&self, stack: &StackRef) -> Result<()>;
}
