//! Deployment sessions: one engine stack per deployed application.

pub mod orchestrator;
pub mod progress;

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use serde_json::Value;

use crate::engine::program::ADDRESS_OUTPUT;
use crate::engine::{
    DeployError, Engine, OperationMode, Outputs, PluginRequirement, Program, Result,
    RunningOperation, StackRef,
};

pub use orchestrator::{Orchestrator, Outcome, RunPlan, RunState};
pub use progress::{ProgressSnapshot, ResourceKind, ResourceProgress, ResourceState};

/// Project every ploy deployment lives in, so they can be listed together.
pub const DEFAULT_PROJECT: &str = "ploy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub stack: StackRef,
}

impl Session {
    pub fn name(&self) -> &str {
        &self.stack.name
    }
}

/// One row of `ploy get`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionListing {
    pub name: String,
    pub last_update: Option<String>,
    pub info: Option<String>,
    /// An update is running against the stack right now.
    pub updating: bool,
    pub resources: Option<u64>,
    pub outputs: Outputs,
}

impl SessionListing {
    pub fn endpoint(&self) -> Option<Endpoint> {
        Endpoint::from_outputs(&self.outputs)
    }
}

/// Externally reachable address of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Hostname(String),
    Ip(IpAddr),
}

impl Endpoint {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match raw.parse::<IpAddr>() {
            Ok(ip) => Endpoint::Ip(ip),
            Err(_) => Endpoint::Hostname(raw.to_string()),
        })
    }

    /// Read the `address` output. Absent, null and non-string values are `None`.
    pub fn from_outputs(outputs: &Outputs) -> Option<Self> {
        match outputs.get(ADDRESS_OUTPUT) {
            Some(Value::String(raw)) => Self::parse(raw),
            _ => None,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Hostname(host) => write!(f, "{}", host),
            Endpoint::Ip(IpAddr::V6(ip)) => write!(f, "[{}]", ip),
            Endpoint::Ip(ip) => write!(f, "{}", ip),
        }
    }
}

/// Facade over the engine for one org/project namespace.
///
/// Engine calls shell out and block, so each one runs on the blocking pool.
/// Calls for a given session must be serialized by the caller:
/// resolve, configure, ensure plugins, then run.
pub struct SessionClient<E: Engine> {
    engine: Arc<E>,
}

impl<E: Engine> SessionClient<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    async fn blocking<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&E) -> Result<T> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || call(engine.as_ref()))
            .await
            .map_err(|e| DeployError::Operation(format!("engine call failed: {}", e)))?
    }

    pub async fn resolve_or_create(&self, org: &str, project: &str, name: &str) -> Result<Session> {
        if org.trim().is_empty() {
            return Err(DeployError::Config);
        }
        let stack = StackRef::new(org, project, name);
        tracing::debug!("selecting stack {}", stack);
        let selected = stack.clone();
        self.blocking(move |engine| engine.select_or_create(&selected))
            .await?;
        Ok(Session { stack })
    }

    pub async fn configure(&self, session: &Session, key: &str, value: &str) -> Result<()> {
        tracing::debug!("setting {} on {}", key, session.stack);
        let stack = session.stack.clone();
        let (key, value) = (key.to_string(), value.to_string());
        self.blocking(move |engine| engine.set_config(&stack, &key, &value))
            .await
    }

    /// Install plugins in order, stopping at the first failure. Plugins
    /// installed before the failure stay installed.
    pub async fn ensure_plugins(
        &self,
        session: &Session,
        plugins: &[PluginRequirement],
    ) -> Result<()> {
        for plugin in plugins {
            tracing::debug!(
                "installing {} {} for {}",
                plugin.provider,
                plugin.version,
                session.stack
            );
            let plugin = plugin.clone();
            self.blocking(move |engine| engine.install_plugin(&plugin))
                .await?;
        }
        Ok(())
    }

    pub async fn run(
        &self,
        session: &Session,
        mode: OperationMode,
        program: Option<&Program>,
    ) -> Result<RunningOperation> {
        if let Some(program) = program {
            let stack = session.stack.clone();
            let program = program.clone();
            self.blocking(move |engine| engine.set_program(&stack, &program))
                .await?;
        }
        tracing::info!("starting {} on {}", mode.command(), session.stack);
        self.engine.start(&session.stack, mode)
    }

    pub async fn list_sessions(&self, org: &str, project: &str) -> Result<Vec<SessionListing>> {
        if org.trim().is_empty() {
            return Err(DeployError::Config);
        }

        let (owner, scope) = (org.to_string(), project.to_string());
        let stacks = self
            .blocking(move |engine| engine.list_stacks(&owner, &scope))
            .await?;
        let mut listings = Vec::with_capacity(stacks.len());
        for summary in stacks {
            // Stack names may come back fully qualified.
            let name = summary
                .name
                .rsplit('/')
                .next()
                .unwrap_or(&summary.name)
                .to_string();
            let session = Session {
                stack: StackRef::new(org, project, &name),
            };
            let outputs = match self.outputs(&session).await {
                Ok(outputs) => outputs,
                Err(e) => {
                    tracing::warn!("failed to read outputs for {}: {}", session.stack, e);
                    Outputs::new()
                }
            };
            listings.push(SessionListing {
                name,
                last_update: summary.last_update,
                info: summary.url,
                updating: summary.update_in_progress,
                resources: summary.resource_count,
                outputs,
            });
        }
        Ok(listings)
    }

    pub async fn outputs(&self, session: &Session) -> Result<Outputs> {
        let stack = session.stack.clone();
        self.blocking(move |engine| engine.outputs(&stack)).await
    }

    pub async fn remove(&self, session: &Session) -> Result<()> {
        tracing::debug!("removing stack {}", session.stack);
        let stack = session.stack.clone();
        self.blocking(move |engine| engine.remove_stack(&stack))
            .await
    }
}
