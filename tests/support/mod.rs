//! Scripted in-memory engine shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use ploy::config::{Config, FileConfig, Overrides};
use ploy::engine::{
    DeployError, Engine, EngineEvent, OperationMode, Outputs, PluginRequirement, Program, Result,
    RunningOperation, StackRef, StackSummary, StatusUpdate,
};
use ploy::session::{Outcome, ProgressSnapshot, RunPlan, RunState};
use ploy::tui::{ProgressSink, ProgressView};
use serde_json::json;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SelectOrCreate(String),
    SetConfig(String, String),
    InstallPlugin(String),
    SetProgram(String),
    Start(String, OperationMode),
    ListStacks,
    Outputs(String),
    RemoveStack(String),
}

/// What one `start` call plays back.
pub struct Script {
    pub events: Vec<EngineEvent>,
    pub status: Vec<StatusUpdate>,
    pub result: Result<Outputs>,
    /// The result waits for this before resolving.
    pub gate: Option<Arc<Notify>>,
    /// The result never resolves on its own; it only ends on cancellation.
    pub hold: bool,
}

impl Script {
    pub fn succeed(outputs: Outputs) -> Self {
        Self {
            events: Vec::new(),
            status: vec![StatusUpdate::Complete],
            result: Ok(outputs),
            gate: None,
            hold: false,
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            result: Err(DeployError::Operation(message.to_string())),
            ..Self::succeed(Outputs::new())
        }
    }

    pub fn hold() -> Self {
        Self {
            hold: true,
            ..Self::succeed(Outputs::new())
        }
    }

    pub fn with_events(mut self, events: Vec<EngineEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_status(mut self, status: Vec<StatusUpdate>) -> Self {
        self.status = status;
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    script: Option<Script>,
    failing_plugin: Option<String>,
    failing_config: Option<String>,
    stacks: Vec<StackSummary>,
    outputs: HashMap<String, Outputs>,
    remove_fails: bool,
    tokens: Vec<CancellationToken>,
    /// Stack selection blocks the calling thread this long.
    select_delay: Option<std::time::Duration>,
}

#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<State>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, script: Script) -> Self {
        self.state.lock().unwrap().script = Some(script);
        self
    }

    pub fn failing_plugin(self, provider: &str) -> Self {
        self.state.lock().unwrap().failing_plugin = Some(provider.to_string());
        self
    }

    pub fn failing_config(self, key: &str) -> Self {
        self.state.lock().unwrap().failing_config = Some(key.to_string());
        self
    }

    pub fn with_stack(self, name: &str, outputs: Option<Outputs>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.stacks.push(StackSummary {
                name: name.to_string(),
                last_update: Some("2024-05-01T10:00:00.000Z".to_string()),
                update_in_progress: false,
                resource_count: Some(5),
                url: Some(format!("https://app.pulumi.com/acme/ploy/{}", name)),
            });
            if let Some(outputs) = outputs {
                state.outputs.insert(name.to_string(), outputs);
            }
        }
        self
    }

    pub fn slow_select(self, delay: std::time::Duration) -> Self {
        self.state.lock().unwrap().select_delay = Some(delay);
        self
    }

    pub fn failing_remove(self) -> Self {
        self.state.lock().unwrap().remove_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Cancellation tokens handed out by `start`, in order.
    pub fn tokens(&self) -> Vec<CancellationToken> {
        self.state.lock().unwrap().tokens.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl Engine for FakeEngine {
    fn select_or_create(&self, stack: &StackRef) -> Result<()> {
        self.record(Call::SelectOrCreate(stack.to_string()));
        let delay = self.state.lock().unwrap().select_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(())
    }

    fn set_config(&self, _stack: &StackRef, key: &str, value: &str) -> Result<()> {
        self.record(Call::SetConfig(key.to_string(), value.to_string()));
        if self.state.lock().unwrap().failing_config.as_deref() == Some(key) {
            return Err(DeployError::Configuration {
                key: key.to_string(),
                message: "rejected".to_string(),
            });
        }
        Ok(())
    }

    fn install_plugin(&self, plugin: &PluginRequirement) -> Result<()> {
        self.record(Call::InstallPlugin(plugin.provider.clone()));
        if self.state.lock().unwrap().failing_plugin.as_deref() == Some(plugin.provider.as_str()) {
            return Err(DeployError::PluginInstall {
                provider: plugin.provider.clone(),
                version: plugin.version.clone(),
                cause: "download failed".to_string(),
            });
        }
        Ok(())
    }

    fn set_program(&self, stack: &StackRef, _program: &Program) -> Result<()> {
        self.record(Call::SetProgram(stack.to_string()));
        Ok(())
    }

    fn start(&self, stack: &StackRef, mode: OperationMode) -> Result<RunningOperation> {
        self.record(Call::Start(stack.to_string(), mode));
        let script = self
            .state
            .lock()
            .unwrap()
            .script
            .take()
            .unwrap_or_else(|| Script::succeed(Outputs::new()));

        let (event_tx, events) = mpsc::unbounded_channel();
        let (status_tx, status) = mpsc::unbounded_channel();
        for event in script.events {
            event_tx.send(event).unwrap();
        }
        for update in script.status {
            status_tx.send(update).unwrap();
        }

        let cancel = CancellationToken::new();
        self.state.lock().unwrap().tokens.push(cancel.clone());

        let token = cancel.clone();
        let gate = script.gate;
        let hold = script.hold;
        let outcome = script.result;
        let result = tokio::spawn(async move {
            // Keep the senders alive for as long as the operation runs.
            let _senders = (event_tx, status_tx);
            if hold {
                token.cancelled().await;
                return Err(DeployError::Operation("interrupted".to_string()));
            }
            if let Some(gate) = gate {
                gate.notified().await;
            }
            outcome
        });

        Ok(RunningOperation {
            events,
            status,
            result,
            cancel,
        })
    }

    fn list_stacks(&self, _org: &str, _project: &str) -> Result<Vec<StackSummary>> {
        self.record(Call::ListStacks);
        Ok(self.state.lock().unwrap().stacks.clone())
    }

    fn outputs(&self, stack: &StackRef) -> Result<Outputs> {
        self.record(Call::Outputs(stack.name.clone()));
        self.state
            .lock()
            .unwrap()
            .outputs
            .get(&stack.name)
            .cloned()
            .ok_or_else(|| DeployError::Operation(format!("no outputs for {}", stack.name)))
    }

    fn remove_stack(&self, stack: &StackRef) -> Result<()> {
        self.record(Call::RemoveStack(stack.to_string()));
        if self.state.lock().unwrap().remove_fails {
            return Err(DeployError::Operation("stack still has resources".to_string()));
        }
        Ok(())
    }
}

/// Sink that remembers what it was asked to draw.
#[derive(Default)]
pub struct RecordingSink {
    pub frames: Vec<ProgressSnapshot>,
    pub lines: Vec<String>,
    pub finished: Option<RunState>,
    /// Notified once the snapshot holds this many completed resources.
    pub release: Option<(usize, Arc<Notify>)>,
}

impl ProgressSink for RecordingSink {
    fn render(&mut self, view: &ProgressView<'_>) -> io::Result<()> {
        self.frames.push(view.snapshot.clone());
        if let Some((count, gate)) = &self.release {
            if view.snapshot.completed().len() >= *count {
                gate.notify_one();
            }
        }
        Ok(())
    }

    fn line(&mut self, line: &str) -> io::Result<()> {
        self.lines.push(line.to_string());
        Ok(())
    }

    fn finish(&mut self, _view: &ProgressView<'_>, outcome: &Outcome) -> io::Result<()> {
        self.finished = Some(outcome.state());
        Ok(())
    }
}

pub fn config(org: &str) -> Config {
    Config::resolve(
        Overrides {
            org: Some(org.to_string()),
            region: Some("us-east-1".to_string()),
        },
        FileConfig::default(),
        std::path::Path::new("/nonexistent/.ploy"),
    )
}

pub fn plan(mode: OperationMode) -> RunPlan {
    let config = config("acme");
    RunPlan {
        org: config.org,
        project: config.project,
        name: "happy-blue-fox".to_string(),
        region: config.region,
        settings: Vec::new(),
        plugins: config.plugins,
        mode,
        program: None,
    }
}

pub fn address(value: &str) -> Outputs {
    let mut outputs = Outputs::new();
    outputs.insert("address".to_string(), json!(value));
    outputs
}

pub fn pre(urn: &str, kind: &str) -> EngineEvent {
    EngineEvent::ResourcePre {
        urn: urn.to_string(),
        kind: kind.to_string(),
    }
}

pub fn done(urn: &str, kind: &str) -> EngineEvent {
    EngineEvent::ResourceOutputs {
        urn: urn.to_string(),
        kind: kind.to_string(),
        outputs: Outputs::new(),
    }
}

pub const NAMESPACE: &str = "kubernetes:core/v1:Namespace";
pub const SERVICE: &str = "kubernetes:core/v1:Service";
