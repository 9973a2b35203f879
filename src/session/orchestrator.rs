//! Live session orchestration.
//!
//! One [`Orchestrator::run`] prepares a session, starts the engine operation
//! and then multiplexes its channels until exactly one [`Outcome`] is known.
//! Only the run loop and its final drain touch the snapshot.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::MissedTickBehavior;

use super::progress::ProgressSnapshot;
use super::{Endpoint, Session, SessionClient};
use crate::engine::program::ADDRESS_OUTPUT;
use crate::engine::{
    DeployError, Engine, EngineEvent, OperationMode, Outputs, PluginRequirement, Program, Result,
    StatusUpdate,
};
use crate::tui::{ProgressSink, ProgressView, SPINNER_FRAMES};

const DEFAULT_TICK: Duration = Duration::from_millis(120);
const DRAIN_LIMIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Starting,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug)]
pub enum Outcome {
    Succeeded { outputs: Outputs },
    Failed { cause: DeployError },
    /// The user abandoned the run. Not an error.
    Cancelled,
}

impl Outcome {
    pub fn state(&self) -> RunState {
        match self {
            Outcome::Succeeded { .. } => RunState::Succeeded,
            Outcome::Failed { .. } => RunState::Failed,
            Outcome::Cancelled => RunState::Cancelled,
        }
    }
}

/// Everything needed to run one operation against one deployment.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub org: String,
    pub project: String,
    pub name: String,
    pub region: String,
    /// Provider configuration applied after the region, in order.
    pub settings: Vec<(String, String)>,
    pub plugins: Vec<PluginRequirement>,
    pub mode: OperationMode,
    pub program: Option<Program>,
}

pub struct Orchestrator<'a, E: Engine> {
    client: &'a SessionClient<E>,
    state: RunState,
    snapshot: ProgressSnapshot,
    status: String,
    frame: usize,
    tick: Duration,
    session: Option<Session>,
}

impl<'a, E: Engine> Orchestrator<'a, E> {
    pub fn new(client: &'a SessionClient<E>) -> Self {
        Self {
            client,
            state: RunState::Idle,
            snapshot: ProgressSnapshot::new(),
            status: String::new(),
            frame: 0,
            tick: DEFAULT_TICK,
            session: None,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.snapshot
    }

    /// Latest status line shown with the progress view.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// The session the run prepared, if it got that far.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub async fn run<S: ProgressSink>(
        &mut self,
        plan: &RunPlan,
        mut cancel: mpsc::Receiver<()>,
        sink: &mut S,
    ) -> Outcome {
        self.state = RunState::Idle;
        self.status = format!("{} ploy deployment: {}", plan.mode.verb(), plan.name);

        // A cancel before the operation starts abandons the run without
        // touching the remote stack.
        let client = self.client;
        let prepared = tokio::select! {
            biased;

            Some(()) = cancel.recv() => {
                tracing::info!("cancelled {} before starting", plan.name);
                return self.conclude(plan, Outcome::Cancelled, sink);
            }
            prepared = prepare(client, plan) => prepared,
        };
        let session = match prepared {
            Ok(session) => session,
            Err(cause) => return self.conclude(plan, Outcome::Failed { cause }, sink),
        };
        self.session = Some(session.clone());
        self.state = RunState::Starting;

        if cancel.try_recv().is_ok() {
            tracing::info!("cancelled {} before starting", session.stack);
            return self.conclude(plan, Outcome::Cancelled, sink);
        }
        let mut op = match client.run(&session, plan.mode, plan.program.as_ref()).await {
            Ok(op) => op,
            Err(cause) => return self.conclude(plan, Outcome::Failed { cause }, sink),
        };
        self.state = RunState::Running;
        self.render(plan, sink);

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut events_open = true;
        let mut status_open = true;

        let outcome = loop {
            tokio::select! {
                // The result is authoritative over anything else that is ready.
                biased;

                joined = &mut op.result => {
                    self.drain(&mut op.events, sink).await;
                    break settle(joined, plan.mode);
                }
                Some(()) = cancel.recv() => {
                    tracing::info!("cancellation requested for {}", session.stack);
                    op.cancel.cancel();
                    break Outcome::Cancelled;
                }
                event = op.events.recv(), if events_open => match event {
                    Some(event) => {
                        self.apply(&event, sink);
                        self.render(plan, sink);
                    }
                    None => events_open = false,
                },
                update = op.status.recv(), if status_open => match update {
                    Some(StatusUpdate::Message(line)) => {
                        present(sink.line(&line));
                        self.status = line;
                        self.render(plan, sink);
                    }
                    Some(StatusUpdate::Error(message)) => {
                        op.cancel.cancel();
                        break Outcome::Failed { cause: DeployError::Operation(message) };
                    }
                    Some(StatusUpdate::Complete) | None => status_open = false,
                },
                _ = ticker.tick() => {
                    self.frame = self.frame.wrapping_add(1);
                    self.render(plan, sink);
                }
            }
        };

        self.conclude(plan, outcome, sink)
    }

    /// Events can trail the result: the producer may still be reading the
    /// engine's log when the process exits. Take everything it still sends
    /// until it closes the channel, waiting at most `DRAIN_LIMIT`.
    async fn drain<S: ProgressSink>(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<EngineEvent>,
        sink: &mut S,
    ) {
        let drained = tokio::time::timeout(DRAIN_LIMIT, async {
            while let Some(event) = events.recv().await {
                self.apply(&event, sink);
            }
        })
        .await;
        if drained.is_err() {
            tracing::debug!("engine events still open after {:?}", DRAIN_LIMIT);
        }
    }

    fn apply<S: ProgressSink>(&mut self, event: &EngineEvent, sink: &mut S) {
        tracing::trace!("engine event: {:?}", event);
        match event {
            EngineEvent::Diagnostic { message, .. } => present(sink.line(message)),
            EngineEvent::Summary { duration_seconds } => {
                self.status = format!("Engine finished in {}s", duration_seconds);
            }
            EngineEvent::Cancelled => {
                self.status = "Engine is cancelling the operation".to_string();
            }
            _ => {}
        }
        self.snapshot.reduce(event);
    }

    fn view<'s>(&'s self, plan: &'s RunPlan) -> ProgressView<'s> {
        ProgressView {
            deployment: &plan.name,
            mode: plan.mode,
            status: &self.status,
            spinner: SPINNER_FRAMES[self.frame % SPINNER_FRAMES.len()],
            snapshot: &self.snapshot,
        }
    }

    fn render<S: ProgressSink>(&self, plan: &RunPlan, sink: &mut S) {
        present(sink.render(&self.view(plan)));
    }

    fn conclude<S: ProgressSink>(
        &mut self,
        plan: &RunPlan,
        outcome: Outcome,
        sink: &mut S,
    ) -> Outcome {
        self.state = outcome.state();
        match &outcome {
            Outcome::Succeeded { .. } => tracing::info!("{} {}", plan.name, plan.mode.past_tense()),
            Outcome::Failed { cause } => tracing::debug!("{} failed: {}", plan.name, cause),
            Outcome::Cancelled => tracing::debug!("{} cancelled", plan.name),
        }
        present(sink.finish(&self.view(plan), &outcome));
        outcome
    }
}

/// Idle → Starting: resolve, configure and install plugins.
async fn prepare<E: Engine>(client: &SessionClient<E>, plan: &RunPlan) -> Result<Session> {
    let session = client
        .resolve_or_create(&plan.org, &plan.project, &plan.name)
        .await?;
    client.configure(&session, "aws:region", &plan.region).await?;
    for (key, value) in &plan.settings {
        client.configure(&session, key, value).await?;
    }
    client.ensure_plugins(&session, &plan.plugins).await?;
    Ok(session)
}

fn settle(joined: std::result::Result<Result<Outputs>, JoinError>, mode: OperationMode) -> Outcome {
    match joined {
        Err(e) => Outcome::Failed {
            cause: DeployError::Operation(format!("operation task failed: {}", e)),
        },
        Ok(Err(cause)) => Outcome::Failed { cause },
        Ok(Ok(outputs)) => {
            if mode == OperationMode::Apply && Endpoint::from_outputs(&outputs).is_none() {
                return Outcome::Failed {
                    cause: DeployError::MissingOutput(ADDRESS_OUTPUT.to_string()),
                };
            }
            Outcome::Succeeded { outputs }
        }
    }
}

/// Rendering never fails a run.
fn present(result: std::io::Result<()>) {
    if let Err(e) = result {
        tracing::debug!("render failed: {}", e);
    }
}
