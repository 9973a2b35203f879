//! CLI command definitions and handlers

pub mod destroy;
pub mod get;
pub mod prompt;
pub mod up;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Overrides};
use crate::engine::error::last_line;
use crate::engine::{DeployError, Engine, PulumiCli};
use crate::session::{Orchestrator, Outcome, RunPlan, SessionClient};
use crate::tui::{input, Presenter};

pub use destroy::DestroyArgs;
pub use up::UpArgs;

#[derive(Parser)]
#[command(name = "ploy")]
#[command(about = "Deploy a containerized application to Kubernetes on AWS")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub globals: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Pulumi organization that owns the deployments
    #[arg(short, long, global = true)]
    pub org: Option<String>,

    /// AWS region to deploy into
    #[arg(short, long, global = true, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Print progress as log lines instead of the interactive view
    #[arg(long, global = true)]
    pub plain: bool,
}

impl GlobalArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            org: self.org.clone(),
            region: self.region.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy an application, creating or updating it
    Up(UpArgs),

    /// Remove a deployed application
    Destroy(DestroyArgs),

    /// List deployed applications
    Get,
}

/// How a command that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Done,
    Cancelled,
}

impl Completion {
    pub fn exit_code(self) -> u8 {
        match self {
            Completion::Done => 0,
            Completion::Cancelled => 130,
        }
    }
}

/// Everything a command needs, built once per invocation.
pub struct Context<E: Engine> {
    pub config: Config,
    pub client: SessionClient<E>,
    pub plain: bool,
    /// Cancels runs from code instead of terminal input.
    cancel: Option<CancellationToken>,
}

impl<E: Engine> Context<E> {
    pub fn new(config: Config, engine: E, plain: bool) -> Self {
        Self {
            config,
            client: SessionClient::new(engine),
            plain,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The configured org. Every command calls this before anything else.
    pub fn org(&self) -> std::result::Result<&str, DeployError> {
        let org = self.config.org.trim();
        if org.is_empty() {
            return Err(DeployError::Config);
        }
        Ok(org)
    }
}

impl Context<PulumiCli> {
    pub fn pulumi(config: Config, plain: bool) -> Self {
        let engine = PulumiCli::new(&config.engine_binary, &config.workspace_root);
        Self::new(config, engine, plain)
    }
}

pub async fn dispatch(cli: Cli) -> Result<Completion> {
    let config = Config::load(cli.globals.overrides())?;
    tracing::debug!(
        "org={:?} region={} project={}",
        config.org,
        config.region,
        config.project
    );
    let ctx = Context::pulumi(config, cli.globals.plain);

    match cli.command {
        Commands::Up(args) => up::run(&ctx, args).await,
        Commands::Destroy(args) => {
            let mut prompt = prompt::StdinPrompt;
            destroy::run(&ctx, args, &mut prompt).await
        }
        Commands::Get => get::run(&ctx).await.map(|()| Completion::Done),
    }
}

/// Run `plan` with the presenter and cancellation input that suit the
/// terminal.
pub(crate) async fn drive<E: Engine>(ctx: &Context<E>, plan: &RunPlan, verbose: bool) -> Outcome {
    let mut presenter = Presenter::detect(ctx.plain, verbose);
    let stop = CancellationToken::new();
    let cancel = match &ctx.cancel {
        Some(token) => input::spawn_token_listener(token.clone(), stop.clone()),
        None if presenter.is_interactive() => input::spawn_key_listener(stop.clone()),
        None => input::spawn_interrupt_listener(stop.clone()),
    };

    let outcome = Orchestrator::new(&ctx.client)
        .run(plan, cancel, &mut presenter)
        .await;
    stop.cancel();
    outcome
}

/// The failure as one line: each cause in the chain cut down to the line
/// that names it.
pub fn error_line(err: &anyhow::Error) -> String {
    err.chain()
        .filter_map(|cause| last_line(&cause.to_string()).map(str::to_string))
        .collect::<Vec<_>>()
        .join(": ")
}
