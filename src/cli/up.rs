//! `ploy up` command implementation

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use clap::Args;

use super::{drive, Completion, Context};
use crate::engine::program::{self, DescriptorOptions, LoadBalancer};
use crate::engine::{Engine, OperationMode};
use crate::name;
use crate::session::{Endpoint, Outcome, RunPlan};

#[derive(Args, Debug, Clone)]
pub struct UpArgs {
    /// Deployment name; a random one is generated when omitted
    pub name: Option<String>,

    /// Preview changes, dry-run mode
    #[arg(short, long)]
    pub preview: bool,

    /// Show output of engine operations
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to the docker build context
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Provision a network load balancer instead of a classic one
    #[arg(long)]
    pub nlb: bool,
}

pub async fn run<E: Engine>(ctx: &Context<E>, args: UpArgs) -> Result<Completion> {
    let org = ctx.org()?.to_string();

    let name = match args.name {
        Some(name) => name,
        None => {
            let name = name::generate();
            tracing::info!("No name given, using {}", name);
            name
        }
    };
    name::validate(&name)?;

    if !args.dir.join("Dockerfile").is_file() {
        bail!("No Dockerfile found in {}", args.dir.display());
    }
    let mut options = DescriptorOptions::new(&args.dir);
    if args.nlb {
        options.load_balancer = LoadBalancer::Network;
    }
    let program = program::build(&ctx.config.project, &name, &options)
        .context("Failed to build deployment program")?;

    let mode = if args.preview {
        OperationMode::Preview
    } else {
        OperationMode::Apply
    };
    let plan = RunPlan {
        org,
        project: ctx.config.project.clone(),
        name: name.clone(),
        region: ctx.config.region.clone(),
        settings: vec![("aws:skipMetadataApiCheck".to_string(), "false".to_string())],
        plugins: ctx.config.plugins.clone(),
        mode,
        program: Some(program),
    };

    match drive(ctx, &plan, args.verbose).await {
        Outcome::Succeeded { outputs } => {
            if let Some(endpoint) = Endpoint::from_outputs(&outputs) {
                println!();
                println!("Your service is available at {}", endpoint.url());
            }
            Ok(Completion::Done)
        }
        Outcome::Cancelled => Ok(Completion::Cancelled),
        Outcome::Failed { cause } => {
            Err(anyhow::Error::new(cause).context(format!("Failed to deploy {}", name)))
        }
    }
}
