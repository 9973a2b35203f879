//! `ploy destroy` command implementation

use anyhow::Result;
use clap::Args;

use super::prompt::{Assume, Confirm};
use super::{drive, Completion, Context};
use crate::engine::{Engine, OperationMode, StackRef};
use crate::name;
use crate::session::{Outcome, RunPlan, Session};

#[derive(Args, Debug, Clone)]
pub struct DestroyArgs {
    /// Name of the deployment to remove
    pub name: String,

    /// Show output of engine operations
    #[arg(short, long)]
    pub verbose: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

pub async fn run<E: Engine, C: Confirm>(
    ctx: &Context<E>,
    args: DestroyArgs,
    prompt: &mut C,
) -> Result<Completion> {
    let org = ctx.org()?.to_string();
    name::validate(&args.name)?;

    let question = format!(
        "This will delete the application {}. Are you sure you wish to continue?",
        args.name
    );
    let confirmed = if args.yes {
        Assume(true).confirm(&question)?
    } else {
        prompt.confirm(&question)?
    };
    if !confirmed {
        println!("Not deleting {}", args.name);
        return Ok(Completion::Done);
    }
    tracing::debug!("confirmed destroy of {}", args.name);

    let plan = RunPlan {
        org: org.clone(),
        project: ctx.config.project.clone(),
        name: args.name.clone(),
        region: ctx.config.region.clone(),
        settings: Vec::new(),
        plugins: ctx.config.plugins.clone(),
        mode: OperationMode::Destroy,
        program: None,
    };

    match drive(ctx, &plan, args.verbose).await {
        Outcome::Succeeded { .. } => {
            // The stack record outlives its resources; drop it so `get`
            // stops listing the deployment.
            let session = Session {
                stack: StackRef::new(&org, &ctx.config.project, &args.name),
            };
            if let Err(e) = ctx.client.remove(&session).await {
                tracing::warn!("Failed to remove stack {}: {}", session.stack, e);
            }
            Ok(Completion::Done)
        }
        Outcome::Cancelled => Ok(Completion::Cancelled),
        Outcome::Failed { cause } => {
            Err(anyhow::Error::new(cause).context(format!("Failed to destroy {}", args.name)))
        }
    }
}
