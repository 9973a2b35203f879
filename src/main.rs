//! ploy - deploy a Dockerfile to Kubernetes on AWS

use std::process::ExitCode;

use clap::Parser;
use ploy::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.globals.debug);

    match cli::dispatch(cli).await {
        Ok(completion) => ExitCode::from(completion.exit_code()),
        Err(e) => {
            tracing::debug!("{:?}", e);
            eprintln!("Error: {}", cli::error_line(&e));
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout belongs to the progress view and command output.
fn init_logging(debug: bool) {
    let default = if debug { "ploy=debug" } else { "ploy=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
