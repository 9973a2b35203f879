//! Development tasks. `cargo run -p xtask -- gen-docs` regenerates the CLI
//! reference.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
struct Xtask {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand)]
enum Task {
    /// Write the markdown CLI reference
    GenDocs {
        #[arg(long, default_value = "docs/cli/reference.md")]
        output: PathBuf,
    },
}

fn main() -> std::io::Result<()> {
    match Xtask::parse().command {
        Task::GenDocs { output } => {
            let markdown = clap_markdown::help_markdown::<ploy::cli::Cli>();
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&output, markdown)?;
            println!("Wrote {}", output.display());
        }
    }
    Ok(())
}
