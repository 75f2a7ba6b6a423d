//! upkg - package manager CLI

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use upkg_cli::cmd;
use upkg_cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = cli
        .project_root()
        .context("Failed to determine the project directory")?;

    match cli.command {
        Commands::Install => cmd::install::install(&root),
        Commands::Update { name } => cmd::update::update(&root, &name),
        Commands::Nuke { name, all, yes } => cmd::nuke::nuke(&root, name.as_deref(), all, yes),
        Commands::List => cmd::list::list(&root),
        Commands::Packages => cmd::list::packages(&root),
    }
}
