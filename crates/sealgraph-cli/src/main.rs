//! sealgraph - package graph resolver CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sealgraph_cli::{Cli, Commands, Context, cmd};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays parseable.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::load(&cli).await?;

    match &cli.command {
        Commands::Resolve { packages } => cmd::resolve::resolve(&ctx, packages).await,
        Commands::List { packages } => cmd::list::list(&ctx, packages).await,
        Commands::Seal { package } => cmd::seal::seal(&ctx, package).await,
        Commands::Alloc { package } => cmd::alloc::alloc(&ctx, package).await,
    }
}
