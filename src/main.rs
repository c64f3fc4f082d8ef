//! sizewatch - build artifact size tracking
//!
//! Measures build output sizes, strips content hashes from filenames so the
//! same logical file keeps its identity across builds, and submits the
//! result as a reading to a tracking API.

use anyhow::Result;
use clap::Parser;
use sizewatch::cli::{measure, repo_info, submit, Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Execute command
    match cli.command {
        Commands::Submit(args) => {
            submit(&args, cli.api_url).await?;
        }

        Commands::Measure(args) => {
            measure(&args, cli.format)?;
        }

        Commands::RepoInfo => {
            repo_info(cli.format)?;
        }
    }

    Ok(())
}
