//! CLI interface using clap
//!
//! Provides the command-line interface for sizewatch

mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};

/// sizewatch - build artifact size tracking
#[derive(Parser, Debug)]
#[command(name = "sizewatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Base URL of the tracking API
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Measure files and submit the sizes as a reading
    Submit(SubmitArgs),

    /// Measure files and print the sizes without submitting
    Measure(MeasureArgs),

    /// Show the source control info a submission would use
    RepoInfo,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for the submit command
#[derive(Parser, Debug)]
pub struct SubmitArgs {
    /// Files, directories or glob patterns to measure
    #[arg(required = true, value_name = "FILES_DIRS_GLOBS")]
    pub files: Vec<String>,

    /// Project key that authenticates you for a project
    #[arg(long)]
    pub project_key: Option<String>,

    /// ID of the bundleset the reading should be submitted for
    #[arg(long)]
    pub bundleset: Option<String>,

    /// Arbitrary commit id or hash to associate with the reading
    #[arg(long)]
    pub commit: Option<String>,

    /// Arbitrary branch name. If given, and no parent commit is specified,
    /// the most recent reading from this branch will be the parent
    #[arg(long)]
    pub branch: Option<String>,

    /// Commit ids of the parent readings that new values will be compared
    /// to. Instead of specifying commits explicitly, you can also use
    /// --branch
    #[arg(long, num_args = 1..)]
    pub parent_commits: Option<Vec<String>>,

    /// Glob pattern of files to include if a directory is specified
    #[arg(long)]
    pub include: Option<String>,

    /// Glob pattern of files to exclude if a directory is specified
    #[arg(long)]
    pub exclude: Option<String>,

    /// Do not submit if the given environment variable is not set
    #[arg(long)]
    pub only_if_env: Option<String>,
}

/// Arguments for the measure command
#[derive(Parser, Debug)]
pub struct MeasureArgs {
    /// Files, directories or glob patterns to measure
    #[arg(required = true, value_name = "FILES_DIRS_GLOBS")]
    pub files: Vec<String>,

    /// Glob pattern of files to include if a directory is specified
    #[arg(long)]
    pub include: Option<String>,

    /// Glob pattern of files to exclude if a directory is specified
    #[arg(long)]
    pub exclude: Option<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
