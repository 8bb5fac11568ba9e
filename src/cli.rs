use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, PartialEq)]
#[command(name = "fleetstats")]
#[command(about = "Discover git repositories under a directory and generate a statistics report for each of them")]
pub struct CliArgs {
    /// Directory to scan for repositories
    pub root: PathBuf,

    /// Directory receiving one `<name>_report` folder per repository and the summary page
    pub output: PathBuf,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum directory depth to scan below the root
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Glob a directory name must match to be scanned (repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Glob of directory names to skip (repeatable, replaces the defaults)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Number of repositories processed in parallel
    #[arg(long)]
    pub workers: Option<usize>,

    /// Number of repositories per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Per-repository time limit in seconds (0 disables it)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Keep partial report directories of failed repositories
    #[arg(long)]
    pub no_cleanup: bool,

    /// Only list the discovered repositories
    #[arg(long)]
    pub discover_only: bool,

    /// Override a configuration value (key=value, repeatable)
    #[arg(short = 'c', long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
