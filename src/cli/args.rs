//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Drydock - continuous build-and-publish pipeline
///
/// Compiles a release binary through a cache-partitioned build, assembles a
/// minimal runtime image, publishes it under deterministic tags, and rotates
/// the local build cache.
#[derive(Parser, Debug)]
#[command(name = "drydock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DRYDOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .drydock.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute the full build-and-publish pipeline
    Run(RunArgs),

    /// Print the tag set a revision would publish under
    Tags(TagsArgs),

    /// List recorded pipeline runs
    Runs(RunsArgs),

    /// Inspect or clear the local cache stores
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Initialize a project-local .drydock.toml config
    Init(InitArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Full source revision id to build
    #[arg(long, env = "DRYDOCK_REVISION")]
    pub revision: String,

    /// Repository fully-qualified name (owner/name)
    #[arg(long, env = "DRYDOCK_REPOSITORY")]
    pub repo: Option<String>,

    /// Source tree to build (defaults to current directory)
    #[arg(long)]
    pub build_root: Option<PathBuf>,

    /// Binary target to build (defaults to config, then repository name)
    #[arg(long)]
    pub binary: Option<String>,

    /// Skip the registry latest-tag layer-cache hint
    #[arg(long)]
    pub no_remote_cache: bool,
}

/// Arguments for the tags command
#[derive(Parser, Debug)]
pub struct TagsArgs {
    /// Full source revision id
    #[arg(long, env = "DRYDOCK_REVISION")]
    pub revision: String,

    /// Repository fully-qualified name (owner/name)
    #[arg(long, env = "DRYDOCK_REPOSITORY")]
    pub repo: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the runs command
#[derive(Parser, Debug)]
pub struct RunsArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Show at most this many runs (0 = all)
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show store locations, validity and sizes
    Status {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete the local stores and blob archives
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite existing .drydock.toml
    #[arg(short, long)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
