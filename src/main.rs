//! Drydock - continuous build-and-publish pipeline
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use drydock::cli::{Cli, Commands};
use drydock::config::ConfigManager;
use drydock::error::DrydockResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> DrydockResult<()> {
    let cli = Cli::parse();

    // Init command doesn't need config loading
    if let Commands::Init(args) = cli.command {
        init_logging(cli.verbose, "text");
        return drydock::cli::commands::init(args).await;
    }

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| drydock::error::DrydockError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_logging(cli.verbose, &config.general.log_format);
    if let Some(ref path) = local_config_path {
        debug!("Using local config: {}", path.display());
    }

    // Ensure state directories exist
    ConfigManager::ensure_state_dirs().await?;

    // Dispatch to command
    match cli.command {
        Commands::Init(_) => unreachable!("Init handled above"),
        Commands::Run(args) => drydock::cli::commands::run(args, &config).await,
        Commands::Tags(args) => drydock::cli::commands::tags(args, &config).await,
        Commands::Runs(args) => drydock::cli::commands::runs(args, &config).await,
        Commands::Cache(args) => drydock::cli::commands::cache(args, &config).await,
        Commands::Config(args) => drydock::cli::commands::config(args, &config).await,
    }
}

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("drydock=warn"),
        1 => EnvFilter::new("drydock=info"),
        _ => EnvFilter::new("drydock=debug"),
    };

    if format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .init();
    }
}
