//! Init command - write a project-local .drydock.toml

use crate::cli::args::InitArgs;
use crate::config::LOCAL_CONFIG_NAME;
use crate::error::{DrydockError, DrydockResult};
use console::style;
use std::env;
use tokio::fs;

const TEMPLATE: &str = r#"# Drydock project configuration
# Values here override the global config for builds in this tree.

[registry]
# host = "ghcr.io"
# repository = "owner/name"
# credential_env = "REGISTRY_TOKEN"

[build]
# binary = "app"

[image]
# base = "debian:bookworm-slim"
# packages = ["ca-certificates", "libssl3"]
"#;

/// Execute the init command
pub async fn execute(args: InitArgs) -> DrydockResult<()> {
    let dir = match args.path {
        Some(path) => path,
        None => env::current_dir().map_err(|e| DrydockError::io("getting current directory", e))?,
    };
    let target = dir.join(LOCAL_CONFIG_NAME);

    if target.exists() && !args.force {
        return Err(DrydockError::User(format!(
            "{} already exists. Use --force to overwrite.",
            target.display()
        )));
    }

    fs::write(&target, TEMPLATE)
        .await
        .map_err(|e| DrydockError::io(format!("writing {}", target.display()), e))?;

    println!("{} Wrote {}", style("✓").green(), target.display());
    Ok(())
}
