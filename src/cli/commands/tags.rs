//! Tags command - preview the tag set for a revision

use crate::cli::args::{OutputFormat, TagsArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{DrydockError, DrydockResult};
use crate::registry::ImageRef;
use crate::tag::{RevisionLedger, TagSet};
use chrono::Utc;

/// Execute the tags command
pub async fn execute(args: TagsArgs, config: &Config) -> DrydockResult<()> {
    let tags = TagSet::generate(Utc::now(), &args.revision)?;

    // Surface a collision now rather than mid-publish
    let ledger = RevisionLedger::load(&ConfigManager::ledger_path()).await?;
    if let Some(existing) = ledger.lookup(&tags.revision) {
        if existing != args.revision.trim() {
            return Err(DrydockError::TagCollision {
                short: tags.revision.clone(),
                existing: existing.to_string(),
                incoming: args.revision.clone(),
            });
        }
    }

    let repository = args
        .repo
        .clone()
        .or_else(|| config.registry.repository.clone());

    let references: Vec<String> = match repository {
        Some(repo) => {
            let base = ImageRef::new(&config.registry.host, &repo, "latest")?;
            tags.iter().map(|t| base.with_tag(t).reference()).collect()
        }
        None => tags.iter().map(str::to_string).collect(),
    };

    match args.format {
        OutputFormat::Table => {
            println!("{:<12} {}", "KIND", "TAG");
            println!("{}", "-".repeat(44));
            println!("{:<12} {}", "latest", references[0]);
            println!("{:<12} {}", "date", references[1]);
            println!("{:<12} {}", "revision", references[2]);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&tags)?);
        }
        OutputFormat::Plain => {
            for reference in &references {
                println!("{}", reference);
            }
        }
    }

    Ok(())
}
