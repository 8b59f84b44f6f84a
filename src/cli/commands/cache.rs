//! Cache command - inspect or clear the local stores

use crate::cache::{is_valid_store, StorePaths};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::{DrydockError, DrydockResult};
use crate::ui::{prompts, OutputMode};
use console::style;
use std::fs;
use std::path::Path;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> DrydockResult<()> {
    let paths = store_paths(config)?;
    let blob_dir = config
        .cache
        .blob_dir
        .clone()
        .unwrap_or_else(ConfigManager::default_blob_store);

    match args.action {
        CacheAction::Status { format } => status(&paths, &blob_dir, format),
        CacheAction::Clear { yes } => clear(&paths, &blob_dir, yes).await,
    }
}

fn store_paths(config: &Config) -> DrydockResult<StorePaths> {
    StorePaths::new(
        config
            .cache
            .active_dir
            .clone()
            .unwrap_or_else(ConfigManager::default_active_store),
        config
            .cache
            .staging_dir
            .clone()
            .unwrap_or_else(ConfigManager::default_staging_store),
    )
}

fn status(paths: &StorePaths, blob_dir: &Path, format: OutputFormat) -> DrydockResult<()> {
    let rows = [
        ("active", paths.active.clone(), is_valid_store(&paths.active)),
        ("staging", paths.staging.clone(), false),
        ("blobs", blob_dir.to_path_buf(), blob_dir.is_dir()),
    ];

    match format {
        OutputFormat::Table => {
            println!("{:<10} {:<10} {:<10} {}", "STORE", "STATE", "SIZE", "PATH");
            println!("{}", "-".repeat(70));
            for (name, path, valid) in &rows {
                let state = if *valid {
                    style("valid").green().to_string()
                } else if path.exists() {
                    style("untrusted").yellow().to_string()
                } else {
                    style("absent").dim().to_string()
                };
                println!(
                    "{:<10} {:<10} {:<10} {}",
                    name,
                    state,
                    format_bytes(dir_size(path)),
                    path.display()
                );
            }
        }
        OutputFormat::Json => {
            #[derive(serde::Serialize)]
            struct StoreJson {
                name: String,
                path: String,
                valid: bool,
                size_bytes: u64,
            }
            let stores: Vec<StoreJson> = rows
                .iter()
                .map(|(name, path, valid)| StoreJson {
                    name: (*name).to_string(),
                    path: path.display().to_string(),
                    valid: *valid,
                    size_bytes: dir_size(path),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&stores)?);
        }
        OutputFormat::Plain => {
            for (_, path, _) in &rows {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}

async fn clear(paths: &StorePaths, blob_dir: &Path, yes: bool) -> DrydockResult<()> {
    let mode = OutputMode::detect();
    let confirmed = prompts::confirm(
        mode,
        "Delete all local cache stores and blob archives?",
        false,
        yes,
    )
    .await?;
    if !confirmed {
        println!("Aborted.");
        return Ok(());
    }

    let mut removed = 0usize;
    for path in [paths.active.as_path(), paths.staging.as_path(), blob_dir] {
        if path.exists() {
            fs::remove_dir_all(path)
                .map_err(|e| DrydockError::io(format!("removing {}", path.display()), e))?;
            removed += 1;
        }
    }

    println!("{} Cleared {} store(s)", style("✓").green(), removed);
    Ok(())
}

/// Total size of a directory tree in bytes (0 when absent)
fn dir_size(path: &Path) -> u64 {
    fn walk(dir: &Path) -> u64 {
        let Ok(entries) = fs::read_dir(dir) else {
            return 0;
        };
        entries
            .flatten()
            .map(|entry| {
                let p = entry.path();
                if p.is_dir() {
                    walk(&p)
                } else {
                    entry.metadata().map(|m| m.len()).unwrap_or(0)
                }
            })
            .sum()
    }

    if path.is_dir() {
        walk(path)
    } else {
        0
    }
}

/// Format bytes as human-readable size (e.g., "1.5 GB")
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn format_bytes_scales() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn dir_size_sums_nested_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/f1"), vec![0u8; 100]).unwrap();
        fs::write(dir.path().join("a/b/f2"), vec![0u8; 50]).unwrap();

        assert_eq!(dir_size(dir.path()), 150);
    }

    #[test]
    fn dir_size_absent_is_zero() {
        let dir = TempDir::new().unwrap();
        assert_eq!(dir_size(&dir.path().join("missing")), 0);
    }
}
