//! Configuration management for Drydock

pub mod schema;

pub use schema::Config;

use crate::error::{DrydockError, DrydockResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Project-local configuration file name
pub const LOCAL_CONFIG_NAME: &str = ".drydock.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("drydock")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("drydock")
    }

    /// Get the run records directory path
    pub fn runs_dir() -> PathBuf {
        Self::state_dir().join("runs")
    }

    /// Get the revision ledger path
    pub fn ledger_path() -> PathBuf {
        Self::state_dir().join("revisions.json")
    }

    /// Default active cache store path
    pub fn default_active_store() -> PathBuf {
        Self::state_dir().join("cache").join("active")
    }

    /// Default staging cache store path
    pub fn default_staging_store() -> PathBuf {
        Self::state_dir().join("cache").join("staging")
    }

    /// Default blob store path
    pub fn default_blob_store() -> PathBuf {
        Self::state_dir().join("cache").join("blobs")
    }

    /// Find a project-local config by walking up from `start`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        let mut dir = Some(start);
        while let Some(d) = dir {
            let candidate = d.join(LOCAL_CONFIG_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            dir = d.parent();
        }
        None
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> DrydockResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration, layering a project-local file over the global one.
    ///
    /// The merge is section-by-section: any key present in the local file
    /// wins, everything else falls through to the global value.
    pub async fn load_merged(&self, local: Option<&Path>) -> DrydockResult<Config> {
        let global_value = if self.config_path.exists() {
            self.read_value(&self.config_path).await?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let merged = match local {
            Some(path) => {
                debug!("Merging local config {}", path.display());
                let local_value = self.read_value(path).await?;
                merge_values(global_value, local_value)
            }
            None => global_value,
        };

        merged
            .try_into()
            .map_err(|e: toml::de::Error| DrydockError::ConfigInvalid {
                path: self.config_path.clone(),
                reason: e.to_string(),
            })
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> DrydockResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DrydockError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| DrydockError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> DrydockResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            DrydockError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure all state directories exist
    pub async fn ensure_state_dirs() -> DrydockResult<()> {
        let dirs = [Self::state_dir(), Self::runs_dir()];

        for dir in &dirs {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| DrydockError::io(format!("creating directory {}", dir.display()), e))?;
        }

        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    async fn read_value(&self, path: &Path) -> DrydockResult<toml::Value> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DrydockError::io(format!("reading config from {}", path.display()), e))?;
        content.parse().map_err(|e: toml::de::Error| {
            DrydockError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })
    }

    async fn ensure_config_dir(&self) -> DrydockResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DrydockError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge two TOML values, with `over` winning on every leaf
fn merge_values(base: toml::Value, over: toml::Value) -> toml::Value {
    match (base, over) {
        (toml::Value::Table(mut base_table), toml::Value::Table(over_table)) => {
            for (key, over_value) in over_table {
                let merged = match base_table.remove(&key) {
                    Some(base_value) => merge_values(base_value, over_value),
                    None => over_value,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, over) => over,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.toml"));
        let config = manager.load().await.unwrap();
        assert_eq!(config.registry.host, "ghcr.io");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.toml"));

        let mut config = Config::default();
        config.registry.host = "registry.example.com".to_string();
        manager.save(&config).await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.registry.host, "registry.example.com");
    }

    #[tokio::test]
    async fn invalid_toml_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        stdfs::write(&path, "registry = [broken").unwrap();

        let manager = ConfigManager::with_path(path);
        let err = manager.load().await.unwrap_err();
        assert!(matches!(err, DrydockError::ConfigInvalid { .. }));
    }

    #[tokio::test]
    async fn local_config_overrides_global_per_key() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("config.toml");
        stdfs::write(
            &global,
            "[registry]\nhost = \"ghcr.io\"\n[build]\nlockfile = \"Cargo.lock\"\n",
        )
        .unwrap();
        let local = dir.path().join(".drydock.toml");
        stdfs::write(&local, "[registry]\nhost = \"registry.example.com\"\n").unwrap();

        let manager = ConfigManager::with_path(global);
        let config = manager.load_merged(Some(&local)).await.unwrap();

        assert_eq!(config.registry.host, "registry.example.com");
        assert_eq!(config.build.lockfile, "Cargo.lock");
    }

    #[test]
    fn find_local_config_walks_up() {
        let dir = TempDir::new().unwrap();
        stdfs::write(dir.path().join(LOCAL_CONFIG_NAME), "").unwrap();
        let nested = dir.path().join("a/b");
        stdfs::create_dir_all(&nested).unwrap();

        let found = ConfigManager::find_local_config(&nested).unwrap();
        assert_eq!(found, dir.path().join(LOCAL_CONFIG_NAME));
    }

    #[test]
    fn find_local_config_absent() {
        let dir = TempDir::new().unwrap();
        // The temp dir's ancestors could theoretically hold a config; the
        // fresh temp root itself does not.
        let found = ConfigManager::find_local_config(dir.path());
        if let Some(path) = found {
            assert_ne!(path.parent().unwrap(), dir.path());
        }
    }
}
