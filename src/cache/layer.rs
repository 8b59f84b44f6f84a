//! Dependency cache layers
//!
//! A layer holds the compiled third-party dependency graph for one lockfile,
//! keyed by the lockfile's content hash. Layers live under `<store>/deps/`
//! and carry a metadata file recording their full key and state; a layer is
//! only ever reused whole, when its recorded key matches the current build
//! and it was marked complete.

use crate::error::{DrydockError, DrydockResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Metadata file name inside a layer directory
const LAYER_META: &str = "layer.json";

/// State of a dependency cache layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerState {
    /// Build in progress or interrupted; contents must not be trusted
    Building,
    /// Finalized after a successful dependency build
    Complete,
}

impl fmt::Display for LayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Building => write!(f, "building"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayerMetadata {
    /// Full SHA256 of the lockfile this layer was built from
    key: String,
    state: LayerState,
    created_at: DateTime<Utc>,
}

/// A dependency cache layer on disk
#[derive(Debug)]
pub struct DependencyCacheLayer {
    dir: PathBuf,
    meta: LayerMetadata,
}

impl DependencyCacheLayer {
    /// Directory for a layer key under a store's `deps` namespace.
    ///
    /// The short hash names the directory; validity is always decided by the
    /// full key recorded in the metadata, never by path identity.
    fn dir_for(deps_root: &Path, manifest_hash: &str) -> PathBuf {
        deps_root.join(&manifest_hash[..12.min(manifest_hash.len())])
    }

    /// Open an existing layer if it is valid for `manifest_hash`.
    ///
    /// Returns `None` for a missing directory, a key mismatch, or a layer
    /// left in `building` state by an interrupted run. Stale layers are left
    /// on disk untouched; they are never partially reused.
    pub fn open_valid(deps_root: &Path, manifest_hash: &str) -> DrydockResult<Option<Self>> {
        let dir = Self::dir_for(deps_root, manifest_hash);
        let meta_path = dir.join(LAYER_META);
        if !meta_path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&meta_path)
            .map_err(|e| DrydockError::io(format!("reading {}", meta_path.display()), e))?;
        let meta: LayerMetadata = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                debug!("Ignoring unreadable layer metadata: {}", e);
                return Ok(None);
            }
        };

        if meta.key != manifest_hash || meta.state != LayerState::Complete {
            debug!(
                "Ignoring layer at {}: key/state mismatch (state {})",
                dir.display(),
                meta.state
            );
            return Ok(None);
        }

        Ok(Some(Self { dir, meta }))
    }

    /// Start a fresh layer for `manifest_hash`, discarding any previous
    /// directory under the same name.
    pub fn begin(deps_root: &Path, manifest_hash: &str) -> DrydockResult<Self> {
        let dir = Self::dir_for(deps_root, manifest_hash);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .map_err(|e| DrydockError::io(format!("clearing stale layer {}", dir.display()), e))?;
        }
        fs::create_dir_all(&dir)
            .map_err(|e| DrydockError::io(format!("creating layer {}", dir.display()), e))?;

        let meta = LayerMetadata {
            key: manifest_hash.to_string(),
            state: LayerState::Building,
            created_at: Utc::now(),
        };
        let layer = Self { dir, meta };
        layer.write_meta()?;
        Ok(layer)
    }

    /// Mark the layer complete after a successful dependency build
    pub fn finalize(&mut self) -> DrydockResult<()> {
        self.meta.state = LayerState::Complete;
        self.write_meta()
    }

    /// The layer directory, handed to the toolchain as its object cache
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Full lockfile hash this layer was built from
    pub fn key(&self) -> &str {
        &self.meta.key
    }

    /// Current layer state
    pub fn state(&self) -> LayerState {
        self.meta.state
    }

    fn write_meta(&self) -> DrydockResult<()> {
        let content = serde_json::to_string_pretty(&self.meta)?;
        let path = self.dir.join(LAYER_META);
        fs::write(&path, content)
            .map_err(|e| DrydockError::io(format!("writing {}", path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HASH_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    #[test]
    fn open_missing_layer_is_none() {
        let dir = TempDir::new().unwrap();
        let layer = DependencyCacheLayer::open_valid(dir.path(), HASH_A).unwrap();
        assert!(layer.is_none());
    }

    #[test]
    fn building_layer_is_not_reused() {
        let dir = TempDir::new().unwrap();
        DependencyCacheLayer::begin(dir.path(), HASH_A).unwrap();

        // Interrupted before finalize: must be ignored
        let layer = DependencyCacheLayer::open_valid(dir.path(), HASH_A).unwrap();
        assert!(layer.is_none());
    }

    #[test]
    fn finalized_layer_is_reused() {
        let dir = TempDir::new().unwrap();
        let mut layer = DependencyCacheLayer::begin(dir.path(), HASH_A).unwrap();
        layer.finalize().unwrap();

        let reopened = DependencyCacheLayer::open_valid(dir.path(), HASH_A)
            .unwrap()
            .unwrap();
        assert_eq!(reopened.key(), HASH_A);
        assert_eq!(reopened.state(), LayerState::Complete);
    }

    #[test]
    fn key_mismatch_is_not_reused() {
        let dir = TempDir::new().unwrap();
        let mut layer = DependencyCacheLayer::begin(dir.path(), HASH_A).unwrap();
        layer.finalize().unwrap();

        let other = DependencyCacheLayer::open_valid(dir.path(), HASH_B).unwrap();
        assert!(other.is_none());
    }

    #[test]
    fn full_key_decides_validity_not_directory_name() {
        let dir = TempDir::new().unwrap();
        let mut layer = DependencyCacheLayer::begin(dir.path(), HASH_A).unwrap();
        layer.finalize().unwrap();

        // Same first 12 chars, different full hash
        let sibling = format!("{}{}", &HASH_A[..12], &HASH_B[12..]);
        let reopened = DependencyCacheLayer::open_valid(dir.path(), &sibling).unwrap();
        assert!(reopened.is_none());
    }

    #[test]
    fn begin_discards_previous_contents() {
        let dir = TempDir::new().unwrap();
        let mut layer = DependencyCacheLayer::begin(dir.path(), HASH_A).unwrap();
        fs::write(layer.path().join("old.rlib"), "stale").unwrap();
        layer.finalize().unwrap();

        let fresh = DependencyCacheLayer::begin(dir.path(), HASH_A).unwrap();
        assert!(!fresh.path().join("old.rlib").exists());
    }

    #[test]
    fn garbage_metadata_is_ignored() {
        let dir = TempDir::new().unwrap();
        let layer_dir = dir.path().join(&HASH_A[..12]);
        fs::create_dir_all(&layer_dir).unwrap();
        fs::write(layer_dir.join("layer.json"), "not json").unwrap();

        let layer = DependencyCacheLayer::open_valid(dir.path(), HASH_A).unwrap();
        assert!(layer.is_none());
    }
}
