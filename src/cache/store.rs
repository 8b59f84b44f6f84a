//! Cache store lifecycle
//!
//! One store directory is active (read by the current build), a second is
//! staged (written by the current build). Promotion replaces the active
//! store with the staged one only after a successful publish, and only via
//! remove-then-rename once nothing is reading the old directory anymore. A
//! completion marker inside the store is the authoritative validity signal:
//! a directory without it is treated as absent, so an interrupted promotion
//! degrades to a cold start instead of a corrupt read.

use crate::cache::remote::{pack_dir, unpack_into, BlobStore};
use crate::error::{DrydockError, DrydockResult};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Marker file proving a store directory was written out completely
pub const COMPLETE_MARKER: &str = "COMPLETE";

/// Namespace directory for dependency layers inside a store
pub const DEPS_DIR: &str = "deps";

/// The two store locations, always distinct
#[derive(Debug, Clone)]
pub struct StorePaths {
    /// Store consumed by this run (restored at start)
    pub active: PathBuf,
    /// Store produced by this run (promoted after publish)
    pub staging: PathBuf,
}

impl StorePaths {
    /// Pair up an active and a staging path.
    ///
    /// The same path for both would let promotion delete the store a build
    /// is reading, so it is rejected outright.
    pub fn new(active: PathBuf, staging: PathBuf) -> DrydockResult<Self> {
        if active == staging {
            return Err(DrydockError::ConfigInvalid {
                path: active,
                reason: "active and staging cache paths must differ".to_string(),
            });
        }
        Ok(Self { active, staging })
    }

    /// Dependency layer namespace inside the active store
    pub fn active_deps(&self) -> PathBuf {
        self.active.join(DEPS_DIR)
    }

    /// Dependency layer namespace inside the staging store
    pub fn staging_deps(&self) -> PathBuf {
        self.staging.join(DEPS_DIR)
    }
}

/// Blob store key for one pipeline run: `(os-identifier, revision)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKey {
    pub os: String,
    pub revision: String,
}

impl StoreKey {
    pub fn new(os: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            revision: revision.into(),
        }
    }

    /// Exact key for this run's store
    pub fn exact(&self) -> String {
        format!("cache-{}-{}", self.os, self.revision)
    }

    /// Looser prefix shared by every run on the same pipeline OS
    pub fn prefix(&self) -> String {
        format!("cache-{}-", self.os)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.exact())
    }
}

/// How the active store was obtained at pipeline start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// A valid local store already existed; local wins over remote copies
    Local,
    /// Restored from the blob store under the exact revision key
    Exact,
    /// Restored from the most recent blob sharing the OS prefix
    Prefix,
    /// No usable store anywhere; starting empty
    Cold,
}

impl fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Exact => write!(f, "exact"),
            Self::Prefix => write!(f, "prefix"),
            Self::Cold => write!(f, "cold"),
        }
    }
}

/// Whether `path` holds a trustworthy store: marker file present.
///
/// This check is authoritative — directory contents are never inspected
/// before the marker is found.
pub fn is_valid_store(path: &Path) -> bool {
    path.join(COMPLETE_MARKER).is_file()
}

/// Manages one run's store lifecycle against a blob store
pub struct Rotator<'a> {
    paths: StorePaths,
    blob: &'a dyn BlobStore,
}

impl<'a> Rotator<'a> {
    pub fn new(paths: StorePaths, blob: &'a dyn BlobStore) -> Self {
        Self { paths, blob }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Restore the active store for this run.
    ///
    /// Precedence: a valid local store wins; otherwise the blob store is
    /// consulted under the exact key, then the OS prefix; otherwise the run
    /// cold-starts. An unmarked local directory is discarded, never read.
    pub async fn restore(&self, key: &StoreKey) -> DrydockResult<RestoreOutcome> {
        if is_valid_store(&self.paths.active) {
            debug!("Active store at {} is valid", self.paths.active.display());
            return Ok(RestoreOutcome::Local);
        }

        if self.paths.active.exists() {
            warn!(
                "Discarding unmarked store at {}",
                self.paths.active.display()
            );
            fs::remove_dir_all(&self.paths.active)
                .map_err(|e| DrydockError::io("discarding invalid store", e))?;
        }

        if let Some(bytes) = self.blob.restore(&key.exact()).await? {
            unpack_into(&bytes, &self.paths.active)?;
            if is_valid_store(&self.paths.active) {
                info!("Restored store for {}", key);
                return Ok(RestoreOutcome::Exact);
            }
            warn!("Blob {} unpacked without marker, discarding", key);
            fs::remove_dir_all(&self.paths.active)
                .map_err(|e| DrydockError::io("discarding invalid restore", e))?;
        }

        if let Some(bytes) = self.blob.restore_latest_with_prefix(&key.prefix()).await? {
            unpack_into(&bytes, &self.paths.active)?;
            if is_valid_store(&self.paths.active) {
                info!("Restored store by prefix {}", key.prefix());
                return Ok(RestoreOutcome::Prefix);
            }
            warn!("Prefix blob unpacked without marker, discarding");
            fs::remove_dir_all(&self.paths.active)
                .map_err(|e| DrydockError::io("discarding invalid restore", e))?;
        }

        info!("No usable store, cold start");
        Ok(RestoreOutcome::Cold)
    }

    /// Prepare an empty staging store, clearing any leftovers from an
    /// interrupted previous run.
    pub fn prepare_staging(&self) -> DrydockResult<()> {
        if self.paths.staging.exists() {
            fs::remove_dir_all(&self.paths.staging)
                .map_err(|e| DrydockError::io("clearing stale staging store", e))?;
        }
        fs::create_dir_all(self.paths.staging_deps())
            .map_err(|e| DrydockError::io("creating staging store", e))?;
        Ok(())
    }

    /// Persist the staging store to the blob store and promote it locally.
    ///
    /// Runs strictly after publish. Sequence: mark staging complete, save the
    /// archive remotely, delete the old active store, rename staging into its
    /// place. The build that read the old active store has already finished,
    /// so the remove-then-rename never races a reader. Every failure here
    /// maps to `CachePromotion` — the published image is already final.
    pub async fn rotate(&self, key: &StoreKey) -> DrydockResult<()> {
        if !self.paths.staging.is_dir() {
            return Err(DrydockError::CachePromotion {
                reason: format!("staging store missing at {}", self.paths.staging.display()),
            });
        }

        fs::write(self.paths.staging.join(COMPLETE_MARKER), b"")
            .map_err(|e| promotion_io("writing completion marker", e))?;

        let archive = pack_dir(&self.paths.staging).map_err(|e| DrydockError::CachePromotion {
            reason: format!("archiving staging store: {e}"),
        })?;
        self.blob
            .save(&key.exact(), &archive)
            .await
            .map_err(|e| DrydockError::CachePromotion {
                reason: format!("saving store blob {key}: {e}"),
            })?;

        if self.paths.active.exists() {
            fs::remove_dir_all(&self.paths.active)
                .map_err(|e| promotion_io("removing old active store", e))?;
        }
        fs::rename(&self.paths.staging, &self.paths.active)
            .map_err(|e| promotion_io("promoting staging store", e))?;

        info!("Promoted store {} -> {}", key, self.paths.active.display());
        Ok(())
    }
}

fn promotion_io(context: &str, e: std::io::Error) -> DrydockError {
    DrydockError::CachePromotion {
        reason: format!("{context}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::remote::FsBlobStore;
    use tempfile::TempDir;

    fn paths(root: &Path) -> StorePaths {
        StorePaths::new(root.join("active"), root.join("staging")).unwrap()
    }

    fn key() -> StoreKey {
        StoreKey::new("linux", "abc1234")
    }

    #[test]
    fn same_path_for_both_stores_rejected() {
        let err = StorePaths::new(PathBuf::from("/c"), PathBuf::from("/c")).unwrap_err();
        assert!(matches!(err, DrydockError::ConfigInvalid { .. }));
    }

    #[test]
    fn store_key_format() {
        let k = key();
        assert_eq!(k.exact(), "cache-linux-abc1234");
        assert_eq!(k.prefix(), "cache-linux-");
    }

    #[tokio::test]
    async fn cold_start_when_nothing_exists() {
        let root = TempDir::new().unwrap();
        let blob = FsBlobStore::new(root.path().join("blobs"));
        let rotator = Rotator::new(paths(root.path()), &blob);

        let outcome = rotator.restore(&key()).await.unwrap();
        assert_eq!(outcome, RestoreOutcome::Cold);
    }

    #[tokio::test]
    async fn local_store_wins_over_blob() {
        let root = TempDir::new().unwrap();
        let blob = FsBlobStore::new(root.path().join("blobs"));
        blob.save(&key().exact(), &pack_dir(root.path()).unwrap())
            .await
            .unwrap();

        let p = paths(root.path());
        fs::create_dir_all(&p.active).unwrap();
        fs::write(p.active.join(COMPLETE_MARKER), b"").unwrap();

        let rotator = Rotator::new(p, &blob);
        let outcome = rotator.restore(&key()).await.unwrap();
        assert_eq!(outcome, RestoreOutcome::Local);
    }

    #[tokio::test]
    async fn exact_blob_restores_store() {
        let root = TempDir::new().unwrap();
        let p = paths(root.path());

        // Build and save a valid store archive
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join(DEPS_DIR)).unwrap();
        fs::write(src.path().join(COMPLETE_MARKER), b"").unwrap();
        let blob = FsBlobStore::new(root.path().join("blobs"));
        blob.save(&key().exact(), &pack_dir(src.path()).unwrap())
            .await
            .unwrap();

        let rotator = Rotator::new(p.clone(), &blob);
        let outcome = rotator.restore(&key()).await.unwrap();
        assert_eq!(outcome, RestoreOutcome::Exact);
        assert!(p.active.join(DEPS_DIR).is_dir());
    }

    #[tokio::test]
    async fn prefix_blob_used_when_exact_misses() {
        let root = TempDir::new().unwrap();
        let p = paths(root.path());

        let src = TempDir::new().unwrap();
        fs::write(src.path().join(COMPLETE_MARKER), b"").unwrap();
        let blob = FsBlobStore::new(root.path().join("blobs"));
        blob.save("cache-linux-fff9999", &pack_dir(src.path()).unwrap())
            .await
            .unwrap();

        let rotator = Rotator::new(p, &blob);
        let outcome = rotator.restore(&key()).await.unwrap();
        assert_eq!(outcome, RestoreOutcome::Prefix);
    }

    #[tokio::test]
    async fn unmarked_local_store_is_discarded() {
        let root = TempDir::new().unwrap();
        let p = paths(root.path());
        fs::create_dir_all(p.active.join(DEPS_DIR)).unwrap();
        fs::write(p.active.join("deps/half-written.rlib"), "junk").unwrap();
        // No marker: the interrupted-promotion case

        let blob = FsBlobStore::new(root.path().join("blobs"));
        let rotator = Rotator::new(p.clone(), &blob);
        let outcome = rotator.restore(&key()).await.unwrap();

        assert_eq!(outcome, RestoreOutcome::Cold);
        assert!(!p.active.exists());
    }

    #[tokio::test]
    async fn rotate_promotes_staging_into_active() {
        let root = TempDir::new().unwrap();
        let p = paths(root.path());
        let blob = FsBlobStore::new(root.path().join("blobs"));
        let rotator = Rotator::new(p.clone(), &blob);

        // Old active store from the previous run
        fs::create_dir_all(&p.active).unwrap();
        fs::write(p.active.join(COMPLETE_MARKER), b"").unwrap();
        fs::write(p.active.join("old.bin"), "old").unwrap();

        rotator.prepare_staging().unwrap();
        fs::write(p.staging.join("new.bin"), "new").unwrap();

        rotator.rotate(&key()).await.unwrap();

        assert!(is_valid_store(&p.active));
        assert!(p.active.join("new.bin").exists());
        assert!(!p.active.join("old.bin").exists());
        assert!(!p.staging.exists());
        // Remote copy saved under the exact key
        assert!(blob.restore(&key().exact()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rotate_without_staging_fails_recoverably() {
        let root = TempDir::new().unwrap();
        let blob = FsBlobStore::new(root.path().join("blobs"));
        let rotator = Rotator::new(paths(root.path()), &blob);

        let err = rotator.rotate(&key()).await.unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn interrupted_promotion_cold_starts_next_run() {
        let root = TempDir::new().unwrap();
        let p = paths(root.path());
        let blob = FsBlobStore::new(root.path().join("blobs"));
        let rotator = Rotator::new(p.clone(), &blob);

        // Simulate: new cache built, old active deleted, rename never ran.
        rotator.prepare_staging().unwrap();
        fs::write(p.staging.join("new.bin"), "new").unwrap();
        // No marker in staging, no active directory at all.

        let outcome = rotator.restore(&key()).await.unwrap();
        assert_eq!(outcome, RestoreOutcome::Cold);

        // And a half-renamed directory without marker is equally untrusted.
        fs::rename(&p.staging, &p.active).unwrap();
        let outcome = rotator.restore(&key()).await.unwrap();
        assert_eq!(outcome, RestoreOutcome::Cold);
    }
}
