//! Blob persistence for cache stores
//!
//! Stores travel between runs as gzipped tar archives through a key-value
//! interface: exact-key restore, prefix fallback to the most recent entry,
//! and save. The filesystem implementation backs local runs; CI schedulers
//! can substitute their own.

use crate::error::{DrydockError, DrydockResult};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::debug;

/// Archive file extension used by the filesystem store
const ARCHIVE_EXT: &str = "tar.gz";

/// Key-value blob persistence for cache archives
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the blob stored under exactly `key`, if present
    async fn restore(&self, key: &str) -> DrydockResult<Option<Vec<u8>>>;

    /// Fetch the most recently saved blob whose key starts with `prefix`
    async fn restore_latest_with_prefix(&self, prefix: &str) -> DrydockResult<Option<Vec<u8>>>;

    /// Persist `bytes` under `key`, overwriting any previous blob
    async fn save(&self, key: &str, bytes: &[u8]) -> DrydockResult<()>;
}

/// Filesystem-backed blob store: one `<key>.tar.gz` per entry
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root` (created lazily on first save)
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{ARCHIVE_EXT}"))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn restore(&self, key: &str) -> DrydockResult<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .await
            .map_err(|e| DrydockError::io(format!("reading blob {}", path.display()), e))?;
        debug!("Restored blob {} ({} bytes)", key, bytes.len());
        Ok(Some(bytes))
    }

    async fn restore_latest_with_prefix(&self, prefix: &str) -> DrydockResult<Option<Vec<u8>>> {
        if !self.root.is_dir() {
            return Ok(None);
        }

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| DrydockError::io(format!("listing {}", self.root.display()), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DrydockError::io("reading blob store entry", e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(prefix) || !name.ends_with(ARCHIVE_EXT) {
                continue;
            }
            let meta = entry
                .metadata()
                .await
                .map_err(|e| DrydockError::io("reading blob metadata", e))?;
            let modified = meta.modified().map_err(|e| DrydockError::io("blob mtime", e))?;
            if newest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
                newest = Some((modified, entry.path()));
            }
        }

        match newest {
            Some((_, path)) => {
                let bytes = fs::read(&path)
                    .await
                    .map_err(|e| DrydockError::io(format!("reading blob {}", path.display()), e))?;
                debug!("Restored prefix match {} ({} bytes)", path.display(), bytes.len());
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> DrydockResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DrydockError::io(format!("creating {}", self.root.display()), e))?;

        let path = self.entry_path(key);
        fs::write(&path, bytes)
            .await
            .map_err(|e| DrydockError::io(format!("writing blob {}", path.display()), e))?;
        debug!("Saved blob {} ({} bytes)", key, bytes.len());
        Ok(())
    }
}

/// Archive a directory tree into a gzipped tarball
pub fn pack_dir(dir: &Path) -> DrydockResult<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    builder
        .append_dir_all(".", dir)
        .map_err(|e| DrydockError::io(format!("archiving {}", dir.display()), e))?;
    let encoder = builder
        .into_inner()
        .map_err(|e| DrydockError::io("finishing archive", e))?;
    encoder
        .finish()
        .map_err(|e| DrydockError::io("compressing archive", e))
}

/// Unpack a gzipped tarball into `dest`, which is created fresh
pub fn unpack_into(bytes: &[u8], dest: &Path) -> DrydockResult<()> {
    if dest.exists() {
        std::fs::remove_dir_all(dest)
            .map_err(|e| DrydockError::io(format!("clearing {}", dest.display()), e))?;
    }
    std::fs::create_dir_all(dest)
        .map_err(|e| DrydockError::io(format!("creating {}", dest.display()), e))?;

    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    archive
        .unpack(dest)
        .map_err(|e| DrydockError::io(format!("unpacking into {}", dest.display()), e))
}
