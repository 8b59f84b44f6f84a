//! Build context identity
//!
//! A build is identified by two content hashes over overlapping input: the
//! lockfile hash (coarse key, owns the dependency cache namespace) and the
//! source tree hash (fine key, owns the source fingerprint). Same lockfile =
//! same dependency layer, regardless of application source.

use crate::error::{DrydockError, DrydockResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories never included in the source tree hash.
const EXCLUDED_DIRS: &[&str] = &[".git", "target", ".drydock"];

/// Immutable identity of one build's inputs
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Root of the source tree
    pub root: PathBuf,
    /// Path to the dependency manifest
    pub manifest_path: PathBuf,
    /// Path to the lockfile pinning exact dependency versions
    pub lockfile_path: PathBuf,
    /// SHA256 of the lockfile contents (hex, 64 chars)
    pub manifest_hash: String,
    /// SHA256 over the sorted source tree (hex, 64 chars)
    pub tree_hash: String,
}

impl BuildContext {
    /// Construct a context from a build root and fixed manifest/lockfile names.
    ///
    /// Fails if either file is missing; a build without a lockfile has no
    /// stable dependency identity and must not touch the cache.
    pub fn discover(root: &Path, manifest_name: &str, lockfile_name: &str) -> DrydockResult<Self> {
        let manifest_path = root.join(manifest_name);
        if !manifest_path.is_file() {
            return Err(DrydockError::ManifestNotFound(manifest_path));
        }

        let lockfile_path = root.join(lockfile_name);
        if !lockfile_path.is_file() {
            return Err(DrydockError::LockfileNotFound(lockfile_path));
        }

        let manifest_hash = hash_file(&lockfile_path)?;
        let tree_hash = hash_tree(root)?;
        debug!(
            "Build context: manifest {} tree {}",
            &manifest_hash[..12],
            &tree_hash[..12]
        );

        Ok(Self {
            root: root.to_path_buf(),
            manifest_path,
            lockfile_path,
            manifest_hash,
            tree_hash,
        })
    }

    /// Short form of the manifest hash, used in directory and store key names
    pub fn short_manifest_hash(&self) -> &str {
        &self.manifest_hash[..12]
    }
}

/// Hash a single file's contents using SHA256, returning the full hex digest
pub fn hash_file(path: &Path) -> DrydockResult<String> {
    let contents = fs::read(path).map_err(|e| DrydockError::Io {
        context: format!("reading {}", path.display()),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&contents);
    Ok(hex::encode(hasher.finalize()))
}

/// Hash a source tree: every regular file, sorted by relative path.
///
/// Both the relative path and the contents feed the digest so renames are
/// visible. Excluded directories (VCS metadata, build output, local stores)
/// never contribute.
pub fn hash_tree(root: &Path) -> DrydockResult<String> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for rel in &files {
        let contents = fs::read(root.join(rel)).map_err(|e| DrydockError::Io {
            context: format!("reading {}", root.join(rel).display()),
            source: e,
        })?;
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(&contents);
    }

    Ok(hex::encode(hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> DrydockResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| DrydockError::Io {
        context: format!("listing {}", dir.display()),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| DrydockError::io("reading directory entry", e))?;
        let path = entry.path();
        let name = entry.file_name();

        if path.is_dir() {
            if EXCLUDED_DIRS.iter().any(|d| name == *d) {
                continue;
            }
            collect_files(root, &path, out)?;
        } else if path.is_file() {
            let rel = path
                .strip_prefix(root)
                .map_err(|_| DrydockError::PathNotFound(path.clone()))?;
            out.push(rel.to_path_buf());
        }
    }

    Ok(())
}
