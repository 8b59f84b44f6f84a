//! Dependency pre-build
//!
//! Warms a dependency cache layer from the manifest and lockfile alone. A
//! scratch crate with stub entry points stands in for the application, so
//! the resulting object cache holds exactly the compiled dependency graph
//! and survives any change to application source. When the active store
//! already holds a layer for the current lockfile, it is carried into the
//! staging store instead of rebuilt.

use crate::cache::{DependencyCacheLayer, StorePaths};
use crate::context::BuildContext;
use crate::error::{DrydockError, DrydockResult};
use crate::toolchain::Toolchain;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the dependency layer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepSource {
    /// Carried over from the active store, keys matched
    Reused,
    /// Built fresh from stub entry points
    Built,
}

/// Produce a complete dependency layer in the staging store.
///
/// Reuse is hash-keyed, never path-keyed: a layer carries the full lockfile
/// hash it was built from, and only an exact match is carried over. A stale
/// or partial layer in the active store is ignored.
pub async fn run(
    toolchain: &dyn Toolchain,
    ctx: &BuildContext,
    paths: &StorePaths,
) -> DrydockResult<(DependencyCacheLayer, DepSource)> {
    if let Some(active_layer) =
        DependencyCacheLayer::open_valid(&paths.active_deps(), &ctx.manifest_hash)?
    {
        info!("Reusing dependency layer {}", ctx.short_manifest_hash());
        let staged = stage_layer(&active_layer, paths, &ctx.manifest_hash)?;
        return Ok((staged, DepSource::Reused));
    }

    info!(
        "Building dependency layer {} from stubs",
        ctx.short_manifest_hash()
    );
    let mut layer = DependencyCacheLayer::begin(&paths.staging_deps(), &ctx.manifest_hash)?;

    let scratch = paths.staging.join("prebuild");
    materialize_stub_crate(ctx, &scratch)?;

    let result = async {
        toolchain.fetch_dependencies(&scratch).await?;
        toolchain
            .build_release(&scratch, layer.path(), None, None)
            .await
    }
    .await;

    // The placeholder source is never needed again, success or not
    let _ = fs::remove_dir_all(&scratch);
    result?;

    layer.finalize()?;
    Ok((layer, DepSource::Built))
}

/// Copy a valid active layer into the staging store and finalize it there
fn stage_layer(
    active: &DependencyCacheLayer,
    paths: &StorePaths,
    manifest_hash: &str,
) -> DrydockResult<DependencyCacheLayer> {
    let mut staged = DependencyCacheLayer::begin(&paths.staging_deps(), manifest_hash)?;
    copy_tree(active.path(), staged.path())?;
    staged.finalize()?;
    Ok(staged)
}

/// Materialize a placeholder crate: real manifest and lockfile, stub sources.
///
/// One stub per entry-point kind the manifest declares — a library stub and
/// an executable stub by default, plus any explicit `path` overrides.
fn materialize_stub_crate(ctx: &BuildContext, scratch: &Path) -> DrydockResult<()> {
    if scratch.exists() {
        fs::remove_dir_all(scratch)
            .map_err(|e| DrydockError::io("clearing prebuild scratch", e))?;
    }
    fs::create_dir_all(scratch).map_err(|e| DrydockError::io("creating prebuild scratch", e))?;

    copy_file(&ctx.manifest_path, &scratch.join(manifest_file_name(ctx)))?;
    copy_file(&ctx.lockfile_path, &scratch.join(lockfile_file_name(ctx)))?;

    for (path, kind) in stub_targets(&ctx.manifest_path)? {
        let full = scratch.join(&path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| DrydockError::io("creating stub source directory", e))?;
        }
        let body = match kind {
            StubKind::Library => "",
            StubKind::Executable => "fn main() {}\n",
        };
        fs::write(&full, body)
            .map_err(|e| DrydockError::io(format!("writing stub {}", full.display()), e))?;
        debug!("Stub entry point: {}", path.display());
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StubKind {
    Library,
    Executable,
}

/// Entry points the stub crate must provide to satisfy the manifest
fn stub_targets(manifest_path: &Path) -> DrydockResult<Vec<(PathBuf, StubKind)>> {
    let content = fs::read_to_string(manifest_path)
        .map_err(|e| DrydockError::io(format!("reading {}", manifest_path.display()), e))?;
    let manifest: toml::Value = content.parse().map_err(DrydockError::TomlParse)?;

    let mut targets = vec![
        (PathBuf::from("src/lib.rs"), StubKind::Library),
        (PathBuf::from("src/main.rs"), StubKind::Executable),
    ];

    if let Some(path) = manifest
        .get("lib")
        .and_then(|l| l.get("path"))
        .and_then(|p| p.as_str())
    {
        targets.push((PathBuf::from(path), StubKind::Library));
    }

    if let Some(bins) = manifest.get("bin").and_then(|b| b.as_array()) {
        for bin in bins {
            if let Some(path) = bin.get("path").and_then(|p| p.as_str()) {
                targets.push((PathBuf::from(path), StubKind::Executable));
            }
        }
    }

    targets.dedup_by(|a, b| a.0 == b.0);
    Ok(targets)
}

fn manifest_file_name(ctx: &BuildContext) -> PathBuf {
    ctx.manifest_path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Cargo.toml"))
}

fn lockfile_file_name(ctx: &BuildContext) -> PathBuf {
    ctx.lockfile_path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Cargo.lock"))
}

fn copy_file(from: &Path, to: &Path) -> DrydockResult<()> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| DrydockError::io(format!("copying {}", from.display()), e))
}

/// Recursively copy a directory tree
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> DrydockResult<()> {
    fs::create_dir_all(dst).map_err(|e| DrydockError::io("creating copy target", e))?;

    let entries =
        fs::read_dir(src).map_err(|e| DrydockError::io(format!("listing {}", src.display()), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| DrydockError::io("reading copy entry", e))?;
        let target = dst.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            copy_file(&entry.path(), &target)?;
        }
    }
    Ok(())
}
