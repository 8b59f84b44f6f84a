//! Source build
//!
//! Compiles the real application in release mode against the staged
//! dependency layer, producing exactly one artifact. A layer whose key does
//! not match the current lockfile is silently bypassed in favor of a full
//! recompilation; a stale layer is never mixed into the output.

use crate::cache::{DependencyCacheLayer, StorePaths};
use crate::context::BuildContext;
use crate::error::{DrydockError, DrydockResult};
use crate::toolchain::{AccelCache, Toolchain};
use std::path::PathBuf;
use tracing::{info, warn};

/// The single compiled release binary of one build
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Absolute path to the binary
    pub path: PathBuf,
    /// Binary target name
    pub binary: String,
}

/// Build the named release binary, reusing the staged dependency layer when
/// its key matches the current build context.
pub async fn run(
    toolchain: &dyn Toolchain,
    ctx: &BuildContext,
    paths: &StorePaths,
    binary: &str,
    accel: Option<&AccelCache>,
) -> DrydockResult<Artifact> {
    let mut layer = match DependencyCacheLayer::open_valid(&paths.staging_deps(), &ctx.manifest_hash)?
    {
        Some(layer) => layer,
        None => {
            // Mismatch or missing: full recompilation into a fresh layer
            warn!(
                "No dependency layer for {}, recompiling from scratch",
                ctx.short_manifest_hash()
            );
            DependencyCacheLayer::begin(&paths.staging_deps(), &ctx.manifest_hash)?
        }
    };

    info!("Compiling {} (release)", binary);
    toolchain
        .build_release(&ctx.root, layer.path(), Some(binary), accel)
        .await?;
    layer.finalize()?;

    let path = toolchain.release_binary_path(layer.path(), binary);
    if !path.is_file() {
        return Err(DrydockError::ArtifactMissing(path));
    }

    Ok(Artifact {
        path,
        binary: binary.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Toolchain stand-in that fabricates a binary, or fails on demand
    struct FakeToolchain {
        fail: bool,
        produce_binary: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeToolchain {
        fn new() -> Self {
            Self {
                fail: false,
                produce_binary: true,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Toolchain for FakeToolchain {
        async fn is_available(&self) -> DrydockResult<bool> {
            Ok(true)
        }

        async fn fetch_dependencies(&self, _build_dir: &Path) -> DrydockResult<()> {
            self.calls.lock().unwrap().push("fetch".to_string());
            Ok(())
        }

        async fn build_release(
            &self,
            _build_dir: &Path,
            cache_dir: &Path,
            binary: Option<&str>,
            _accel: Option<&AccelCache>,
        ) -> DrydockResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("build:{}", binary.unwrap_or("deps")));
            if self.fail {
                return Err(DrydockError::Compile {
                    target: binary.unwrap_or("deps").to_string(),
                    reason: "boom".to_string(),
                });
            }
            if self.produce_binary {
                if let Some(bin) = binary {
                    let out = cache_dir.join("release");
                    fs::create_dir_all(&out).unwrap();
                    fs::write(out.join(bin), "ELF").unwrap();
                }
            }
            Ok(())
        }

        fn release_binary_path(&self, cache_dir: &Path, binary: &str) -> PathBuf {
            cache_dir.join("release").join(binary)
        }

        fn toolchain_name(&self) -> &'static str {
            "fake"
        }
    }

    fn setup(root: &Path) -> (BuildContext, StorePaths) {
        fs::write(root.join("Cargo.toml"), "[package]\nname = \"app\"").unwrap();
        fs::write(root.join("Cargo.lock"), "version = 3").unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();

        let ctx = BuildContext::discover(root, "Cargo.toml", "Cargo.lock").unwrap();
        let paths = StorePaths::new(root.join(".drydock/active"), root.join(".drydock/staging"))
            .unwrap();
        fs::create_dir_all(paths.staging_deps()).unwrap();
        (ctx, paths)
    }

    #[tokio::test]
    async fn produces_artifact_with_warm_layer() {
        let dir = TempDir::new().unwrap();
        let (ctx, paths) = setup(dir.path());

        let mut layer =
            DependencyCacheLayer::begin(&paths.staging_deps(), &ctx.manifest_hash).unwrap();
        layer.finalize().unwrap();

        let tc = FakeToolchain::new();
        let artifact = run(&tc, &ctx, &paths, "app", None).await.unwrap();
        assert!(artifact.path.is_file());
        assert_eq!(artifact.binary, "app");
    }

    #[tokio::test]
    async fn missing_layer_falls_back_to_full_build() {
        let dir = TempDir::new().unwrap();
        let (ctx, paths) = setup(dir.path());

        let tc = FakeToolchain::new();
        let artifact = run(&tc, &ctx, &paths, "app", None).await.unwrap();
        assert!(artifact.path.is_file());
        // The fallback layer is finalized so the rotated store stays warm
        assert!(
            DependencyCacheLayer::open_valid(&paths.staging_deps(), &ctx.manifest_hash)
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn compile_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let (ctx, paths) = setup(dir.path());

        let tc = FakeToolchain {
            fail: true,
            ..FakeToolchain::new()
        };
        let err = run(&tc, &ctx, &paths, "app", None).await.unwrap_err();
        assert!(matches!(err, DrydockError::Compile { .. }));
    }

    #[tokio::test]
    async fn missing_binary_after_success_is_artifact_missing() {
        let dir = TempDir::new().unwrap();
        let (ctx, paths) = setup(dir.path());

        let tc = FakeToolchain {
            produce_binary: false,
            ..FakeToolchain::new()
        };
        let err = run(&tc, &ctx, &paths, "app", None).await.unwrap_err();
        assert!(matches!(err, DrydockError::ArtifactMissing(_)));
    }
}
