//! Compiler toolchain abstraction
//!
//! The pipeline never invokes a compiler directly; it goes through this
//! trait so the build stages can be exercised against a mock. The shipped
//! implementation drives cargo as a subprocess.

use crate::error::{DrydockError, DrydockResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Shared compilation-acceleration cache settings.
///
/// Purely a speed optimization: the wrapper consults its own cache keyed by
/// source and flags, and a miss costs latency, never correctness.
#[derive(Debug, Clone)]
pub struct AccelCache {
    /// Compiler wrapper binary (e.g. sccache)
    pub wrapper: String,
    /// Local cache directory handed to the wrapper
    pub dir: PathBuf,
}

impl AccelCache {
    /// Environment variables enabling the wrapper for one invocation
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        vec![
            ("RUSTC_WRAPPER", self.wrapper.clone()),
            ("SCCACHE_DIR", self.dir.display().to_string()),
        ]
    }
}

/// Abstract build toolchain interface
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Check if the toolchain is installed
    async fn is_available(&self) -> DrydockResult<bool>;

    /// Resolve the dependency graph pinned by the lockfile in `build_dir`.
    ///
    /// Failure here means the manifest and lockfile cannot be satisfied.
    async fn fetch_dependencies(&self, build_dir: &Path) -> DrydockResult<()>;

    /// Compile everything in `build_dir` in release mode, writing object
    /// output under `cache_dir`.
    async fn build_release(
        &self,
        build_dir: &Path,
        cache_dir: &Path,
        binary: Option<&str>,
        accel: Option<&AccelCache>,
    ) -> DrydockResult<()>;

    /// Path where a named release binary lands under `cache_dir`
    fn release_binary_path(&self, cache_dir: &Path, binary: &str) -> PathBuf;

    /// Human-readable toolchain name
    fn toolchain_name(&self) -> &'static str;
}

/// Toolchain driving cargo as a subprocess
pub struct CargoToolchain;

impl CargoToolchain {
    pub fn new() -> Self {
        Self
    }

    async fn exec(
        &self,
        build_dir: &Path,
        env: &[(&str, String)],
        args: &[&str],
    ) -> DrydockResult<std::process::Output> {
        debug!("Executing: cargo {:?} in {}", args, build_dir.display());

        let mut cmd = Command::new("cargo");
        cmd.args(args)
            .current_dir(build_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in env {
            cmd.env(k, v);
        }

        cmd.output()
            .await
            .map_err(|e| DrydockError::command_failed(format!("cargo {:?}", args), e))
    }
}

impl Default for CargoToolchain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Toolchain for CargoToolchain {
    async fn is_available(&self) -> DrydockResult<bool> {
        Ok(Command::new("cargo")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false))
    }

    async fn fetch_dependencies(&self, build_dir: &Path) -> DrydockResult<()> {
        info!("Resolving dependencies in {}", build_dir.display());

        let output = self.exec(build_dir, &[], &["fetch", "--locked"]).await?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DrydockError::DependencyResolution {
                reason: stderr.trim().to_string(),
            })
        }
    }

    async fn build_release(
        &self,
        build_dir: &Path,
        cache_dir: &Path,
        binary: Option<&str>,
        accel: Option<&AccelCache>,
    ) -> DrydockResult<()> {
        let mut env = vec![("CARGO_TARGET_DIR", cache_dir.display().to_string())];
        if let Some(accel) = accel {
            env.extend(accel.env_vars());
        }

        let mut args = vec!["build", "--release", "--locked"];
        if let Some(bin) = binary {
            args.push("--bin");
            args.push(bin);
        }

        let output = self.exec(build_dir, &env, &args).await?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DrydockError::Compile {
                target: binary.unwrap_or("workspace").to_string(),
                reason: stderr.trim().to_string(),
            })
        }
    }

    fn release_binary_path(&self, cache_dir: &Path, binary: &str) -> PathBuf {
        cache_dir.join("release").join(binary)
    }

    fn toolchain_name(&self) -> &'static str {
        "cargo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accel_cache_env_vars() {
        let accel = AccelCache {
            wrapper: "sccache".to_string(),
            dir: PathBuf::from("/cache/sccache"),
        };
        let vars = accel.env_vars();
        assert_eq!(vars[0], ("RUSTC_WRAPPER", "sccache".to_string()));
        assert_eq!(vars[1].0, "SCCACHE_DIR");
    }

    #[test]
    fn cargo_release_binary_path() {
        let tc = CargoToolchain::new();
        let path = tc.release_binary_path(Path::new("/store/deps/abc"), "app");
        assert_eq!(path, PathBuf::from("/store/deps/abc/release/app"));
    }

    #[test]
    fn cargo_toolchain_name() {
        assert_eq!(CargoToolchain::new().toolchain_name(), "cargo");
    }
}
