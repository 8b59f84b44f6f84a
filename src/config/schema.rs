//! Configuration schema for Drydock
//!
//! Configuration is stored at `~/.config/drydock/config.toml`, with an
//! optional project-local `.drydock.toml` overriding it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Registry settings
    pub registry: RegistryConfig,

    /// Build settings
    pub build: BuildConfig,

    /// Runtime image settings
    pub image: ImageConfig,

    /// Cache store settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry host to push to
    pub host: String,

    /// Repository fully-qualified name (owner/name); usually supplied by the
    /// scheduler per run and only pinned here for local use
    pub repository: Option<String>,

    /// Environment variable holding the pre-authenticated credential
    pub credential_env: Option<String>,

    /// Offer the registry's `latest` tag as a layer-cache hint during
    /// assembly. Local caches always win when both exist.
    pub remote_cache_hint: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: "ghcr.io".to_string(),
            repository: None,
            credential_env: Some("REGISTRY_TOKEN".to_string()),
            remote_cache_hint: true,
        }
    }
}

/// Build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Binary target to build and ship; defaults to the repository name
    pub binary: Option<String>,

    /// Dependency manifest file name
    pub manifest: String,

    /// Lockfile file name
    pub lockfile: String,

    /// Compilation-acceleration cache settings
    pub accel: AccelConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            binary: None,
            manifest: "Cargo.toml".to_string(),
            lockfile: "Cargo.lock".to_string(),
            accel: AccelConfig::default(),
        }
    }
}

/// Compilation-acceleration cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelConfig {
    /// Enable the compiler wrapper
    pub enabled: bool,

    /// Wrapper binary name
    pub wrapper: String,

    /// Wrapper cache directory (state dir default when unset)
    pub dir: Option<PathBuf>,
}

impl Default for AccelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            wrapper: "sccache".to_string(),
            dir: None,
        }
    }
}

/// Runtime image settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Minimal base image
    pub base: String,

    /// Runtime OS packages installed into the image
    pub packages: Vec<String>,

    /// Package install command prefix
    pub package_install: String,

    /// Minimum accepted TLS protocol version
    pub tls_min_protocol: String,

    /// OpenSSL cipher string
    pub tls_ciphers: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base: "debian:bookworm-slim".to_string(),
            packages: vec!["ca-certificates".to_string(), "libssl3".to_string()],
            package_install: "apt-get update && apt-get install -y --no-install-recommends"
                .to_string(),
            tls_min_protocol: "TLSv1.2".to_string(),
            tls_ciphers: "DEFAULT@SECLEVEL=2".to_string(),
        }
    }
}

/// Cache store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Active store directory (state dir default when unset)
    pub active_dir: Option<PathBuf>,

    /// Staging store directory (state dir default when unset)
    pub staging_dir: Option<PathBuf>,

    /// Blob store directory (state dir default when unset)
    pub blob_dir: Option<PathBuf>,

    /// OS identifier used in blob store keys (host OS when unset)
    pub os_id: Option<String>,
}
