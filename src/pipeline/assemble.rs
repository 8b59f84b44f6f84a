//! Image assembly
//!
//! Packages the compiled artifact into a minimal runtime image: fresh base,
//! a small fixed set of runtime packages (trust roots and TLS libraries), a
//! transport-security policy file, and the artifact as the entry point.
//! Nothing from the build environment crosses into the image.

use crate::error::{DrydockError, DrydockResult};
use crate::pipeline::compile::Artifact;
use crate::registry::{ImageRef, ImageTool};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Baseline transport-security hardening applied to every image
#[derive(Debug, Clone)]
pub struct TlsPolicy {
    /// Minimum accepted protocol version (e.g. "TLSv1.2")
    pub min_protocol: String,
    /// OpenSSL cipher string
    pub cipher_string: String,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self {
            min_protocol: "TLSv1.2".to_string(),
            cipher_string: "DEFAULT@SECLEVEL=2".to_string(),
        }
    }
}

impl TlsPolicy {
    /// Render the policy as an OpenSSL configuration fragment
    pub fn render(&self) -> String {
        format!(
            "openssl_conf = default_conf\n\n\
             [default_conf]\n\
             ssl_conf = ssl_sect\n\n\
             [ssl_sect]\n\
             system_default = system_default_sect\n\n\
             [system_default_sect]\n\
             MinProtocol = {}\n\
             CipherString = {}\n",
            self.min_protocol, self.cipher_string
        )
    }
}

/// What the runtime image is made of
#[derive(Debug, Clone)]
pub struct ImageSpec {
    /// Minimal base image
    pub base_image: String,
    /// Runtime OS packages (trust roots, TLS libraries)
    pub packages: Vec<String>,
    /// Package install command prefix for the base image's manager
    pub package_install: String,
    /// Transport-security policy
    pub tls: TlsPolicy,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            base_image: "debian:bookworm-slim".to_string(),
            packages: vec!["ca-certificates".to_string(), "libssl3".to_string()],
            package_install: "apt-get update && apt-get install -y --no-install-recommends"
                .to_string(),
            tls: TlsPolicy::default(),
        }
    }
}

/// Render the container build file for one artifact.
///
/// A package-install failure fails the image build, which aborts publish.
pub fn render_containerfile(spec: &ImageSpec, binary: &str) -> String {
    let mut lines = vec![format!("FROM {}", spec.base_image)];

    if !spec.packages.is_empty() {
        lines.push(format!(
            "RUN {} {} && rm -rf /var/lib/apt/lists/*",
            spec.package_install,
            spec.packages.join(" ")
        ));
    }

    lines.push("COPY openssl.cnf /etc/ssl/openssl.cnf".to_string());
    lines.push(format!("COPY {binary} /usr/local/bin/{binary}"));
    lines.push(format!("ENTRYPOINT [\"/usr/local/bin/{binary}\"]"));
    lines.join("\n") + "\n"
}

/// Assemble and build the runtime image, returning the image id.
///
/// The registry's `latest` tag is offered as a remote layer-cache hint;
/// local caches always win when both exist.
pub async fn run(
    tool: &dyn ImageTool,
    artifact: &Artifact,
    spec: &ImageSpec,
    latest_ref: &ImageRef,
    use_remote_cache: bool,
    context_dir: &Path,
) -> DrydockResult<String> {
    if !artifact.path.is_file() {
        return Err(DrydockError::ArtifactMissing(artifact.path.clone()));
    }

    materialize_context(artifact, spec, context_dir)?;

    let cache_from = use_remote_cache.then_some(latest_ref);
    let image_id = tool.build(context_dir, latest_ref, cache_from).await?;
    info!("Assembled image {}", &image_id[..12.min(image_id.len())]);
    Ok(image_id)
}

/// Write the image build context: container file, TLS policy, artifact copy
fn materialize_context(
    artifact: &Artifact,
    spec: &ImageSpec,
    context_dir: &Path,
) -> DrydockResult<()> {
    if context_dir.exists() {
        fs::remove_dir_all(context_dir)
            .map_err(|e| DrydockError::io("clearing image context", e))?;
    }
    fs::create_dir_all(context_dir).map_err(|e| DrydockError::io("creating image context", e))?;

    fs::write(
        context_dir.join("Containerfile"),
        render_containerfile(spec, &artifact.binary),
    )
    .map_err(|e| DrydockError::io("writing Containerfile", e))?;

    fs::write(context_dir.join("openssl.cnf"), spec.tls.render())
        .map_err(|e| DrydockError::io("writing TLS policy", e))?;

    fs::copy(&artifact.path, context_dir.join(&artifact.binary))
        .map_err(|e| DrydockError::io("copying artifact into context", e))?;

    debug!("Image context at {}", context_dir.display());
    Ok(())
}
