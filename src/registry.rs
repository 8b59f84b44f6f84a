//! Registry and image tool abstraction
//!
//! Image references, pre-authenticated credentials, and the trait seam over
//! the container tool used to build, tag and push images. The shipped
//! implementation drives podman as a subprocess; tests substitute a mock.

use crate::error::{DrydockError, DrydockResult};
use crate::tag;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// A fully-qualified image reference: `host/namespace:tag`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub host: String,
    pub namespace: String,
    pub tag: String,
}

impl ImageRef {
    /// Build a reference, case-folding the repository name into a registry
    /// namespace. Uppercase names are rejected by registries, so folding is
    /// part of construction, not a cosmetic afterthought.
    pub fn new(host: &str, repository: &str, tag: &str) -> DrydockResult<Self> {
        Ok(Self {
            host: host.trim().to_ascii_lowercase(),
            namespace: tag::fold_namespace(repository)?,
            tag: tag.to_string(),
        })
    }

    /// Same image, different tag
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            host: self.host.clone(),
            namespace: self.namespace.clone(),
            tag: tag.to_string(),
        }
    }

    /// The full reference string passed to the container tool
    pub fn reference(&self) -> String {
        format!("{}/{}:{}", self.host, self.namespace, self.tag)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference())
    }
}

/// Pre-authenticated registry credential, provided by the scheduler
#[derive(Clone)]
pub struct RegistryCredential {
    pub username: String,
    pub secret: String,
}

impl RegistryCredential {
    /// Read the credential from the configured environment variable.
    ///
    /// Value format is `user:token`; a bare token gets a default user.
    pub fn from_env(var: &str) -> DrydockResult<Self> {
        let raw = std::env::var(var).map_err(|_| DrydockError::CredentialMissing(var.to_string()))?;
        if raw.trim().is_empty() {
            return Err(DrydockError::CredentialMissing(var.to_string()));
        }

        match raw.split_once(':') {
            Some((user, secret)) => Ok(Self {
                username: user.to_string(),
                secret: secret.to_string(),
            }),
            None => Ok(Self {
                username: "token".to_string(),
                secret: raw,
            }),
        }
    }
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Abstract image build/tag/push interface
#[async_trait]
pub trait ImageTool: Send + Sync {
    /// Check if the tool is installed
    async fn is_available(&self) -> DrydockResult<bool>;

    /// Authenticate against a registry host
    async fn login(&self, host: &str, credential: &RegistryCredential) -> DrydockResult<()>;

    /// Build an image from `context_dir`, optionally seeding layer reuse
    /// from a remote reference. Returns the image id.
    async fn build(
        &self,
        context_dir: &Path,
        reference: &ImageRef,
        cache_from: Option<&ImageRef>,
    ) -> DrydockResult<String>;

    /// Apply an additional tag to a built image
    async fn tag(&self, image_id: &str, reference: &ImageRef) -> DrydockResult<()>;

    /// Push one reference to its registry. Blocking, all-or-nothing.
    async fn push(&self, reference: &ImageRef) -> DrydockResult<()>;

    /// Human-readable tool name
    fn tool_name(&self) -> &'static str;
}

/// Image tool driving podman as a subprocess
pub struct PodmanTool;

impl PodmanTool {
    pub fn new() -> Self {
        Self
    }

    async fn exec(&self, args: &[&str]) -> DrydockResult<std::process::Output> {
        debug!("Executing: podman {:?}", args);

        Command::new("podman")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DrydockError::command_failed(format!("podman {:?}", args), e))
    }
}

impl Default for PodmanTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageTool for PodmanTool {
    async fn is_available(&self) -> DrydockResult<bool> {
        Ok(Command::new("podman")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false))
    }

    async fn login(&self, host: &str, credential: &RegistryCredential) -> DrydockResult<()> {
        info!("Logging in to {}", host);

        // The secret goes over stdin so it never appears in an argv listing
        let mut cmd = Command::new("podman")
            .args(["login", host, "--username", &credential.username, "--password-stdin"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DrydockError::command_failed("podman login", e))?;

        if let Some(mut stdin) = cmd.stdin.take() {
            use tokio::io::AsyncWriteExt;
            stdin
                .write_all(credential.secret.as_bytes())
                .await
                .map_err(|e| DrydockError::io("writing registry credential", e))?;
        }

        let output = cmd
            .wait_with_output()
            .await
            .map_err(|e| DrydockError::command_failed("podman login", e))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DrydockError::command_exec("podman login", stderr))
        }
    }

    async fn build(
        &self,
        context_dir: &Path,
        reference: &ImageRef,
        cache_from: Option<&ImageRef>,
    ) -> DrydockResult<String> {
        let context = context_dir.display().to_string();
        let tag_ref = reference.reference();

        let mut args = vec!["build", "--tag", &tag_ref];
        let cache_ref;
        if let Some(remote) = cache_from {
            cache_ref = remote.reference();
            args.push("--cache-from");
            args.push(&cache_ref);
        }
        args.push(&context);

        info!("Building image {}", reference);
        let output = self.exec(&args).await?;

        if output.status.success() {
            let image_id = String::from_utf8_lossy(&output.stdout)
                .lines()
                .last()
                .unwrap_or_default()
                .trim()
                .to_string();
            if image_id.is_empty() {
                return Err(DrydockError::command_exec(
                    "podman build",
                    "no image id in output",
                ));
            }
            Ok(image_id)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DrydockError::command_exec("podman build", stderr))
        }
    }

    async fn tag(&self, image_id: &str, reference: &ImageRef) -> DrydockResult<()> {
        let output = self.exec(&["tag", image_id, &reference.reference()]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DrydockError::command_exec("podman tag", stderr))
        }
    }

    async fn push(&self, reference: &ImageRef) -> DrydockResult<()> {
        info!("Pushing {}", reference);

        let output = self.exec(&["push", &reference.reference()]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DrydockError::RegistryPush {
                image: reference.reference(),
                reason: stderr.trim().to_string(),
            })
        }
    }

    fn tool_name(&self) -> &'static str {
        "podman"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_ref_folds_namespace() {
        let r = ImageRef::new("ghcr.io", "Org/Repo", "latest").unwrap();
        assert_eq!(r.reference(), "ghcr.io/org/repo:latest");
    }

    #[test]
    fn image_ref_with_tag() {
        let r = ImageRef::new("ghcr.io", "org/repo", "latest").unwrap();
        let dated = r.with_tag("20240301100000");
        assert_eq!(dated.reference(), "ghcr.io/org/repo:20240301100000");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn image_ref_rejects_invalid_repository() {
        assert!(ImageRef::new("ghcr.io", "bare", "latest").is_err());
    }

    #[test]
    fn credential_debug_redacts_secret() {
        let cred = RegistryCredential {
            username: "ci".to_string(),
            secret: "super-secret".to_string(),
        };
        let rendered = format!("{:?}", cred);
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn credential_from_env_splits_user() {
        std::env::set_var("DRYDOCK_TEST_CRED", "ci-bot:tok123");
        let cred = RegistryCredential::from_env("DRYDOCK_TEST_CRED").unwrap();
        assert_eq!(cred.username, "ci-bot");
        assert_eq!(cred.secret, "tok123");
        std::env::remove_var("DRYDOCK_TEST_CRED");
    }

    #[test]
    fn credential_missing_env() {
        let err = RegistryCredential::from_env("DRYDOCK_TEST_ABSENT").unwrap_err();
        assert!(matches!(err, DrydockError::CredentialMissing(_)));
    }
}
