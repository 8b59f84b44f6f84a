//! Pipeline orchestration
//!
//! One run is a strictly ordered sequence of stages; each stage's output is
//! the next stage's input, and any failure is terminal. The previous cache
//! store is consumed read-only and replaced only after a successful publish,
//! so a failed or interrupted run always leaves the last good store for the
//! next one.

pub mod assemble;
pub mod compile;
pub mod prebuild;
pub mod record;

pub use assemble::{ImageSpec, TlsPolicy};
pub use compile::Artifact;
pub use prebuild::DepSource;
pub use record::{RunRecord, RunStatus};

use crate::cache::{BlobStore, RestoreOutcome, Rotator, StoreKey, StorePaths};
use crate::context::BuildContext;
use crate::error::DrydockResult;
use crate::registry::{ImageRef, ImageTool, RegistryCredential};
use crate::tag::{self, RevisionLedger, TagSet};
use crate::toolchain::{AccelCache, Toolchain};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// Stages of one pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Restore,
    DepBuild,
    SrcBuild,
    Assemble,
    Tag,
    Publish,
    RotateCache,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Restore => "restore",
            Self::DepBuild => "dep-build",
            Self::SrcBuild => "src-build",
            Self::Assemble => "assemble",
            Self::Tag => "tag",
            Self::Publish => "publish",
            Self::RotateCache => "rotate-cache",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Everything the pipeline needs besides the per-run trigger inputs
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    /// Registry host images are pushed to
    pub registry_host: String,
    /// Environment variable holding the pre-authenticated registry credential
    pub credential_env: Option<String>,
    /// Binary target to build and ship
    pub binary: String,
    /// Dependency manifest file name under the build root
    pub manifest_name: String,
    /// Lockfile file name under the build root
    pub lockfile_name: String,
    /// Active and staging cache store locations
    pub store_paths: StorePaths,
    /// OS identifier used in blob store keys
    pub os_id: String,
    /// Optional compilation-acceleration cache
    pub accel: Option<AccelCache>,
    /// Runtime image contents
    pub image: ImageSpec,
    /// Whether to offer the registry's `latest` as a layer-cache hint
    pub remote_cache_hint: bool,
    /// Revision ledger location
    pub ledger_path: PathBuf,
}

/// Per-run trigger inputs, provided by the surrounding scheduler
#[derive(Debug, Clone)]
pub struct RunInputs {
    /// Full source revision id
    pub revision: String,
    /// Repository fully-qualified name (folded to the registry namespace)
    pub repository: String,
    /// Root of the source tree to build
    pub build_root: PathBuf,
    /// Trigger time; wall clock when absent
    pub trigger_time: Option<DateTime<Utc>>,
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub tags: TagSet,
    pub image_id: String,
    pub restore: RestoreOutcome,
    pub dep_source: DepSource,
    pub pushed: Vec<String>,
}

/// The pipeline runner, generic over its tool seams
pub struct Pipeline<'a> {
    toolchain: &'a dyn Toolchain,
    image_tool: &'a dyn ImageTool,
    blob: &'a dyn BlobStore,
    spec: PipelineSpec,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        toolchain: &'a dyn Toolchain,
        image_tool: &'a dyn ImageTool,
        blob: &'a dyn BlobStore,
        spec: PipelineSpec,
    ) -> Self {
        Self {
            toolchain,
            image_tool,
            blob,
            spec,
        }
    }

    /// Execute one run. `on_stage` fires as each stage is entered.
    ///
    /// Stages are strictly sequential; the first error aborts the run with
    /// nothing after the failure point executed.
    pub async fn execute(
        &self,
        inputs: &RunInputs,
        on_stage: &mut dyn FnMut(PipelineStage),
    ) -> DrydockResult<PipelineOutcome> {
        let short = tag::short_revision(&inputs.revision)?;
        let key = StoreKey::new(&self.spec.os_id, &short);
        let paths = self.spec.store_paths.clone();
        let rotator = Rotator::new(paths.clone(), self.blob);

        on_stage(PipelineStage::Restore);
        let restore = rotator.restore(&key).await?;
        rotator.prepare_staging()?;
        let ctx = BuildContext::discover(
            &inputs.build_root,
            &self.spec.manifest_name,
            &self.spec.lockfile_name,
        )?;
        info!("Store restore: {}", restore);

        on_stage(PipelineStage::DepBuild);
        let (_layer, dep_source) = prebuild::run(self.toolchain, &ctx, &paths).await?;

        on_stage(PipelineStage::SrcBuild);
        let artifact = compile::run(
            self.toolchain,
            &ctx,
            &paths,
            &self.spec.binary,
            self.spec.accel.as_ref(),
        )
        .await?;

        on_stage(PipelineStage::Assemble);
        let latest_ref = ImageRef::new(&self.spec.registry_host, &inputs.repository, tag::LATEST)?;
        let context_dir = paths.staging.join("image-ctx");
        let image_id = assemble::run(
            self.image_tool,
            &artifact,
            &self.spec.image,
            &latest_ref,
            self.spec.remote_cache_hint,
            &context_dir,
        )
        .await?;
        // Build-only scratch must not travel inside the rotated store
        let _ = std::fs::remove_dir_all(&context_dir);
        let _ = std::fs::remove_dir_all(paths.staging.join("prebuild"));

        on_stage(PipelineStage::Tag);
        let now = inputs.trigger_time.unwrap_or_else(Utc::now);
        let tags = TagSet::generate(now, &inputs.revision)?;
        let mut ledger = RevisionLedger::load(&self.spec.ledger_path).await?;
        ledger.record(&tags.revision, &inputs.revision).await?;

        on_stage(PipelineStage::Publish);
        if let Some(var) = &self.spec.credential_env {
            let credential = RegistryCredential::from_env(var)?;
            self.image_tool
                .login(&self.spec.registry_host, &credential)
                .await?;
        }
        let mut pushed = Vec::with_capacity(3);
        for t in tags.iter() {
            let reference = latest_ref.with_tag(t);
            self.image_tool.tag(&image_id, &reference).await?;
            self.image_tool.push(&reference).await?;
            pushed.push(reference.reference());
        }

        on_stage(PipelineStage::RotateCache);
        rotator.rotate(&key).await?;

        on_stage(PipelineStage::Done);
        info!("Published {} tags for {}", pushed.len(), short);
        Ok(PipelineOutcome {
            tags,
            image_id,
            restore,
            dep_source,
            pushed,
        })
    }
}
