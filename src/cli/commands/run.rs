//! Run command - execute the full build-and-publish pipeline

use crate::cache::{FsBlobStore, StorePaths};
use crate::cli::args::RunArgs;
use crate::config::{Config, ConfigManager};
use crate::error::{DrydockError, DrydockResult};
use crate::pipeline::{
    DepSource, ImageSpec, Pipeline, PipelineSpec, PipelineStage, RunInputs, RunRecord, RunStatus,
    TlsPolicy,
};
use crate::registry::{ImageTool, PodmanTool};
use crate::toolchain::{AccelCache, CargoToolchain, Toolchain};
use console::style;
use indicatif::ProgressBar;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> DrydockResult<()> {
    let pb = create_progress_bar("Preparing pipeline...");

    let toolchain = CargoToolchain::new();
    let image_tool = PodmanTool::new();

    if !toolchain.is_available().await? {
        return Err(DrydockError::ToolNotFound {
            name: "cargo".to_string(),
            hint: "Install a Rust toolchain".to_string(),
        });
    }
    if !image_tool.is_available().await? {
        return Err(DrydockError::ToolNotFound {
            name: "podman".to_string(),
            hint: "Install podman 4.x or newer".to_string(),
        });
    }

    let build_root = resolve_build_root(&args)?;
    debug!("Build root: {}", build_root.display());

    let repository = args
        .repo
        .clone()
        .or_else(|| config.registry.repository.clone())
        .ok_or_else(|| {
            DrydockError::User(
                "No repository given. Pass --repo or set [registry].repository".to_string(),
            )
        })?;

    let spec = build_pipeline_spec(config, &args, &repository)?;
    let blob = FsBlobStore::new(
        config
            .cache
            .blob_dir
            .clone()
            .unwrap_or_else(ConfigManager::default_blob_store),
    );
    let pipeline = Pipeline::new(&toolchain, &image_tool, &blob, spec);

    let mut record = RunRecord::new(args.revision.clone(), repository.clone());
    record.save().await?;

    let inputs = RunInputs {
        revision: args.revision.clone(),
        repository,
        build_root,
        trigger_time: None,
    };

    let mut last_stage = PipelineStage::Restore;
    let result = pipeline
        .execute(&inputs, &mut |stage| {
            last_stage = stage;
            pb.set_message(stage.to_string());
        })
        .await;
    pb.finish_and_clear();

    match result {
        Ok(outcome) => {
            record.stage = PipelineStage::Done.to_string();
            record.tags = Some(outcome.tags.clone());
            record.finish(RunStatus::Done);
            record.save().await?;

            println!(
                "{} Published {} ({})",
                style("✓").green(),
                style(&outcome.tags.revision).cyan(),
                &outcome.image_id[..12.min(outcome.image_id.len())]
            );
            for reference in &outcome.pushed {
                println!("  {}", reference);
            }
            let deps = match outcome.dep_source {
                DepSource::Reused => "reused",
                DepSource::Built => "built",
            };
            println!("  cache: {} restore, dependencies {}", outcome.restore, deps);
            Ok(())
        }
        Err(e) => {
            record.stage = last_stage.to_string();
            record.finish(RunStatus::Failed);
            record.save().await?;
            Err(e)
        }
    }
}

fn resolve_build_root(args: &RunArgs) -> DrydockResult<PathBuf> {
    if let Some(ref path) = args.build_root {
        return path
            .canonicalize()
            .map_err(|e| DrydockError::io(format!("resolving build root {}", path.display()), e));
    }
    env::current_dir().map_err(|e| DrydockError::io("getting current directory", e))
}

fn build_pipeline_spec(
    config: &Config,
    args: &RunArgs,
    repository: &str,
) -> DrydockResult<PipelineSpec> {
    let store_paths = StorePaths::new(
        config
            .cache
            .active_dir
            .clone()
            .unwrap_or_else(ConfigManager::default_active_store),
        config
            .cache
            .staging_dir
            .clone()
            .unwrap_or_else(ConfigManager::default_staging_store),
    )?;

    let binary = args
        .binary
        .clone()
        .or_else(|| config.build.binary.clone())
        .unwrap_or_else(|| {
            repository
                .rsplit('/')
                .next()
                .unwrap_or(repository)
                .to_ascii_lowercase()
        });

    let accel = config.build.accel.enabled.then(|| AccelCache {
        wrapper: config.build.accel.wrapper.clone(),
        dir: config
            .build
            .accel
            .dir
            .clone()
            .unwrap_or_else(|| ConfigManager::state_dir().join("accel")),
    });

    Ok(PipelineSpec {
        registry_host: config.registry.host.clone(),
        credential_env: config.registry.credential_env.clone(),
        binary,
        manifest_name: config.build.manifest.clone(),
        lockfile_name: config.build.lockfile.clone(),
        store_paths,
        os_id: config
            .cache
            .os_id
            .clone()
            .unwrap_or_else(|| env::consts::OS.to_string()),
        accel,
        image: ImageSpec {
            base_image: config.image.base.clone(),
            packages: config.image.packages.clone(),
            package_install: config.image.package_install.clone(),
            tls: TlsPolicy {
                min_protocol: config.image.tls_min_protocol.clone(),
                cipher_string: config.image.tls_ciphers.clone(),
            },
        },
        remote_cache_hint: config.registry.remote_cache_hint && !args.no_remote_cache,
        ledger_path: ConfigManager::ledger_path(),
    })
}

fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}
