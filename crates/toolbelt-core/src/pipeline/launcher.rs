//! Launcher release: re-configure a pre-built launcher for a network.
//!
//! The launcher is built once per commit and stored in the artifact bucket.
//! Releasing it for a network means baking that network's `config.json` into
//! the archive, so each platform is unpacked, patched and packed again.
//!
//! Any failure aborts the run: a launcher published for some platforms but
//! not others would hand players mismatched configs.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use toolbelt_schema::Platform;
use tracing::{debug, info};

use super::error::StageResultExt;
use super::{
    Pipeline, PipelineContext, PipelineError, PipelineRun, PlatformOutcome, ReleaseRequest, Stage,
    blocking, publish_archive, report_finished,
};
use crate::config;
use crate::io::archive;
use crate::paths::{
    CONFIG_FILE_NAME, SHARED_LAUNCHER_CONFIG_KEY, launcher_artifact_key, main_config_key,
    network_config_key,
};
use crate::scratch::Scratch;

#[derive(Debug, Clone, Copy, Default)]
pub struct LauncherPipeline;

#[async_trait]
impl Pipeline for LauncherPipeline {
    async fn run(
        &self,
        ctx: &PipelineContext,
        req: &ReleaseRequest,
    ) -> Result<PipelineRun, PipelineError> {
        ctx.reporter.section("Launcher release");

        let patched = patched_base_config(ctx, req).await?;

        let mut shared_config_copied = false;
        let mut outcomes = Vec::with_capacity(req.platforms.len());
        for &platform in &req.platforms {
            let outcome =
                match release_platform(ctx, req, platform, &patched, &mut shared_config_copied)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        ctx.reporter.failed(platform, &err.source.to_string());
                        return Err(err);
                    }
                };
            report_finished(ctx, &outcome);
            outcomes.push(outcome);
        }

        Ok(PipelineRun {
            outcomes,
            config: Some(patched),
        })
    }
}

/// Fetch `{network}/config.json` from the release store and patch it.
///
/// The base config is read from the unprefixed network location; only the
/// published copy is written under the request prefix.
async fn patched_base_config(
    ctx: &PipelineContext,
    req: &ReleaseRequest,
) -> Result<Value, PipelineError> {
    let scratch = Scratch::for_run().at_run(Stage::Configure)?;
    let key = network_config_key("", &req.network);
    let path = scratch.join(CONFIG_FILE_NAME);

    ctx.reporter.info(&format!("Fetching base config {key}"));
    ctx.release_store
        .download(&key, &path)
        .await
        .at_run(Stage::Configure)?;

    let doc = config::read_config(&path).at_run(Stage::Configure)?;
    let patched = config::patch(doc, &req.apv, &req.network).at_run(Stage::Configure)?;
    let store_dir = patched
        .get(config::BLOCKCHAIN_STORE_DIR_NAME)
        .and_then(Value::as_str);
    info!(
        network = %req.network,
        apv = req.apv.raw(),
        store_dir = ?store_dir,
        "patched launcher config"
    );
    Ok(patched)
}

async fn release_platform(
    ctx: &PipelineContext,
    req: &ReleaseRequest,
    platform: Platform,
    patched: &Value,
    shared_config_copied: &mut bool,
) -> Result<PlatformOutcome, PipelineError> {
    let spec = platform.spec();
    let scratch = Scratch::for_platform(platform).at(platform, Stage::Fetch)?;

    ctx.reporter.stage(platform, Stage::Fetch);
    let source_key = launcher_artifact_key(&req.commit, platform);
    let archive_path = scratch.join(spec.dist_file_name);
    let bytes = ctx
        .artifact_store
        .download(&source_key, &archive_path)
        .await
        .at(platform, Stage::Fetch)?;
    info!(%platform, key = %source_key, bytes, "downloaded launcher build");

    ctx.reporter.stage(platform, Stage::Extract);
    let tree = scratch.join(spec.os_name);
    let (src, dest) = (archive_path.clone(), tree.clone());
    let format = spec.launcher_source_format;
    let files = blocking(move || archive::extract(&src, &dest, format))
        .await
        .at(platform, Stage::Extract)?;
    debug!(%platform, files = files.len(), "extracted launcher");

    ctx.reporter.stage(platform, Stage::Configure);
    let in_tree = scratch.join(spec.launcher_config_path);
    let standalone = scratch.join(CONFIG_FILE_NAME);
    let doc = patched.clone();
    let (tree_config, standalone_config) = (in_tree.clone(), standalone.clone());
    blocking(move || {
        config::overwrite_config(&tree_config, &doc)?;
        config::write_config(&standalone_config, &doc)
    })
    .await
    .at(platform, Stage::Configure)?;
    debug!(%platform, path = %in_tree.display(), "wrote launcher config");

    ctx.reporter.stage(platform, Stage::Compress);
    let (src, dest) = (tree, archive_path.clone());
    let format = spec.dist_format;
    let written = blocking(move || archive::compress(&src, &dest, format))
        .await
        .at(platform, Stage::Compress)?;
    debug!(%platform, files = written, "recompressed launcher");

    if req.network.is_main() && !*shared_config_copied && !req.dry_run {
        copy_shared_config(ctx, req, platform).await?;
        *shared_config_copied = true;
    }

    let outcome = publish_archive(ctx, req, platform, archive_path).await?;
    publish_config(ctx, req, platform, standalone).await?;
    Ok(outcome)
}

/// `main` serves the shared launcher config; the network config upload that
/// follows overwrites it with the patched one.
async fn copy_shared_config(
    ctx: &PipelineContext,
    req: &ReleaseRequest,
    platform: Platform,
) -> Result<(), PipelineError> {
    let dst = main_config_key(&req.prefix);
    ctx.release_store
        .copy(SHARED_LAUNCHER_CONFIG_KEY, &dst)
        .await
        .at(platform, Stage::Publish)?;
    info!(src = SHARED_LAUNCHER_CONFIG_KEY, dst = %dst, "copied shared launcher config");
    Ok(())
}

async fn publish_config(
    ctx: &PipelineContext,
    req: &ReleaseRequest,
    platform: Platform,
    standalone: PathBuf,
) -> Result<(), PipelineError> {
    let key = network_config_key(&req.prefix, &req.network);
    if req.dry_run {
        info!(%platform, key = %key, "dry run: skipping config upload");
        return Ok(());
    }

    ctx.release_store
        .upload(&standalone, &key)
        .await
        .at(platform, Stage::Publish)?;
    info!(%platform, key = %key, "uploaded launcher config");
    Ok(())
}
