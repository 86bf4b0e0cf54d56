//! Player release: republish CI builds under the release layout.
//!
//! CI wraps each platform's distribution archive in a workflow artifact zip
//! (`Windows.zip` inside artifact `Windows`, `macOS.tar.gz` inside `OSX`, ...).
//! The inner archive is published as-is.
//!
//! Platforms fail independently: a broken platform is recorded and the rest
//! still publish.

use std::collections::HashMap;
use std::io;

use async_trait::async_trait;
use toolbelt_schema::Platform;
use tracing::{error, info};

use super::error::StageResultExt;
use super::{
    Pipeline, PipelineContext, PipelineError, PipelineRun, PlatformOutcome, ReleaseRequest, Stage,
    blocking, publish_archive, report_finished,
};
use crate::io::archive;
use crate::io::download::FetchError;
use crate::scratch::Scratch;

#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerPipeline;

#[async_trait]
impl Pipeline for PlayerPipeline {
    async fn run(
        &self,
        ctx: &PipelineContext,
        req: &ReleaseRequest,
    ) -> Result<PipelineRun, PipelineError> {
        ctx.reporter.section("Player release");

        let urls = match ctx.source.resolve_artifact_urls(&req.commit).await {
            Ok(urls) => urls,
            Err(err) => {
                let reason = err.to_string();
                error!(commit = %req.commit, error = %reason, "could not resolve CI artifacts");
                let outcomes: Vec<_> = req
                    .platforms
                    .iter()
                    .map(|&platform| {
                        PlatformOutcome::failed(ctx, req, platform, Stage::Resolve, reason.clone())
                    })
                    .collect();
                outcomes.iter().for_each(|o| report_finished(ctx, o));
                return Ok(PipelineRun {
                    outcomes,
                    config: None,
                });
            }
        };

        let mut outcomes = Vec::with_capacity(req.platforms.len());
        for &platform in &req.platforms {
            let outcome = match release_platform(ctx, req, &urls, platform).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(%platform, stage = %err.stage, error = %err.source, "player release failed");
                    PlatformOutcome::failed(ctx, req, platform, err.stage, err.source.to_string())
                }
            };
            report_finished(ctx, &outcome);
            outcomes.push(outcome);
        }

        Ok(PipelineRun {
            outcomes,
            config: None,
        })
    }
}

async fn release_platform(
    ctx: &PipelineContext,
    req: &ReleaseRequest,
    urls: &HashMap<String, String>,
    platform: Platform,
) -> Result<PlatformOutcome, PipelineError> {
    let spec = platform.spec();

    ctx.reporter.stage(platform, Stage::Resolve);
    let url = urls
        .get(spec.ci_artifact_key)
        .ok_or_else(|| FetchError::MissingArtifact {
            key: spec.ci_artifact_key.to_string(),
            commit: req.commit.to_string(),
        })
        .at(platform, Stage::Resolve)?;

    let scratch = Scratch::for_platform(platform).at(platform, Stage::Fetch)?;

    ctx.reporter.stage(platform, Stage::Fetch);
    let download = scratch.join(format!("ci/{}.zip", spec.ci_artifact_key));
    let bytes = ctx
        .source
        .fetch(url, &download, platform, ctx.reporter.as_ref())
        .await
        .at(platform, Stage::Fetch)?;
    info!(%platform, bytes, "downloaded CI artifact");

    ctx.reporter.stage(platform, Stage::Extract);
    let unpacked = scratch.join(spec.ci_artifact_key);
    let dest = unpacked.clone();
    let format = spec.player_source_format;
    blocking(move || archive::extract(&download, &dest, format))
        .await
        .at(platform, Stage::Extract)?;

    ctx.reporter.stage(platform, Stage::Relocate);
    let inner = unpacked.join(spec.dist_file_name);
    if !inner.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "CI artifact '{}' does not contain {}",
                spec.ci_artifact_key, spec.dist_file_name
            ),
        ))
        .at(platform, Stage::Relocate);
    }
    let artifact = scratch.join(spec.dist_file_name);
    tokio::fs::rename(&inner, &artifact)
        .await
        .at(platform, Stage::Relocate)?;

    publish_archive(ctx, req, platform, artifact).await
}
