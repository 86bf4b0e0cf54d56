//! Release command

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use toolbelt_core::io::source::GithubArtifactSource;
use toolbelt_core::io::store::{S3Store, s3_client};
use toolbelt_core::{Orchestrator, PipelineContext, ReleaseRequest, Settings};
use toolbelt_schema::{Apv, ArtifactKind};

use crate::ReleaseArgs;
use crate::ui::{TracingReporter, table};

/// Publish `kind` for the commit in `args`.
///
/// Fails if the run aborts or any platform fails; a dry run succeeds once
/// every pre-publish step has.
pub async fn release(kind: ArtifactKind, args: ReleaseArgs, dry_run: bool, json: bool) -> Result<()> {
    let settings = settings(&args);
    let apv = build_apv(args.version, &args.apv, args.timestamp.clone())?;

    if let Some(channel) = &args.slack_channel {
        tracing::warn!(channel, "Slack notifications are not delivered by this tool");
    }

    let req = ReleaseRequest::new(kind, args.commit_hash, apv, args.network)
        .with_prefix(args.prefix)
        .with_platforms(args.platform)
        .with_signing(args.signing)
        .with_dry_run(dry_run);

    let client = reqwest::Client::builder()
        .user_agent(crate::USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;
    let s3 = s3_client(&settings).await;

    let ctx = PipelineContext {
        source: Arc::new(GithubArtifactSource::new(client, &settings)),
        artifact_store: Arc::new(S3Store::new(s3.clone(), &settings.artifact_bucket)),
        release_store: Arc::new(S3Store::new(s3, &settings.release_bucket)),
        reporter: Arc::new(TracingReporter::default()),
        public_base_url: settings.public_base_url.clone(),
    };

    let report = Orchestrator::new(ctx)
        .run(&req)
        .await
        .with_context(|| format!("{kind} release aborted"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", table::summary(&report));
    }

    let failed = report.failures().count();
    if failed > 0 {
        bail!(
            "{failed} of {} platforms failed to release",
            report.outcomes.len()
        );
    }
    Ok(())
}

fn settings(args: &ReleaseArgs) -> Settings {
    let mut settings = Settings::from_env();
    if let Some(bucket) = &args.release_bucket {
        settings.release_bucket.clone_from(bucket);
    }
    if let Some(bucket) = &args.artifact_bucket {
        settings.artifact_bucket.clone_from(bucket);
    }
    settings
}

/// Assemble the APV from the command line.
///
/// When the raw token leads with a version number it must agree with
/// `version`. Without `--timestamp` the APV carries none, and launcher
/// releases to networks other than `main` fail before publishing.
fn build_apv(version: u64, raw: &str, timestamp: Option<String>) -> Result<Apv> {
    if raw.trim().is_empty() {
        bail!("APV token must not be empty");
    }
    if let Some(token_version) = Apv::token_version(raw).filter(|v| *v != version) {
        bail!("APV token is for version {token_version}, but version {version} was requested");
    }

    let apv = Apv::new(version, raw);
    Ok(match timestamp {
        Some(timestamp) => apv.with_timestamp(timestamp),
        None => apv,
    })
}
