//! Release pipeline: fetch, extract, patch, recompress, publish.
//!
//! A release request names an [`ArtifactKind`]; the [`Orchestrator`] hands it
//! to the matching [`Pipeline`] implementation, which walks the requested
//! platforms one at a time. Each platform iteration works inside its own
//! [`Scratch`](crate::scratch::Scratch) directory.

mod error;
mod launcher;
mod player;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use toolbelt_schema::{Apv, ArtifactKind, CommitHash, Network, Platform};

pub use error::{PipelineError, StageError};
pub use launcher::LauncherPipeline;
pub use player::PlayerPipeline;

use crate::Reporter;
use crate::io::source::ArtifactSource;
use crate::io::store::ObjectStore;
use crate::paths;
use error::StageResultExt;

/// A step of a platform iteration, used to tag progress and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Resolve,
    Fetch,
    Extract,
    Relocate,
    Configure,
    Compress,
    Publish,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Relocate => "relocate",
            Self::Configure => "configure",
            Self::Compress => "compress",
            Self::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything identifying one release run.
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub kind: ArtifactKind,
    pub commit: CommitHash,
    pub apv: Apv,
    pub network: Network,
    /// Prepended verbatim to every published key.
    pub prefix: String,
    /// Platforms to release, in order.
    pub platforms: Vec<Platform>,
    /// Accepted for compatibility; no signing step exists.
    pub signing: bool,
    /// Run every local step but publish nothing.
    pub dry_run: bool,
}

impl ReleaseRequest {
    pub fn new(kind: ArtifactKind, commit: CommitHash, apv: Apv, network: Network) -> Self {
        Self {
            kind,
            commit,
            apv,
            network,
            prefix: String::new(),
            platforms: Platform::ALL.to_vec(),
            signing: false,
            dry_run: false,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Restrict the run to `platforms`. An empty list means all of them.
    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.platforms = if platforms.is_empty() {
            Platform::ALL.to_vec()
        } else {
            platforms
        };
        self
    }

    pub fn with_signing(mut self, signing: bool) -> Self {
        self.signing = signing;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Release directory for this request.
    pub fn release_path(&self) -> String {
        paths::release_path(
            &self.prefix,
            &self.network,
            self.apv.version(),
            self.kind,
            &self.commit,
        )
    }

    /// Destination key of `platform`'s archive.
    pub fn release_key(&self, platform: Platform) -> String {
        paths::release_key(
            &self.prefix,
            &self.network,
            self.apv.version(),
            self.kind,
            &self.commit,
            platform,
        )
    }
}

/// How a platform iteration ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OutcomeStatus {
    Published,
    /// Dry run: every local step succeeded, nothing was uploaded.
    Skipped,
    Failed { stage: Stage, reason: String },
}

/// Per-platform result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformOutcome {
    pub platform: Platform,
    /// Destination key of the archive.
    pub key: String,
    /// Public download URL of `key`.
    pub url: String,
    /// Size of the final archive, when one was produced.
    pub size: Option<u64>,
    /// Hex SHA-256 of the final archive, when one was produced.
    pub sha256: Option<String>,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl PlatformOutcome {
    fn new(ctx: &PipelineContext, req: &ReleaseRequest, platform: Platform) -> Self {
        let key = req.release_key(platform);
        Self {
            platform,
            url: paths::download_url(&ctx.public_base_url, &key),
            key,
            size: None,
            sha256: None,
            status: OutcomeStatus::Skipped,
        }
    }

    fn failed(
        ctx: &PipelineContext,
        req: &ReleaseRequest,
        platform: Platform,
        stage: Stage,
        reason: String,
    ) -> Self {
        Self {
            status: OutcomeStatus::Failed { stage, reason },
            ..Self::new(ctx, req, platform)
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }
}

/// Result of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseReport {
    pub kind: ArtifactKind,
    pub release_path: String,
    pub dry_run: bool,
    pub outcomes: Vec<PlatformOutcome>,
    /// Patched config baked into launcher archives, published or not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// What a pipeline hands back to the orchestrator.
#[derive(Debug, Default)]
pub struct PipelineRun {
    pub outcomes: Vec<PlatformOutcome>,
    pub config: Option<Value>,
}

impl ReleaseReport {
    pub fn failures(&self) -> impl Iterator<Item = &PlatformOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Collaborators a pipeline runs against.
#[derive(Clone)]
pub struct PipelineContext {
    /// CI artifacts (player builds).
    pub source: Arc<dyn ArtifactSource>,
    /// Pre-built launcher archives.
    pub artifact_store: Arc<dyn ObjectStore>,
    /// Publishing destination.
    pub release_store: Arc<dyn ObjectStore>,
    pub reporter: Arc<dyn Reporter>,
    /// Base URL the release store is served under.
    pub public_base_url: String,
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("artifact_bucket", &self.artifact_store.bucket())
            .field("release_bucket", &self.release_store.bucket())
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

/// Release procedure for one artifact kind.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Run every requested platform.
    ///
    /// An `Err` aborts the run; failures a pipeline tolerates are reported as
    /// [`OutcomeStatus::Failed`] entries instead.
    async fn run(
        &self,
        ctx: &PipelineContext,
        req: &ReleaseRequest,
    ) -> Result<PipelineRun, PipelineError>;
}

/// Entry point: dispatches a request to its kind's pipeline.
#[derive(Debug)]
pub struct Orchestrator {
    ctx: PipelineContext,
}

impl Orchestrator {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub fn pipeline(kind: ArtifactKind) -> &'static dyn Pipeline {
        match kind {
            ArtifactKind::Player => &PlayerPipeline,
            ArtifactKind::Launcher => &LauncherPipeline,
        }
    }

    pub async fn run(&self, req: &ReleaseRequest) -> Result<ReleaseReport, PipelineError> {
        let release_path = req.release_path();
        tracing::info!(
            kind = %req.kind,
            network = %req.network,
            commit = %req.commit,
            apv_version = req.apv.version(),
            release_path = %release_path,
            dry_run = req.dry_run,
            "starting release"
        );

        if req.signing {
            tracing::warn!("--signing was requested but no signing step exists; artifacts are published unsigned");
            self.ctx
                .reporter
                .warning("signing is not implemented; publishing unsigned artifacts");
        }

        let PipelineRun { outcomes, config } =
            Self::pipeline(req.kind).run(&self.ctx, req).await?;

        Ok(ReleaseReport {
            kind: req.kind,
            release_path,
            dry_run: req.dry_run,
            outcomes,
            config,
        })
    }
}

/// Run blocking filesystem work off the async runtime.
async fn blocking<T, E>(f: impl FnOnce() -> Result<T, E> + Send + 'static) -> Result<T, StageError>
where
    T: Send + 'static,
    E: Into<StageError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?.map_err(Into::into)
}

/// Size and hex SHA-256 of the file at `path`.
fn file_digest(path: &Path) -> std::io::Result<(u64, String)> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let size = std::io::copy(&mut file, &mut hasher)?;
    Ok((size, hex::encode(hasher.finalize())))
}

/// Digest the final archive, then upload it unless this is a dry run.
///
/// Returns the outcome for `platform`; `reporter.done`/`skipped` is left to the
/// caller since launchers publish a second file afterwards.
async fn publish_archive(
    ctx: &PipelineContext,
    req: &ReleaseRequest,
    platform: Platform,
    archive: PathBuf,
) -> Result<PlatformOutcome, PipelineError> {
    let mut outcome = PlatformOutcome::new(ctx, req, platform);

    let path = archive.clone();
    let (size, sha256) = blocking(move || file_digest(&path))
        .await
        .at(platform, Stage::Publish)?;
    outcome.size = Some(size);
    outcome.sha256 = Some(sha256);

    if req.dry_run {
        tracing::info!(%platform, key = %outcome.key, size, "dry run: skipping upload");
        return Ok(outcome);
    }

    ctx.reporter.stage(platform, Stage::Publish);
    ctx.release_store
        .upload(&archive, &outcome.key)
        .await
        .at(platform, Stage::Publish)?;
    tracing::info!(%platform, key = %outcome.key, size, "uploaded archive");

    outcome.status = OutcomeStatus::Published;
    Ok(outcome)
}

fn report_finished(ctx: &PipelineContext, outcome: &PlatformOutcome) {
    match &outcome.status {
        OutcomeStatus::Published => ctx.reporter.done(outcome.platform, &outcome.url),
        OutcomeStatus::Skipped => ctx.reporter.skipped(outcome.platform, &outcome.key),
        OutcomeStatus::Failed { reason, .. } => ctx.reporter.failed(outcome.platform, reason),
    }
}
