//! Where player builds come from.
//!
//! CI uploads one artifact per platform (`Windows`, `OSX`, `Linux`) for each
//! commit. An [`ArtifactSource`] maps those artifact names to download URLs
//! and fetches them.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use toolbelt_schema::{CommitHash, Platform};
use tracing::debug;

use crate::Reporter;
use crate::io::download::{DownloadRequest, FetchError};
use crate::settings::Settings;

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Map of CI artifact key to download URL for every artifact built at `commit`.
    async fn resolve_artifact_urls(
        &self,
        commit: &CommitHash,
    ) -> Result<HashMap<String, String>, FetchError>;

    /// Download `url` to `dest`, returning the number of bytes written.
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        platform: Platform,
        reporter: &dyn Reporter,
    ) -> Result<u64, FetchError>;
}

#[derive(Debug, Deserialize)]
struct WorkflowRuns {
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    id: u64,
    artifacts_url: String,
}

#[derive(Debug, Deserialize)]
struct RunArtifacts {
    artifacts: Vec<RunArtifact>,
}

#[derive(Debug, Deserialize)]
struct RunArtifact {
    name: String,
    archive_download_url: String,
    #[serde(default)]
    expired: bool,
}

/// GitHub Actions artifacts of a repository.
#[derive(Debug, Clone)]
pub struct GithubArtifactSource {
    client: Client,
    api: String,
    repo: String,
    token: Option<String>,
}

impl GithubArtifactSource {
    pub fn new(client: Client, settings: &Settings) -> Self {
        Self {
            client,
            api: settings.github_api.trim_end_matches('/').to_string(),
            repo: settings.github_repo.clone(),
            token: settings.github_token.clone(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ArtifactSource for GithubArtifactSource {
    async fn resolve_artifact_urls(
        &self,
        commit: &CommitHash,
    ) -> Result<HashMap<String, String>, FetchError> {
        let runs_url = format!(
            "{}/repos/{}/actions/runs?head_sha={commit}&per_page=100",
            self.api, self.repo
        );
        let runs: WorkflowRuns = self.get_json(&runs_url).await?;
        if runs.workflow_runs.is_empty() {
            return Err(FetchError::NoRuns(commit.to_string()));
        }

        // Runs come newest first; the newest build of a name wins.
        let mut urls = HashMap::new();
        for run in &runs.workflow_runs {
            let listing: RunArtifacts = self
                .get_json(&format!("{}?per_page=100", run.artifacts_url))
                .await?;
            tracing::debug!(run = run.id, count = listing.artifacts.len(), "listed run artifacts");

            for artifact in listing.artifacts {
                if artifact.expired {
                    continue;
                }
                urls.entry(artifact.name)
                    .or_insert(artifact.archive_download_url);
            }
        }

        Ok(urls)
    }

    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        platform: Platform,
        reporter: &dyn Reporter,
    ) -> Result<u64, FetchError> {
        let downloaded = DownloadRequest::new(&self.client, url, dest, platform, reporter)
            .with_bearer_token(self.token.as_deref())
            .execute()
            .await?;
        debug!(
            %platform,
            bytes = downloaded.bytes,
            sha256 = %downloaded.sha256,
            "fetched CI artifact"
        );
        Ok(downloaded.bytes)
    }
}
