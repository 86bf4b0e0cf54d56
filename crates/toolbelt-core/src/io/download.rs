//! Streaming HTTP download with progress reporting.
//!
//! The body is streamed straight to disk while a SHA-256 digest is computed
//! alongside, so large client archives never sit in memory.

use std::io::Write;
use std::path::Path;

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use toolbelt_schema::Platform;

use crate::Reporter;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("No artifact named '{key}' was built for commit {commit}")]
    MissingArtifact { key: String, commit: String },

    #[error("No workflow runs found for commit {0}")]
    NoRuns(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub bytes: u64,
    pub sha256: String,
}

/// Request for a download operation
pub struct DownloadRequest<'a> {
    pub client: &'a Client,
    pub url: &'a str,
    pub dest: &'a Path,
    pub platform: Platform,
    pub reporter: &'a dyn Reporter,
    pub bearer_token: Option<&'a str>,
}

impl<'a> DownloadRequest<'a> {
    pub fn new(
        client: &'a Client,
        url: &'a str,
        dest: &'a Path,
        platform: Platform,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            client,
            url,
            dest,
            platform,
            reporter,
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: Option<&'a str>) -> Self {
        self.bearer_token = token;
        self
    }

    /// Execute the download, truncating any existing file at `dest`.
    pub async fn execute(self) -> Result<Downloaded, FetchError> {
        let mut request = self
            .client
            .get(self.url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT);
        if let Some(token) = self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.to_string(),
                status: status.as_u16(),
            });
        }

        let total_size = response.content_length();
        self.reporter.downloading(self.platform, 0, total_size);

        if let Some(parent) = self.dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = File::create(self.dest).await?;
        let mut stream = response.bytes_stream();
        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            hasher.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            self.reporter
                .downloading(self.platform, downloaded, total_size);
        }

        file.flush().await?;
        tracing::debug!(url = self.url, bytes = downloaded, "download complete");

        Ok(Downloaded {
            bytes: downloaded,
            sha256: hex::encode(hasher.finalize()),
        })
    }
}
