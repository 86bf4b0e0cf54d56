//! Errors raised while releasing an artifact kind

use thiserror::Error;
use toolbelt_schema::{Platform, UnsupportedFormat};

use super::Stage;
use crate::config::ConfigError;
use crate::io::archive::ArchiveError;
use crate::io::download::FetchError;
use crate::io::store::StoreError;

/// Underlying cause of a failed stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A stage failure, tagged with where it happened.
///
/// `platform` is `None` for run-level stages such as resolving CI artifacts or
/// fetching the network's base config.
#[derive(Error, Debug)]
#[error("{stage} failed{}: {source}", on_platform(.platform))]
pub struct PipelineError {
    pub platform: Option<Platform>,
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

fn on_platform(platform: &Option<Platform>) -> String {
    platform.map(|p| format!(" for {p}")).unwrap_or_default()
}

/// Tag a stage result with its location.
pub(crate) trait StageResultExt<T> {
    fn at(self, platform: Platform, stage: Stage) -> Result<T, PipelineError>;
    fn at_run(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T, E: Into<StageError>> StageResultExt<T> for Result<T, E> {
    fn at(self, platform: Platform, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError {
            platform: Some(platform),
            stage,
            source: e.into(),
        })
    }

    fn at_run(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError {
            platform: None,
            stage,
            source: e.into(),
        })
    }
}
