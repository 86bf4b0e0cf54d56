//! Release pipeline for Nine Chronicles client builds.
//!
//! Takes player builds from CI and launcher builds from the artifact bucket,
//! re-packages them per platform and publishes them under
//! `{prefix}{network}/v{version}/{kind}/{commit}/`.

pub mod config;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod reporter;
pub mod scratch;
pub mod settings;

pub use paths::*;
pub use pipeline::{Orchestrator, PipelineContext, ReleaseReport, ReleaseRequest};
pub use reporter::{NullReporter, Reporter};
pub use settings::Settings;

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("toolbelt/", env!("CARGO_PKG_VERSION"));
