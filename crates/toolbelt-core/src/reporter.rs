//! Reporter trait for dependency injection
//!
//! This trait allows the release pipeline to report progress and status
//! without being coupled to a specific terminal or logging implementation.

use toolbelt_schema::Platform;

use crate::pipeline::Stage;

pub trait Reporter: Send + Sync {
    /// Indicates a new section of the run has started (e.g. "Player release").
    fn section(&self, title: &str);

    /// A platform entered a pipeline stage.
    fn stage(&self, platform: Platform, stage: Stage);

    /// Updates the progress of an artifact download.
    fn downloading(&self, platform: Platform, current: u64, total: Option<u64>);

    /// A platform's artifact was published.
    fn done(&self, platform: Platform, detail: &str);

    /// A platform finished every local step but publishing was skipped.
    fn skipped(&self, platform: Platform, detail: &str);

    /// A platform's pipeline failed with a specific reason.
    fn failed(&self, platform: Platform, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn stage(&self, platform: Platform, stage: Stage) {
        (**self).stage(platform, stage);
    }
    fn downloading(&self, platform: Platform, current: u64, total: Option<u64>) {
        (**self).downloading(platform, current, total);
    }
    fn done(&self, platform: Platform, detail: &str) {
        (**self).done(platform, detail);
    }
    fn skipped(&self, platform: Platform, detail: &str) {
        (**self).skipped(platform, detail);
    }
    fn failed(&self, platform: Platform, reason: &str) {
        (**self).failed(platform, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn stage(&self, _: Platform, _: Stage) {}
    fn downloading(&self, _: Platform, _: u64, _: Option<u64>) {}
    fn done(&self, _: Platform, _: &str) {}
    fn skipped(&self, _: Platform, _: &str) {}
    fn failed(&self, _: Platform, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}
