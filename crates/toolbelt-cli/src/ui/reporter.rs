//! Pipeline progress rendered as log lines

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use toolbelt_core::Reporter;
use toolbelt_core::pipeline::Stage;
use toolbelt_schema::Platform;
use tracing::{debug, error, info, warn};

use super::progress::{format_download_progress, format_size, percent};

/// Download progress is logged at most once per quarter of the file.
const PROGRESS_STEP: u64 = 25;

/// [`Reporter`] that emits `tracing` events.
#[derive(Debug, Default)]
pub struct TracingReporter {
    logged_steps: Mutex<HashMap<Platform, u64>>,
}

impl TracingReporter {
    /// Whether this update crosses into a progress step not yet logged.
    fn crosses_step(&self, platform: Platform, current: u64, total: u64) -> bool {
        let step = percent(current, total) / PROGRESS_STEP;
        let mut logged = self
            .logged_steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if logged.get(&platform).is_some_and(|last| *last >= step) {
            return false;
        }
        logged.insert(platform, step);
        true
    }

    fn reset(&self, platform: Platform) {
        self.logged_steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&platform);
    }
}

impl Reporter for TracingReporter {
    fn section(&self, title: &str) {
        info!("── {title} ──");
    }

    fn stage(&self, platform: Platform, stage: Stage) {
        if stage == Stage::Fetch {
            self.reset(platform);
        }
        info!(%platform, %stage, "{stage}");
    }

    fn downloading(&self, platform: Platform, current: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => {
                if self.crosses_step(platform, current, total) {
                    info!(%platform, "{}", format_download_progress(current, total));
                }
            }
            _ => debug!(%platform, "downloaded {}", format_size(current)),
        }
    }

    fn done(&self, platform: Platform, detail: &str) {
        info!(%platform, "published {detail}");
    }

    fn skipped(&self, platform: Platform, detail: &str) {
        info!(%platform, "dry run, not published: {detail}");
    }

    fn failed(&self, platform: Platform, reason: &str) {
        error!(%platform, "{reason}");
    }

    fn info(&self, msg: &str) {
        info!("{msg}");
    }

    fn warning(&self, msg: &str) {
        warn!("{msg}");
    }
}
