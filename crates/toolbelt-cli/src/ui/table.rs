//! End-of-run summary table

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use toolbelt_core::ReleaseReport;
use toolbelt_core::pipeline::{OutcomeStatus, PlatformOutcome};

use super::progress::format_size;

/// Render one row per platform: status, size, digest and destination.
pub fn summary(report: &ReleaseReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Platform", "Status", "Size", "SHA-256", "Destination"]);

    for outcome in &report.outcomes {
        table.add_row(vec![
            outcome.platform.to_string(),
            status_label(outcome),
            outcome.size.map(format_size).unwrap_or_default(),
            outcome
                .sha256
                .as_deref()
                .map(|h| h.chars().take(12).collect::<String>())
                .unwrap_or_default(),
            destination(outcome),
        ]);
    }

    table
}

fn status_label(outcome: &PlatformOutcome) -> String {
    match &outcome.status {
        OutcomeStatus::Published => "published".to_string(),
        OutcomeStatus::Skipped => "skipped (dry run)".to_string(),
        OutcomeStatus::Failed { stage, .. } => format!("failed at {stage}"),
    }
}

fn destination(outcome: &PlatformOutcome) -> String {
    match &outcome.status {
        OutcomeStatus::Published => outcome.url.clone(),
        OutcomeStatus::Skipped => outcome.key.clone(),
        OutcomeStatus::Failed { reason, .. } => reason.clone(),
    }
}
