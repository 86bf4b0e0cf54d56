//! Progress formatting

/// Format download progress (percentage and size)
pub fn format_download_progress(current: u64, total: u64) -> String {
    let pct = percent(current, total);
    let bar = format_progress_bar(current, total, 24);
    let size_str = format_size(total);
    format!("{bar}  {pct:>3}%  {size_str}")
}

/// Completed share of `total`, clamped to 100. Zero when `total` is unknown.
pub fn percent(current: u64, total: u64) -> u64 {
    if total > 0 {
        (current * 100 / total).min(100)
    } else {
        0
    }
}

/// Format a progress bar using ▓ (filled) and ░ (empty).
pub fn format_progress_bar(current: u64, total: u64, width: usize) -> String {
    let filled = if total > 0 {
        ((current.min(total) as f64 / total as f64) * width as f64).round() as usize
    } else {
        0
    };
    let empty = width.saturating_sub(filled);
    format!("{}{}", "▓".repeat(filled), "░".repeat(empty))
}

/// Format bytes for human-readable display
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else if kb >= 1024.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}
