//! Human-readable text for notices and summaries.

use std::time::Duration;

/// Links in notices are cut to this many characters.
pub const LINK_PREVIEW_CHARS: usize = 30;

/// First [`LINK_PREVIEW_CHARS`] characters of `link` followed by `...`.
#[must_use]
pub fn link_preview(link: &str) -> String {
    let head: String = link.chars().take(LINK_PREVIEW_CHARS).collect();
    format!("{head}...")
}

/// Formats a byte count with a binary unit (B, KB, MB, GB).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [(&str, u64); 3] = [("GB", 1 << 30), ("MB", 1 << 20), ("KB", 1 << 10)];

    UNITS
        .iter()
        .find(|(_, size)| bytes >= *size)
        .map_or_else(
            || format!("{bytes} B"),
            |(unit, size)| format!("{:.2} {unit}", bytes as f64 / *size as f64),
        )
}

/// Formats a duration as "5.0s", "1m 05s" or "1h 01m 05s".
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        3600.. => format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60),
        60.. => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}.{:01}s", secs, d.subsec_millis() / 100),
    }
}
