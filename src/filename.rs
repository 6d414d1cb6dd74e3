//! Output filename helpers.

use std::sync::LazyLock;

use regex::Regex;

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"filename="(.+?)""#).expect("valid regex"));

static BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"filename=([^;\s]+)").expect("valid regex"));

/// Replaces every character outside `[A-Za-z0-9]` with `_` and lower-cases.
#[must_use]
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// File extension produced for a requested output format.
#[must_use]
pub fn extension_for(format: &str) -> &'static str {
    if format.eq_ignore_ascii_case("mp3") {
        "mp3"
    } else {
        "mp4"
    }
}

/// Builds the filename used when the service does not suggest one.
///
/// This is also the key the service uses for live progress events, so it
/// must be computed the same way on both ends.
#[must_use]
pub fn synthesize(title: Option<&str>, resolution: &str, format: &str) -> String {
    let stem = title.filter(|t| !t.trim().is_empty()).unwrap_or("download");
    format!(
        "{}_{}_{}.{}",
        sanitize(stem),
        sanitize(resolution),
        sanitize(format),
        extension_for(format)
    )
}

/// Extracts the filename from a `Content-Disposition` header value.
#[must_use]
pub fn from_disposition(header: &str) -> Option<String> {
    let caps = QUOTED_RE
        .captures(header)
        .or_else(|| BARE_RE.captures(header))?;
    let name = caps[1].trim();
    // Never let a server-provided name escape the output directory.
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    (!name.is_empty()).then(|| name.to_string())
}
