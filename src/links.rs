//! Splitting pasted text into individual links.

use crate::error::{Error, Result};

/// Message shown when a batch submission contains no links.
pub const EMPTY_LINKS_MESSAGE: &str = "Please paste at least one link";

/// Message shown when the playlist field is blank.
pub const EMPTY_PLAYLIST_MESSAGE: &str = "Please paste a playlist link";

/// Splits raw multi-line input into trimmed, non-empty links.
///
/// Order is preserved and duplicates are kept: pasting the same link twice
/// produces two sessions.
#[must_use]
pub fn parse_links(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Like [`parse_links`], but treats an empty result as a user error.
///
/// # Errors
///
/// Returns [`Error::UserInput`] when the input has no non-blank lines.
pub fn require_links(input: &str) -> Result<Vec<String>> {
    let links = parse_links(input);
    if links.is_empty() {
        return Err(Error::UserInput(EMPTY_LINKS_MESSAGE.to_string()));
    }
    Ok(links)
}

/// Validates a single playlist link.
///
/// # Errors
///
/// Returns [`Error::UserInput`] when the link is blank.
pub fn require_playlist_link(input: &str) -> Result<String> {
    let link = input.trim();
    if link.is_empty() {
        return Err(Error::UserInput(EMPTY_PLAYLIST_MESSAGE.to_string()));
    }
    Ok(link.to_string())
}
