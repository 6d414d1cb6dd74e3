//! Download session records and their state machine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress shown right after a session is created.
pub const INITIAL_PERCENT: u8 = 5;
/// Progress shown once the download request has been issued.
pub const CONNECTING_PERCENT: u8 = 20;
/// Simulated progress while the service prepares the file.
pub const TRANSFER_PERCENT: u8 = 50;
/// Progress shown once the service accepted a playlist.
pub const PLAYLIST_ACCEPTED_PERCENT: u8 = 10;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Pending,
    FetchingInfo,
    Downloading,
    Completed,
    Failed,
}

impl SessionState {
    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal move from `self`.
    ///
    /// Forward moves go one step at a time; `Failed` is reachable from any
    /// non-terminal state; nothing leaves a terminal state.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::FetchingInfo)
                | (Self::FetchingInfo, Self::Downloading)
                | (Self::Downloading, Self::Completed)
                | (
                    Self::Pending | Self::FetchingInfo | Self::Downloading,
                    Self::Failed
                )
        )
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::FetchingInfo => "fetching info",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Item counters of a playlist session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistProgress {
    pub total_items: u32,
    pub completed_items: u32,
}

/// One link's journey from submission to a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    source_link: String,
    resolution: String,
    format: String,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    progress: u8,
    state: SessionState,
    error: Option<String>,
    pub status_line: String,
    pub created: DateTime<Utc>,
    pub saved_to: Option<PathBuf>,
    pub playlist: Option<PlaylistProgress>,
}

impl Session {
    /// Creates a pending single-video session keyed by its link.
    #[must_use]
    pub fn new(link: &str, resolution: &str, format: &str) -> Self {
        Self {
            id: link.to_string(),
            source_link: link.to_string(),
            resolution: resolution.to_string(),
            format: format.to_string(),
            title: None,
            thumbnail_url: None,
            progress: INITIAL_PERCENT,
            state: SessionState::Pending,
            error: None,
            status_line: "Initializing task...".to_string(),
            created: Utc::now(),
            saved_to: None,
            playlist: None,
        }
    }

    /// Creates a pending playlist session.
    #[must_use]
    pub fn new_playlist(link: &str, resolution: &str, format: &str) -> Self {
        let mut session = Self::new(link, resolution, format);
        session.status_line = "Analyzing playlist content...".to_string();
        session.playlist = Some(PlaylistProgress {
            total_items: 0,
            completed_items: 0,
        });
        session
    }

    #[must_use]
    pub fn source_link(&self) -> &str {
        &self.source_link
    }

    #[must_use]
    pub fn resolution(&self) -> &str {
        &self.resolution
    }

    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    #[must_use]
    pub const fn progress(&self) -> u8 {
        self.progress
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    #[must_use]
    pub const fn is_playlist(&self) -> bool {
        self.playlist.is_some()
    }

    /// Moves to `next` if the transition is legal. Returns whether it applied.
    pub fn advance(&mut self, next: SessionState) -> bool {
        if !self.state.can_advance_to(next) {
            log::debug!(
                "{}: ignoring transition {} -> {}",
                self.id,
                self.state.label(),
                next.label()
            );
            return false;
        }
        self.state = next;
        true
    }

    /// Raises progress to `percent` (clamped to 100). Never lowers it.
    ///
    /// Returns false when the session is terminal or the value would regress.
    pub fn set_progress(&mut self, percent: u8) -> bool {
        if self.is_terminal() {
            return false;
        }
        let percent = percent.min(100);
        if percent < self.progress {
            return false;
        }
        self.progress = percent;
        true
    }

    /// Records title and thumbnail from a metadata fetch.
    pub fn set_info(&mut self, title: &str, thumbnail_url: Option<&str>) {
        if self.is_terminal() {
            return;
        }
        self.title = Some(title.to_string());
        self.thumbnail_url = thumbnail_url.map(ToString::to_string);
    }

    /// Marks the session failed with `message`. No-op on terminal sessions.
    pub fn fail(&mut self, message: &str) -> bool {
        if !self.advance(SessionState::Failed) {
            return false;
        }
        self.error = Some(message.to_string());
        self.status_line = format!("Error: {message}");
        true
    }

    /// Marks the session completed at 100%. Only legal from `Downloading`.
    pub fn complete(&mut self, status_line: &str) -> bool {
        if self.state != SessionState::Downloading {
            return false;
        }
        self.progress = 100;
        self.status_line = status_line.to_string();
        self.advance(SessionState::Completed)
    }
}
