//! Rendering surface the core pushes session state into.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;
use crate::session::Session;

/// Severity of a transient notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// Receives state from the core.
///
/// `render_session` is called on every state change and must be idempotent.
/// `notify` shows a transient notice that the surface dismisses on its own.
/// `prompt_save` stores a finished payload locally and returns where it went.
#[async_trait]
pub trait PresentationSink: Send + Sync {
    fn render_session(&self, session: &Session);

    fn notify(&self, message: &str, kind: NoticeKind);

    /// # Errors
    ///
    /// Returns an error if the payload could not be stored.
    async fn prompt_save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Called when a session leaves the tracker.
    fn session_removed(&self, _id: &str) {}
}

/// A sink that ignores everything and saves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl PresentationSink for NullSink {
    fn render_session(&self, _session: &Session) {}

    fn notify(&self, _message: &str, _kind: NoticeKind) {}

    async fn prompt_save(&self, filename: &str, _bytes: &[u8]) -> Result<PathBuf> {
        Ok(PathBuf::from(filename))
    }
}

/// A notice with its expiry.
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
    pub expires_at: Instant,
}

/// Active notices, each dismissed after a fixed time to live.
#[derive(Debug)]
pub struct NoticeBoard {
    ttl: Duration,
    notices: Mutex<Vec<Notice>>,
}

impl NoticeBoard {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, message: &str, kind: NoticeKind) {
        self.push_at(message, kind, Instant::now());
    }

    fn push_at(&self, message: &str, kind: NoticeKind, now: Instant) {
        let mut notices = self.notices.lock();
        notices.retain(|n| n.expires_at > now);
        notices.push(Notice {
            message: message.to_string(),
            kind,
            expires_at: now + self.ttl,
        });
    }

    /// Notices still visible, newest first. Expired ones are dropped.
    #[must_use]
    pub fn active(&self) -> Vec<Notice> {
        self.active_at(Instant::now())
    }

    fn active_at(&self, now: Instant) -> Vec<Notice> {
        let mut notices = self.notices.lock();
        notices.retain(|n| n.expires_at > now);
        notices.iter().rev().cloned().collect()
    }
}
