//! Progress reporting: live push events or a client-side simulation.
//!
//! Both strategies funnel into [`ProgressReporter`], which applies updates to
//! tracked sessions and re-renders them. Terminal sessions ignore every
//! further update, whichever strategy it comes from.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::remote::{PushChannel, PushEvent};
use crate::session::{PLAYLIST_ACCEPTED_PERCENT, Session, SessionState, TRANSFER_PERCENT};
use crate::sink::{NoticeKind, PresentationSink};
use crate::tracker::{SessionHandle, SessionTracker};

/// Share of the bar covered by per-item progress of a playlist.
const PLAYLIST_ITEMS_SPAN: u64 = 80;
/// Increment of each finalize tick once all items are counted.
pub const FINALIZE_STEP: u8 = 5;
/// Shortest simulation tick; `tokio::time::interval` rejects zero.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Playlist progress for `completed` of `total` items: `10 + floor(c/t * 80)`.
///
/// An empty playlist stays at the accepted baseline.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn playlist_percent(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return PLAYLIST_ACCEPTED_PERCENT;
    }
    let completed = u64::from(completed.min(total));
    // At most 80, so the cast cannot truncate.
    PLAYLIST_ACCEPTED_PERCENT + (completed * PLAYLIST_ITEMS_SPAN / u64::from(total)) as u8
}

/// Timer settings of the simulated strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationSettings {
    /// Interval between playlist ticks.
    pub playlist_tick: Duration,
    /// Delay before a running single download is shown at the transfer stage.
    pub download_bump: Duration,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            playlist_tick: Duration::from_millis(1500),
            download_bump: Duration::from_millis(1000),
        }
    }
}

/// Where progress for single downloads comes from.
#[derive(Debug, Clone)]
pub enum ProgressSource {
    /// Live events from the service.
    Push(PushChannel),
    /// Fabricated client-side estimates.
    SimulatedTimer(SimulationSettings),
}

impl ProgressSource {
    /// Client id to attach to download requests, if events are pushed.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Self::Push(channel) => Some(channel.client_id()),
            Self::SimulatedTimer(_) => None,
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::ChannelNotReady`] for a push source whose channel is
    /// not connected.
    pub fn ensure_ready(&self) -> Result<()> {
        match self {
            Self::Push(channel) if !channel.is_ready() => Err(Error::ChannelNotReady),
            _ => Ok(()),
        }
    }

}

/// Step function of the simulated playlist bar.
///
/// Each tick counts one more item until all are counted, then advances the
/// finalize phase by [`FINALIZE_STEP`] until exactly 100.
#[derive(Debug, Clone)]
pub struct PlaylistSimulation {
    total: u32,
    completed: u32,
    percent: u8,
    counted_last: bool,
}

impl PlaylistSimulation {
    #[must_use]
    pub const fn new(total: u32) -> Self {
        Self {
            total,
            completed: 0,
            percent: PLAYLIST_ACCEPTED_PERCENT,
            counted_last: false,
        }
    }

    /// Advances one tick. Returns the new percentage, or `None` once finished.
    pub fn tick(&mut self) -> Option<u8> {
        if self.is_finished() {
            return None;
        }
        self.counted_last = self.completed < self.total;
        if self.counted_last {
            self.completed += 1;
            self.percent = playlist_percent(self.completed, self.total);
        } else {
            self.percent = self.percent.saturating_add(FINALIZE_STEP).min(100);
        }
        Some(self.percent)
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.percent >= 100
    }

    #[must_use]
    pub const fn percent(&self) -> u8 {
        self.percent
    }

    #[must_use]
    pub const fn completed(&self) -> u32 {
        self.completed
    }

    /// Stage text for the current tick, marked as simulated.
    #[must_use]
    pub fn status_line(&self) -> String {
        if self.is_finished() {
            "100% - Playlist Download Complete! (Simulated)".to_string()
        } else if self.counted_last {
            format!(
                "{}% - Downloading Video {} of {}... (Simulated)",
                self.percent, self.completed, self.total
            )
        } else {
            format!(
                "{}% - Finalizing and packaging files... (Simulated)",
                self.percent
            )
        }
    }
}

/// Applies progress updates to tracked sessions and re-renders them.
#[derive(Clone)]
pub struct ProgressReporter {
    tracker: Arc<SessionTracker>,
    sink: Arc<dyn PresentationSink>,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(tracker: Arc<SessionTracker>, sink: Arc<dyn PresentationSink>) -> Self {
        Self { tracker, sink }
    }

    /// Runs `update` on session `id` and renders the result if it applied.
    ///
    /// Unknown ids are dropped silently.
    fn update(&self, id: &str, update: impl FnOnce(&mut Session) -> bool) -> Option<Session> {
        let Some(handle) = self.tracker.get(id) else {
            log::debug!("dropping update for unknown session {id}");
            return None;
        };
        self.update_handle(&handle, update)
    }

    fn update_handle(
        &self,
        handle: &SessionHandle,
        update: impl FnOnce(&mut Session) -> bool,
    ) -> Option<Session> {
        let snapshot = {
            let mut session = handle.lock();
            if session.is_terminal() || !update(&mut session) {
                return None;
            }
            session.clone()
        };
        self.sink.render_session(&snapshot);
        Some(snapshot)
    }

    /// Raises the progress of `id`. Returns whether anything changed.
    pub fn on_progress(&self, id: &str, percent: u8, extra: Option<&str>) -> bool {
        self.update(id, |session| {
            if !session.set_progress(percent) {
                return false;
            }
            session.status_line = match extra {
                Some(extra) => format!("{}% - Downloading ({extra})", session.progress()),
                None => format!("{}% - Downloading...", session.progress()),
            };
            true
        })
        .is_some()
    }

    /// Fails `id` with `message` and raises an error notice.
    pub fn on_error(&self, id: &str, message: &str) -> bool {
        let failed = self.update(id, |session| session.fail(message)).is_some();
        if failed {
            self.sink.notify(&format!("Download failed: {message}"), NoticeKind::Error);
        }
        failed
    }

    /// Completes `id`.
    pub fn on_done(&self, id: &str) -> bool {
        self.update(id, |session| session.complete("100% - Download Complete!"))
            .is_some()
    }

    /// Routes one pushed event to its session.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn apply(&self, event: &PushEvent) -> bool {
        match event {
            PushEvent::Progress { filename, progress, .. } => {
                // Clamped to 0..=100 first, so the cast is exact.
                let percent = progress.clamp(0.0, 100.0).floor() as u8;
                self.on_progress(filename, percent, event.extra().as_deref())
            }
            PushEvent::Error { filename, error } => self.on_error(filename, error),
        }
    }

    /// Forwards pushed events until the channel closes.
    pub async fn pump(&self, mut rx: mpsc::UnboundedReceiver<PushEvent>) {
        while let Some(event) = rx.recv().await {
            self.apply(&event);
        }
        log::debug!("push event pump finished");
    }

    /// After `delay`, shows a still-running single download at the transfer
    /// stage. Used when no live channel reports real progress.
    pub async fn bump_after(&self, handle: SessionHandle, delay: Duration) {
        tokio::time::sleep(delay).await;
        self.update_handle(&handle, |session| {
            if session.state() != SessionState::Downloading || !session.set_progress(TRANSFER_PERCENT)
            {
                return false;
            }
            session.status_line = format!(
                "{TRANSFER_PERCENT}% - Downloading file from server (this may take a minute)..."
            );
            true
        });
    }

    /// Drives a fabricated playlist bar until 100% and completes the session.
    ///
    /// Stops early, leaving the session untouched, once `handle` is no longer
    /// the session tracked under its id (a newer playlist replaced it).
    /// Cancellation fails the session. Returns the final state.
    pub async fn simulate_playlist(
        &self,
        handle: SessionHandle,
        total: u32,
        tick: Duration,
        cancel: &CancellationToken,
    ) -> SessionState {
        let mut sim = PlaylistSimulation::new(total);
        let mut interval = tokio::time::interval(tick.max(MIN_TICK));
        // The first tick of an interval completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = cancel.cancelled() => {
                    self.update_handle(&handle, |s| s.fail("Cancelled"));
                    return handle.lock().state();
                }
            }

            let id = handle.lock().id.clone();
            let still_tracked = self
                .tracker
                .get(&id)
                .is_some_and(|current| Arc::ptr_eq(&current, &handle));
            if !still_tracked {
                log::debug!("playlist simulation for {id} superseded");
                return handle.lock().state();
            }

            let Some(percent) = sim.tick() else {
                break;
            };
            let finished = sim.is_finished();
            let status = sim.status_line();
            let completed = sim.completed();
            self.update_handle(&handle, |session| {
                session.set_progress(percent);
                if let Some(playlist) = session.playlist.as_mut() {
                    playlist.completed_items = completed;
                }
                if finished {
                    session.complete(&status);
                } else {
                    session.status_line = status;
                }
                true
            });
            if finished {
                break;
            }
        }
        handle.lock().state()
    }
}
