//! Submission flow: from pasted links to saved files.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::{StreamExt, stream};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ClientConfig, ProgressMode};
use crate::error::{Error, Result};
use crate::filename;
use crate::format::link_preview;
use crate::links::{require_links, require_playlist_link};
use crate::progress::{ProgressReporter, ProgressSource, SimulationSettings};
use crate::remote::{DownloadRequest, PushChannel, PushEvent, RemoteService};
use crate::session::{
    CONNECTING_PERCENT, PLAYLIST_ACCEPTED_PERCENT, Session, SessionState,
};
use crate::sink::{NoticeKind, PresentationSink};
use crate::stats::{BatchSummary, BatchSummaryBuilder};
use crate::tracker::{SessionHandle, SessionTracker};

/// Final state of one processed link.
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    /// Snapshot of the session when it reached a terminal state.
    pub session: Session,
    /// Size of the saved payload, zero on failure.
    pub bytes: u64,
}

/// Cancellation token of one tracked session.
struct SessionToken {
    handle: SessionHandle,
    token: CancellationToken,
}

/// Owns everything a submission needs: the session tracker, the progress
/// source, per-session cancellation tokens, and the single playlist slot.
///
/// Links of one batch run as an ordered queue. With `concurrent_links == 1`
/// the next link starts only after the previous one reached a terminal
/// state; larger values run a bounded pool that still reports results in
/// submission order.
pub struct Coordinator<R: RemoteService> {
    remote: R,
    config: ClientConfig,
    tracker: Arc<SessionTracker>,
    sink: Arc<dyn PresentationSink>,
    reporter: ProgressReporter,
    source: ProgressSource,
    tokens: Mutex<HashMap<String, SessionToken>>,
    root_token: CancellationToken,
    playlist: Mutex<Option<SessionHandle>>,
}

impl<R: RemoteService> Coordinator<R> {
    /// Creates a coordinator for `remote`.
    ///
    /// In push mode the coordinator starts with an unconnected channel;
    /// submissions fail with [`Error::ChannelNotReady`] until
    /// [`attach_channel`](Self::attach_channel) supplies a live one.
    pub fn new(remote: R, config: ClientConfig, sink: Arc<dyn PresentationSink>) -> Self {
        let tracker = Arc::new(SessionTracker::new());
        let reporter = ProgressReporter::new(Arc::clone(&tracker), Arc::clone(&sink));
        let source = match config.progress_mode {
            ProgressMode::Simulated => ProgressSource::SimulatedTimer(SimulationSettings {
                playlist_tick: config.playlist_tick(),
                download_bump: config.download_bump(),
            }),
            ProgressMode::Push => {
                ProgressSource::Push(PushChannel::new(uuid::Uuid::new_v4().to_string()))
            }
        };
        Self {
            remote,
            config,
            tracker,
            sink,
            reporter,
            source,
            tokens: Mutex::new(HashMap::new()),
            root_token: CancellationToken::new(),
            playlist: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<SessionTracker> {
        &self.tracker
    }

    #[must_use]
    pub const fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    #[must_use]
    pub const fn source(&self) -> &ProgressSource {
        &self.source
    }

    /// Switches to push-driven progress and starts forwarding `events`.
    pub fn attach_channel(
        &mut self,
        channel: PushChannel,
        events: mpsc::UnboundedReceiver<PushEvent>,
    ) -> JoinHandle<()> {
        self.source = ProgressSource::Push(channel);
        let reporter = self.reporter.clone();
        tokio::spawn(async move { reporter.pump(events).await })
    }

    /// Cancels the in-flight work of session `id`. Returns whether it was found.
    pub fn cancel(&self, id: &str) -> bool {
        self.tokens.lock().get(id).map(|t| t.token.cancel()).is_some()
    }

    /// Cancels everything and forgets all sessions.
    pub fn shutdown(&self) {
        self.root_token.cancel();
        self.tokens.lock().clear();
        self.playlist.lock().take();
        self.tracker.clear();
        log::debug!("coordinator shut down");
    }

    /// Renders and notifies a user-level error, then hands it back.
    fn reject(&self, error: Error) -> Error {
        self.sink.notify(&error.user_message(), NoticeKind::Error);
        error
    }

    fn register_token(&self, id: &str, handle: &SessionHandle) -> CancellationToken {
        let token = self.root_token.child_token();
        self.tokens.lock().insert(
            id.to_string(),
            SessionToken {
                handle: Arc::clone(handle),
                token: token.clone(),
            },
        );
        token
    }

    /// Files `token` under `new`. The entry at `old` is dropped only if it
    /// still belongs to `handle`.
    fn move_token(
        &self,
        old: &str,
        new: &str,
        handle: &SessionHandle,
        token: &CancellationToken,
    ) {
        let mut tokens = self.tokens.lock();
        if tokens
            .get(old)
            .is_some_and(|t| Arc::ptr_eq(&t.handle, handle))
        {
            tokens.remove(old);
        }
        tokens.insert(
            new.to_string(),
            SessionToken {
                handle: Arc::clone(handle),
                token: token.clone(),
            },
        );
    }

    fn release_token(&self, id: &str, handle: &SessionHandle) {
        let mut tokens = self.tokens.lock();
        if tokens
            .get(id)
            .is_some_and(|t| Arc::ptr_eq(&t.handle, handle))
        {
            tokens.remove(id);
        }
    }

    /// Applies `f` to the session and renders the result.
    fn mutate(&self, handle: &SessionHandle, f: impl FnOnce(&mut Session)) -> Session {
        let snapshot = {
            let mut session = handle.lock();
            f(&mut session);
            session.clone()
        };
        self.sink.render_session(&snapshot);
        snapshot
    }

    /// Fails the session with the user-facing text of `error` and notifies.
    fn fail(&self, handle: &SessionHandle, error: &Error, context: &str) -> Session {
        let message = error.user_message();
        log::warn!("{context}: {error}");
        let snapshot = self.mutate(handle, |s| {
            s.fail(&message);
        });
        self.sink
            .notify(&format!("{context}: {message}"), NoticeKind::Error);
        snapshot
    }

    /// Submits every link in `input` and waits for all of them to finish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserInput`] for input without links and
    /// [`Error::ChannelNotReady`] when push progress is configured but the
    /// live channel is down. Failures of individual links do not produce an
    /// error; they are reported in the summary and on their sessions.
    pub async fn submit_links(
        &self,
        input: &str,
        resolution: &str,
        format: &str,
    ) -> Result<BatchSummary> {
        let links = require_links(input).map_err(|e| self.reject(e))?;
        self.source.ensure_ready().map_err(|e| self.reject(e))?;

        log::info!("Submitting {} link(s)", links.len());
        let outcomes: Vec<LinkOutcome> = stream::iter(links)
            .map(|link| async move { self.process_link(&link, resolution, format).await })
            .buffered(self.config.concurrent_links.max(1))
            .collect()
            .await;

        let mut builder = BatchSummaryBuilder::new();
        for outcome in outcomes {
            let session = &outcome.session;
            match (session.state(), &session.saved_to) {
                (SessionState::Completed, Some(path)) => {
                    builder.add_saved(path.clone(), outcome.bytes);
                }
                _ => builder.add_failed(
                    session.source_link(),
                    session.error().unwrap_or("Download did not complete"),
                ),
            }
        }
        Ok(builder.build())
    }

    /// Runs one link through info fetch, download and save.
    pub async fn process_link(&self, link: &str, resolution: &str, format: &str) -> LinkOutcome {
        let handle = match self.tracker.create(link, Session::new(link, resolution, format)) {
            Ok(handle) => handle,
            Err(e) => {
                let mut session = Session::new(link, resolution, format);
                session.fail(&e.to_string());
                return LinkOutcome { session, bytes: 0 };
            }
        };
        let token = self.register_token(link, &handle);
        let context = format!("Download failed for \"{}\"", link_preview(link));

        self.mutate(&handle, |s| {
            s.advance(SessionState::FetchingInfo);
            s.status_line = "Fetching video details...".to_string();
        });

        let (session, bytes) = match self.remote.fetch_info(link, &token).await {
            Err(e) => (self.fail(&handle, &e, &context), 0),
            Ok(info) => {
                let key = filename::synthesize(Some(&info.title), resolution, format);
                if !self.tracker.rekey_handle(link, &key, &handle) {
                    log::debug!("{link} was resubmitted while fetching info");
                }
                self.move_token(link, &key, &handle, &token);
                self.mutate(&handle, |s| {
                    s.set_info(&info.title, info.thumbnail_url.as_deref());
                });
                self.download(&handle, &token, &info.title, &context).await
            }
        };

        let id = session.id.clone();
        self.release_token(&id, &handle);
        if self.tracker.remove_handle(&id, &handle) {
            self.sink.session_removed(&id);
        }
        LinkOutcome { session, bytes }
    }

    /// Issues the download request for a session that has its metadata.
    async fn download(
        &self,
        handle: &SessionHandle,
        token: &CancellationToken,
        title: &str,
        context: &str,
    ) -> (Session, u64) {
        let snapshot = self.mutate(handle, |s| {
            s.advance(SessionState::Downloading);
            s.set_progress(CONNECTING_PERCENT);
            s.status_line = format!("{CONNECTING_PERCENT}% - Connecting to stream...");
        });

        let bump = match &self.source {
            ProgressSource::SimulatedTimer(settings) => {
                let reporter = self.reporter.clone();
                let handle = Arc::clone(handle);
                let delay = settings.download_bump;
                Some(tokio::spawn(async move {
                    reporter.bump_after(handle, delay).await;
                }))
            }
            ProgressSource::Push(_) => None,
        };

        let request = DownloadRequest {
            link: snapshot.source_link().to_string(),
            resolution: snapshot.resolution().to_string(),
            format: snapshot.format().to_string(),
            title: Some(title.to_string()),
            correlation_id: self.source.correlation_id().map(ToString::to_string),
        };
        let result = self.remote.request_download(&request, token).await;
        if let Some(bump) = bump {
            bump.abort();
        }

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => return (self.fail(handle, &e, context), 0),
        };

        let saved: Result<PathBuf> = self
            .sink
            .prompt_save(&payload.filename, &payload.bytes)
            .await;
        match saved {
            Ok(path) => {
                let status = format!("100% - Download Complete! ({})", payload.filename);
                let session = self.mutate(handle, |s| {
                    s.saved_to = Some(path);
                    s.complete(&status);
                });
                log::info!("{} completed", session.id);
                (session, payload.bytes.len() as u64)
            }
            Err(e) => (self.fail(handle, &e, context), 0),
        }
    }

    /// Submits a playlist and drives its simulated progress to the end.
    ///
    /// Starting a playlist replaces the one currently shown. The returned
    /// snapshot is terminal unless a newer playlist superseded this one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserInput`] if `link` is blank. Service and network
    /// failures are recorded on the returned session instead.
    pub async fn submit_playlist(
        &self,
        link: &str,
        resolution: &str,
        format: &str,
    ) -> Result<Session> {
        let link = require_playlist_link(link).map_err(|e| self.reject(e))?;

        let handle = self
            .tracker
            .create(&link, Session::new_playlist(&link, resolution, format))?;
        let previous = self.playlist.lock().replace(Arc::clone(&handle));
        if let Some(previous) = previous {
            let previous_id = previous.lock().id.clone();
            if self.tracker.remove_handle(&previous_id, &previous) {
                self.sink.session_removed(&previous_id);
            }
        }
        let token = self.register_token(&link, &handle);

        self.mutate(&handle, |s| {
            s.advance(SessionState::FetchingInfo);
            s.status_line = "Processing Playlist (Fetching Info)...".to_string();
        });

        let accepted = match self
            .remote
            .request_playlist_download(&link, resolution, format, &token)
            .await
        {
            Ok(accepted) => accepted,
            Err(e) => {
                self.release_token(&link, &handle);
                return Ok(self.fail(&handle, &e, "Playlist download failed"));
            }
        };

        self.mutate(&handle, |s| {
            s.title = Some(format!("Playlist: {}", accepted.playlist_title));
            if let Some(playlist) = s.playlist.as_mut() {
                playlist.total_items = accepted.videos_queued;
            }
            s.advance(SessionState::Downloading);
            s.set_progress(PLAYLIST_ACCEPTED_PERCENT);
            s.status_line = format!(
                "{PLAYLIST_ACCEPTED_PERCENT}% - Server accepted task. Queuing {} videos.",
                accepted.videos_queued
            );
        });
        self.sink.notify(
            &format!(
                "Playlist \"{}\" accepted: {} video(s) queued",
                accepted.playlist_title, accepted.videos_queued
            ),
            NoticeKind::Info,
        );

        let tick = match &self.source {
            ProgressSource::SimulatedTimer(settings) => settings.playlist_tick,
            ProgressSource::Push(_) => self.config.playlist_tick(),
        };
        self.reporter
            .simulate_playlist(Arc::clone(&handle), accepted.videos_queued, tick, &token)
            .await;
        self.release_token(&link, &handle);

        let session = handle.lock().clone();
        Ok(session)
    }
}
