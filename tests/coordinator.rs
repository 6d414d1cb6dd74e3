use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use protube_dl::{
    ClientConfig, Coordinator, DiskSaver, Error, HttpRemote, NoticeKind, PresentationSink,
    ProgressMode, PushChannel, PushEvent, Session, SessionState,
};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records everything the coordinator shows and saves into a temp dir.
struct RecordingSink {
    renders: Mutex<Vec<Session>>,
    notices: Mutex<Vec<(String, NoticeKind)>>,
    removed: Mutex<Vec<String>>,
    saver: DiskSaver,
}

impl RecordingSink {
    fn new(dir: &TempDir) -> Arc<Self> {
        Arc::new(Self {
            renders: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            saver: DiskSaver::new(dir.path()),
        })
    }

    fn renders_of(&self, link: &str) -> Vec<Session> {
        self.renders
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.source_link() == link)
            .cloned()
            .collect()
    }

    fn errors(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, kind)| *kind == NoticeKind::Error)
            .map(|(m, _)| m.clone())
            .collect()
    }
}

#[async_trait]
impl PresentationSink for RecordingSink {
    fn render_session(&self, session: &Session) {
        self.renders.lock().unwrap().push(session.clone());
    }

    fn notify(&self, message: &str, kind: NoticeKind) {
        self.notices.lock().unwrap().push((message.to_string(), kind));
    }

    async fn prompt_save(&self, filename: &str, bytes: &[u8]) -> protube_dl::Result<PathBuf> {
        Ok(self.saver.save(filename, bytes).await?)
    }

    fn session_removed(&self, id: &str) {
        self.removed.lock().unwrap().push(id.to_string());
    }
}

async fn mount_info(server: &MockServer, link: &str, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/video_info"))
        .and(body_json(json!({ "link": link })))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// Polls until the session under `key` is downloading.
async fn wait_for_download(c: &Coordinator<HttpRemote>, key: &str) {
    loop {
        let downloading = c
            .tracker()
            .get(key)
            .is_some_and(|h| h.lock().state() == SessionState::Downloading);
        if downloading {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn coordinator(
    server: &MockServer,
    config: ClientConfig,
    sink: &Arc<RecordingSink>,
) -> Coordinator<HttpRemote> {
    let config = config.with_api_url(server.uri());
    let remote = HttpRemote::new(&config).expect("client");
    Coordinator::new(remote, config, Arc::clone(sink) as Arc<dyn PresentationSink>)
}

#[tokio::test]
async fn failed_link_does_not_stop_the_batch() {
    let server = MockServer::start().await;
    mount_info(
        &server,
        "https://v/good",
        200,
        json!({ "status": "ready", "title": "Good Clip" }),
    )
    .await;
    mount_info(&server, "https://v/bad", 404, json!({ "error": "not found" })).await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new(&dir);
    let c = coordinator(&server, ClientConfig::default(), &sink);

    let summary = c
        .submit_links("https://v/good\n\n  https://v/bad  \n", "720p", "mp4")
        .await
        .expect("batch");

    assert_eq!(summary.completed_count(), 1);
    assert_eq!(summary.failed_count(), 1);
    assert_eq!(summary.failed[0].link, "https://v/bad");
    assert_eq!(summary.failed[0].message, "not found");

    let saved = dir.path().join("good_clip_720p_mp4.mp4");
    assert_eq!(summary.saved, vec![saved.clone()]);
    assert_eq!(std::fs::read(saved).unwrap(), b"payload");

    let good = sink.renders_of("https://v/good");
    let last = good.last().unwrap();
    assert_eq!(last.state(), SessionState::Completed);
    assert_eq!(last.progress(), 100);
    assert_eq!(last.id, "good_clip_720p_mp4.mp4");
    assert!(good.windows(2).all(|w| w[0].progress() <= w[1].progress()));

    let bad = sink.renders_of("https://v/bad");
    let last = bad.last().unwrap();
    assert_eq!(last.state(), SessionState::Failed);
    assert_eq!(last.error(), Some("not found"));
    assert_eq!(last.status_line, "Error: not found");

    assert_eq!(sink.errors().len(), 1);
    assert!(sink.errors()[0].ends_with("not found"));
    assert!(c.tracker().is_empty());
    assert_eq!(
        *sink.removed.lock().unwrap(),
        vec!["good_clip_720p_mp4.mp4".to_string(), "https://v/bad".to_string()]
    );
}

#[tokio::test]
async fn links_run_in_submission_order() {
    let server = MockServer::start().await;
    for (link, title) in [("https://v/1", "One"), ("https://v/2", "Two"), ("https://v/3", "Three")] {
        mount_info(&server, link, 200, json!({ "status": "ready", "title": title })).await;
    }
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new(&dir);
    let c = coordinator(&server, ClientConfig::default(), &sink);
    c.submit_links("https://v/1\nhttps://v/2\nhttps://v/3", "360p", "mp3")
        .await
        .expect("batch");

    // Sequential: each link is terminal before the next one is first shown.
    let renders = sink.renders.lock().unwrap();
    let first_seen = |link: &str| renders.iter().position(|s| s.source_link() == link).unwrap();
    let done_at = |link: &str| {
        renders
            .iter()
            .position(|s| s.source_link() == link && s.is_terminal())
            .unwrap()
    };
    assert!(done_at("https://v/1") < first_seen("https://v/2"));
    assert!(done_at("https://v/2") < first_seen("https://v/3"));
}

#[tokio::test]
async fn empty_submission_is_rejected_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new(&dir);
    let c = coordinator(&server, ClientConfig::default(), &sink);

    let err = c.submit_links(" \n\t ", "720p", "mp4").await.unwrap_err();
    assert_eq!(err.to_string(), "Please paste at least one link");
    assert_eq!(sink.errors(), vec!["Please paste at least one link".to_string()]);
    assert!(sink.renders.lock().unwrap().is_empty());
}

#[tokio::test]
async fn push_mode_requires_live_channel() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new(&dir);
    let c = coordinator(
        &server,
        ClientConfig::default().with_progress_mode(ProgressMode::Push),
        &sink,
    );

    let err = c.submit_links("https://v/1", "720p", "mp4").await.unwrap_err();
    assert!(matches!(err, Error::ChannelNotReady));
    assert!(c.tracker().is_empty());
}

#[tokio::test]
async fn empty_playlist_finishes_at_100() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download/playlist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "playlist_title": "Empty",
            "videos_queued": 0
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new(&dir);
    let c = coordinator(&server, ClientConfig::default().with_playlist_tick_ms(5), &sink);

    let session = c
        .submit_playlist("https://list/empty", "best", "mp3")
        .await
        .expect("playlist");
    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.progress(), 100);
    assert_eq!(session.title.as_deref(), Some("Playlist: Empty"));
    assert!(session.status_line.contains("(Simulated)"));

    let progress: Vec<u8> = sink
        .renders_of("https://list/empty")
        .iter()
        .map(Session::progress)
        .collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert!(progress.contains(&10));
}

#[tokio::test]
async fn rejected_playlist_reports_service_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download/playlist"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "not a playlist" })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new(&dir);
    let c = coordinator(&server, ClientConfig::default(), &sink);

    let session = c
        .submit_playlist("https://v/single", "best", "mp4")
        .await
        .expect("playlist");
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.error(), Some("not a playlist"));
    assert_eq!(
        sink.errors(),
        vec!["Playlist download failed: not a playlist".to_string()]
    );
}

#[tokio::test]
async fn cancel_aborts_in_flight_download() {
    let server = MockServer::start().await;
    mount_info(&server, "https://v/slow", 200, json!({ "status": "ready", "title": "Slow" })).await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late".to_vec())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new(&dir);
    let c = coordinator(&server, ClientConfig::default(), &sink);

    let canceller = async {
        wait_for_download(&c, "slow_720p_mp4.mp4").await;
        c.cancel("slow_720p_mp4.mp4")
    };
    let (summary, found) = tokio::join!(c.submit_links("https://v/slow", "720p", "mp4"), canceller);

    assert!(found);
    let summary = summary.expect("batch");
    assert_eq!(summary.failed_count(), 1);
    assert_eq!(summary.failed[0].message, "Cancelled");
    assert!(summary.saved.is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let last = sink.renders_of("https://v/slow").pop().unwrap();
    assert_eq!(last.state(), SessionState::Failed);
    assert!(!c.cancel("slow_720p_mp4.mp4"));
}

#[tokio::test]
async fn pushed_progress_reaches_rekeyed_session() {
    let server = MockServer::start().await;
    mount_info(&server, "https://v/live", 200, json!({ "status": "ready", "title": "Live Clip" }))
        .await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .and(header("X-Client-Id", "client-7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"live".to_vec())
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new(&dir);
    let mut c = coordinator(
        &server,
        ClientConfig::default().with_progress_mode(ProgressMode::Push),
        &sink,
    );
    let channel = PushChannel::new("client-7");
    channel.set_ready(true);
    let (tx, rx) = mpsc::unbounded_channel();
    let pump = c.attach_channel(channel, rx);

    let key = "live_clip_720p_mp4.mp4";
    let push = async {
        wait_for_download(&c, key).await;
        let frames = [
            r#"{"filename":"someone_else.mp4","progress":90}"#.to_string(),
            format!(r#"{{"filename":"{key}","progress":42.7,"speed":"1.5MiB/s"}}"#),
        ];
        for frame in frames {
            let event: PushEvent = serde_json::from_str(&frame).unwrap();
            tx.send(event).unwrap();
        }
    };
    let (summary, ()) = tokio::join!(c.submit_links("https://v/live", "720p", "mp4"), push);
    assert_eq!(summary.expect("batch").completed_count(), 1);

    let renders = sink.renders_of("https://v/live");
    let pushed = renders
        .iter()
        .find(|s| s.progress() == 42)
        .expect("pushed progress rendered");
    assert_eq!(pushed.id, key);
    assert_eq!(pushed.status_line, "42% - Downloading (speed 1.5MiB/s)");
    assert!(renders.iter().all(|s| s.progress() != 90));
    assert_eq!(renders.last().unwrap().state(), SessionState::Completed);

    drop(tx);
    pump.await.unwrap();
}

#[tokio::test]
async fn new_playlist_replaces_running_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download/playlist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "playlist_title": "Mix",
            "videos_queued": 3
        })))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let sink = RecordingSink::new(&dir);
    let c = coordinator(&server, ClientConfig::default().with_playlist_tick_ms(25), &sink);

    let second = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        c.submit_playlist("https://list/b", "best", "mp3").await
    };
    let (first, second) = tokio::join!(c.submit_playlist("https://list/a", "best", "mp3"), second);
    let (first, second) = (first.expect("first"), second.expect("second"));

    assert_ne!(first.state(), SessionState::Completed);
    assert!(first.progress() < 100);
    assert_eq!(second.state(), SessionState::Completed);
    assert_eq!(second.progress(), 100);

    assert!(sink.removed.lock().unwrap().contains(&"https://list/a".to_string()));
    assert_eq!(c.tracker().keys(), vec!["https://list/b".to_string()]);
    let stale = sink.renders_of("https://list/a");
    assert!(stale.iter().all(|s| s.state() != SessionState::Completed));
}
