use std::time::Duration;

use protube_dl::remote::{CLIENT_ID_HEADER, DownloadRequest};
use protube_dl::{ClientConfig, Error, HttpRemote, PushChannel, PushEvent, RemoteService};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn remote_for(server: &MockServer) -> HttpRemote {
    HttpRemote::new(&ClientConfig::default().with_api_url(server.uri())).expect("client")
}

fn request(link: &str, title: Option<&str>) -> DownloadRequest {
    DownloadRequest {
        link: link.to_string(),
        resolution: "720p".to_string(),
        format: "mp4".to_string(),
        title: title.map(ToString::to_string),
        correlation_id: None,
    }
}

#[tokio::test]
async fn fetch_info_returns_title_and_thumbnail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/video_info"))
        .and(body_json(json!({ "link": "https://v/1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ready",
            "title": "Clip",
            "thumbnail_url": "https://img/1.jpg"
        })))
        .mount(&server)
        .await;

    let info = remote_for(&server)
        .fetch_info(" https://v/1 ", &CancellationToken::new())
        .await
        .expect("info");
    assert_eq!(info.title, "Clip");
    assert_eq!(info.thumbnail_url.as_deref(), Some("https://img/1.jpg"));
}

#[tokio::test]
async fn fetch_info_surfaces_service_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/video_info"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "not found" })))
        .mount(&server)
        .await;

    let err = remote_for(&server)
        .fetch_info("https://v/404", &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        Error::Server { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_body_uses_status_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/video_info"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = remote_for(&server)
        .fetch_info("https://v/1", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Unknown error (status 500 Internal Server Error)");
}

#[tokio::test]
async fn info_not_ready_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/video_info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "processing" })))
        .mount(&server)
        .await;

    let err = remote_for(&server)
        .fetch_info("https://v/1", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Video is not ready");
}

#[tokio::test]
async fn download_prefers_content_disposition_filename() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .and(body_json(json!({
            "link": "https://v/1",
            "resolution": "720p",
            "format": "mp4"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=\"server_name.mp4\"")
                .set_body_bytes(b"video-bytes".to_vec()),
        )
        .mount(&server)
        .await;

    let payload = remote_for(&server)
        .request_download(&request("https://v/1", Some("Clip")), &CancellationToken::new())
        .await
        .expect("payload");
    assert_eq!(payload.filename, "server_name.mp4");
    assert_eq!(&payload.bytes[..], b"video-bytes");
}

#[tokio::test]
async fn download_synthesizes_filename_without_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .mount(&server)
        .await;

    let payload = remote_for(&server)
        .request_download(&request("https://v/1", Some("My Video! #1")), &CancellationToken::new())
        .await
        .expect("payload");
    assert_eq!(payload.filename, "my_video___1_720p_mp4.mp4");
}

#[tokio::test]
async fn download_sends_client_id_for_push_progress() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .and(header(CLIENT_ID_HEADER, "client-42"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let mut req = request("https://v/1", None);
    req.correlation_id = Some("client-42".to_string());
    let payload = remote_for(&server)
        .request_download(&req, &CancellationToken::new())
        .await
        .expect("payload");
    assert_eq!(payload.filename, "download_720p_mp4.mp4");
}

#[tokio::test]
async fn playlist_acceptance_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download/playlist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "queued",
            "playlist_title": "Mix",
            "videos_queued": 12
        })))
        .mount(&server)
        .await;

    let accepted = remote_for(&server)
        .request_playlist_download("https://list/1", "best", "mp3", &CancellationToken::new())
        .await
        .expect("accepted");
    assert_eq!(accepted.playlist_title, "Mix");
    assert_eq!(accepted.videos_queued, 12);
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    let remote = HttpRemote::new(&ClientConfig::default().with_api_url("http://127.0.0.1:9"))
        .expect("client");
    let err = remote
        .fetch_info("https://v/1", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_network());
    assert_eq!(
        err.user_message(),
        "Network error or server unreachable. Check your connection."
    );
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/video_info"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({ "status": "ready", "title": "late" })),
        )
        .mount(&server)
        .await;

    let config = ClientConfig::default()
        .with_api_url(server.uri())
        .with_request_timeout_secs(1);
    let err = HttpRemote::new(&config)
        .expect("client")
        .fetch_info("https://v/1", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_network());
}

#[tokio::test]
async fn push_channel_delivers_events_then_closes() {
    let server = MockServer::start().await;
    let body = concat!(
        "{\"filename\":\"clip_720p_mp4.mp4\",\"progress\":42.0}\n",
        "{\"filename\":\"clip_720p_mp4.mp4\",\"error\":\"boom\"}\n",
    );
    Mock::given(method("GET"))
        .and(path("/api/events"))
        .and(header(CLIENT_ID_HEADER, "c-1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let config = ClientConfig::default().with_api_url(server.uri());
    let (channel, mut events) = PushChannel::connect(&config, Some("c-1".to_string()))
        .await
        .expect("connect");
    assert_eq!(channel.client_id(), "c-1");

    let first = events.recv().await.expect("progress event");
    assert!(matches!(first, PushEvent::Progress { progress, .. } if (progress - 42.0).abs() < f64::EPSILON));
    let second = events.recv().await.expect("error event");
    assert!(matches!(second, PushEvent::Error { ref error, .. } if error == "boom"));

    assert!(events.recv().await.is_none());
    assert!(!channel.is_ready());
}
