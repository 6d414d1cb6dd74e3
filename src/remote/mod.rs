//! Client for the remote download service.

pub mod events;
mod models;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_DISPOSITION;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::filename;

pub use events::{PushChannel, PushEvent};
pub use models::{
    BinaryPayload, DownloadRequest, ErrorBody, InfoRequest, InfoResponse, JobRequest,
    PlaylistAccepted, PlaylistResponse, VideoInfo,
};

/// Header carrying the live-channel client id on download requests.
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";

/// The three request/response exchanges offered by the service.
///
/// Every call can be cancelled through `cancel`; a cancelled call returns
/// [`Error::Cancelled`].
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Fetches title and thumbnail for `link`.
    async fn fetch_info(&self, link: &str, cancel: &CancellationToken) -> Result<VideoInfo>;

    /// Asks the service to produce the file and returns its bytes.
    async fn request_download(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
    ) -> Result<BinaryPayload>;

    /// Queues every video of a playlist on the service.
    async fn request_playlist_download(
        &self,
        link: &str,
        resolution: &str,
        format: &str,
        cancel: &CancellationToken,
    ) -> Result<PlaylistAccepted>;
}

/// Builds a configured HTTP client for service requests.
///
/// # Errors
///
/// Returns [`Error::Network`] if the TLS backend cannot be initialized.
pub fn build_http_client(
    request_timeout: Option<Duration>,
    connect_timeout: Duration,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .tcp_keepalive(Duration::from_secs(30));
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// [`RemoteService`] over HTTP with reqwest.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    /// Creates a client for the deployment named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = build_http_client(Some(config.request_timeout()), config.connect_timeout())?;
        Ok(Self::with_client(http, config.base_url()))
    }

    /// Wraps an existing HTTP client.
    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Races `fut` against `cancel`.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        res = fut => res,
        () = cancel.cancelled() => Err(Error::Cancelled),
    }
}

fn fallback_message(status: StatusCode) -> String {
    status.canonical_reason().map_or_else(
        || format!("Unknown error (status {})", status.as_u16()),
        |reason| format!("Unknown error (status {} {reason})", status.as_u16()),
    )
}

/// Turns a non-success response into [`Error::Server`], preferring the
/// service's own `{"error": ...}` message.
async fn server_error(response: reqwest::Response) -> Error {
    let status = response.status();
    let message = response
        .bytes()
        .await
        .ok()
        .and_then(|body| serde_json::from_slice::<ErrorBody>(&body).ok())
        .map(|body| body.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback_message(status));
    Error::Server {
        status: status.as_u16(),
        message,
    }
}

fn invalid_body(status: StatusCode, e: &reqwest::Error) -> Error {
    if e.is_decode() {
        Error::Server {
            status: status.as_u16(),
            message: format!("Invalid response from server: {e}"),
        }
    } else {
        Error::Network(e.to_string())
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn fetch_info(&self, link: &str, cancel: &CancellationToken) -> Result<VideoInfo> {
        let link = link.trim();
        if link.is_empty() {
            return Err(Error::UserInput("Link must not be empty".to_string()));
        }

        cancellable(cancel, async {
            let response = self
                .http
                .post(self.endpoint("/api/video_info"))
                .json(&InfoRequest { link })
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(server_error(response).await);
            }

            let info: InfoResponse = response
                .json()
                .await
                .map_err(|e| invalid_body(status, &e))?;

            if info.status.as_deref() != Some("ready") {
                return Err(Error::Server {
                    status: status.as_u16(),
                    message: info
                        .error
                        .unwrap_or_else(|| "Video is not ready".to_string()),
                });
            }

            Ok(VideoInfo {
                title: info.title.unwrap_or_else(|| "Untitled".to_string()),
                thumbnail_url: info.thumbnail_url,
            })
        })
        .await
    }

    async fn request_download(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
    ) -> Result<BinaryPayload> {
        if request.link.trim().is_empty() {
            return Err(Error::UserInput("Link must not be empty".to_string()));
        }

        cancellable(cancel, async {
            let mut builder = self
                .http
                .post(self.endpoint("/api/download"))
                .json(&JobRequest {
                    link: request.link.trim(),
                    resolution: &request.resolution,
                    format: &request.format,
                });
            if let Some(id) = &request.correlation_id {
                builder = builder.header(CLIENT_ID_HEADER, id);
            }

            let response = builder.send().await?;
            if !response.status().is_success() {
                return Err(server_error(response).await);
            }

            let filename = response
                .headers()
                .get(CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .and_then(filename::from_disposition)
                .unwrap_or_else(|| {
                    filename::synthesize(
                        request.title.as_deref(),
                        &request.resolution,
                        &request.format,
                    )
                });

            let bytes = response.bytes().await?;
            log::debug!("received {} bytes for {filename}", bytes.len());
            Ok(BinaryPayload { bytes, filename })
        })
        .await
    }

    async fn request_playlist_download(
        &self,
        link: &str,
        resolution: &str,
        format: &str,
        cancel: &CancellationToken,
    ) -> Result<PlaylistAccepted> {
        let link = link.trim();
        if link.is_empty() {
            return Err(Error::UserInput(
                crate::links::EMPTY_PLAYLIST_MESSAGE.to_string(),
            ));
        }

        cancellable(cancel, async {
            let response = self
                .http
                .post(self.endpoint("/api/download/playlist"))
                .json(&JobRequest {
                    link,
                    resolution,
                    format,
                })
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(server_error(response).await);
            }

            let body: PlaylistResponse = response
                .json()
                .await
                .map_err(|e| invalid_body(status, &e))?;

            Ok(PlaylistAccepted {
                playlist_title: body
                    .playlist_title
                    .unwrap_or_else(|| "Untitled playlist".to_string()),
                videos_queued: body.videos_queued,
            })
        })
        .await
    }
}
